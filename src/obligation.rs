//! Records for everything the tracker knows about: EMIs, subscriptions and
//! utility accounts, bills, loan applications and mobile recharges. The `New*` types are
//! what a client submits; `into_record` validates them and assigns the
//! server-side id and timestamps.

use crate::error::{FinanceError, Result};
use crate::loan::{round, EmiBreakdown, LoanTerms};
use crate::schedule::{advance, next_occurrence_after, BillingCycle, RepeatFrequency};
use chrono::{Days, NaiveDate, NaiveDateTime};
use log::{debug, info};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reminder {
    pub enabled: bool,
    pub days_before: u32,
}

impl Default for Reminder {
    fn default() -> Self {
        Self {
            enabled: true,
            days_before: 3,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Closed,
}

/// An installment loan (EMI).
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanObligation {
    pub id: Uuid,
    pub name: String,
    pub principal: f64,
    pub annual_rate_percent: Option<f64>,
    pub tenure_months: u32,
    pub installment_amount: f64,
    /// First installment date; later installments fall on the same day of month.
    pub payment_day_of_cycle: NaiveDate,
    pub remaining_tenure_months: u32,
    pub next_due_date: NaiveDate,
    pub bank_details: String,
    #[serde(default)]
    pub reminder: Reminder,
    pub status: LoanStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl LoanObligation {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    pub fn terms(&self) -> Result<LoanTerms> {
        LoanTerms::new(
            self.principal,
            self.annual_rate_percent,
            i64::from(self.tenure_months),
        )
    }

    /// Records one installment: one month less to go, next due date moves a
    /// month on, and the loan closes after the final installment.
    pub fn record_payment(&mut self, now: NaiveDateTime) -> Result<()> {
        if !self.is_active() || self.remaining_tenure_months == 0 {
            return Err(FinanceError::invalid(
                "status",
                format!("loan {} has no installments left to pay", self.id),
            ));
        }

        self.remaining_tenure_months -= 1;
        if self.remaining_tenure_months == 0 {
            self.status = LoanStatus::Closed;
            info!("loan {} ({}) paid off", self.id, self.name);
        } else {
            self.next_due_date = next_occurrence_after(
                self.payment_day_of_cycle,
                BillingCycle::Monthly,
                day_after(self.next_due_date)?,
            )?;
            debug!(
                "loan {}: {} installments left, next due {}",
                self.id, self.remaining_tenure_months, self.next_due_date
            );
        }
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLoan {
    pub name: String,
    pub principal: f64,
    #[serde(default)]
    pub annual_rate_percent: Option<f64>,
    pub tenure_months: i64,
    /// Computed from the terms when absent. When given it must match the
    /// terms to the nearest whole unit.
    #[serde(default)]
    pub installment_amount: Option<f64>,
    pub payment_date: NaiveDate,
    pub bank_details: String,
    #[serde(default)]
    pub reminder: Reminder,
}

impl NewLoan {
    pub fn into_record(self, now: NaiveDateTime) -> Result<LoanObligation> {
        let name = require_text("name", &self.name)?;
        let bank_details = require_text("bankDetails", &self.bank_details)?;
        let terms = LoanTerms::new(self.principal, self.annual_rate_percent, self.tenure_months)?;

        let installment_amount = match self.installment_amount {
            Some(stored) if terms.reproduces_installment(stored, 0)? => stored,
            Some(stored) => {
                return Err(FinanceError::invalid(
                    "installmentAmount",
                    format!(
                        "{} does not match the terms (expected about {:.2})",
                        stored,
                        terms.installment()?
                    ),
                ))
            }
            None => round(terms.installment()?, 2),
        };

        Ok(LoanObligation {
            id: Uuid::new_v4(),
            name,
            principal: terms.principal,
            annual_rate_percent: self.annual_rate_percent,
            tenure_months: terms.tenure_months,
            installment_amount,
            payment_day_of_cycle: self.payment_date,
            remaining_tenure_months: terms.tenure_months,
            next_due_date: self.payment_date,
            bank_details,
            reminder: self.reminder,
            status: LoanStatus::Active,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurringKind {
    Subscription,
    Utility,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecurringStatus {
    Active,
    Cancelled,
}

/// A subscription or a utility account billed on a fixed cycle.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecurringObligation {
    pub id: Uuid,
    pub kind: RecurringKind,
    pub title: String,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub account_number: Option<String>,
    pub category: String,
    pub amount: f64,
    pub cycle: BillingCycle,
    pub anchor_date: NaiveDate,
    pub next_occurrence: NaiveDate,
    pub status: RecurringStatus,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub autopay: bool,
    #[serde(default)]
    pub reminder: Reminder,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl RecurringObligation {
    pub fn is_active(&self) -> bool {
        self.status == RecurringStatus::Active
    }

    /// The stored next occurrence, or the anchor rolled forward by whole
    /// cycles when the stored value has gone stale.
    pub fn current_due_date(&self, today: NaiveDate) -> Result<NaiveDate> {
        roll_forward(self.next_occurrence, self.anchor_date, self.cycle, today)
    }

    /// Settles the occurrence currently owed and moves to the one after it.
    /// Cycles that lapsed before `now` are skipped, not owed.
    pub fn advance_cycle(&mut self, now: NaiveDateTime) -> Result<()> {
        if !self.is_active() {
            return Err(FinanceError::invalid(
                "status",
                format!("{} is cancelled", self.title),
            ));
        }
        let owed = self.current_due_date(now.date())?;
        self.next_occurrence = next_occurrence_after(self.anchor_date, self.cycle, day_after(owed)?)?;
        self.updated_at = now;
        Ok(())
    }

    /// Status flag only; cancelled records are kept.
    pub fn cancel(&mut self, now: NaiveDateTime) {
        if self.is_active() {
            self.status = RecurringStatus::Cancelled;
            self.updated_at = now;
        }
    }

    pub fn monthly_equivalent(&self) -> f64 {
        self.cycle.monthly_equivalent(self.amount)
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSubscription {
    pub name: String,
    #[serde(default)]
    pub provider: Option<String>,
    pub amount: f64,
    pub cycle: BillingCycle,
    pub start_date: NaiveDate,
    pub category: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub reminder: Reminder,
}

impl NewSubscription {
    /// The first renewal is one cycle after the start date, rolled forward
    /// past `now` for subscriptions that started long ago.
    pub fn into_record(self, now: NaiveDateTime) -> Result<RecurringObligation> {
        self.cycle.validate()?;
        let next_occurrence = next_occurrence_after(self.start_date, self.cycle, now.date())?;
        Ok(RecurringObligation {
            id: Uuid::new_v4(),
            kind: RecurringKind::Subscription,
            title: require_text("name", &self.name)?,
            provider: optional_text(self.provider),
            account_number: None,
            category: require_text("category", &self.category)?,
            amount: require_amount("amount", self.amount)?,
            cycle: self.cycle,
            anchor_date: self.start_date,
            next_occurrence,
            status: RecurringStatus::Active,
            payment_method: optional_text(self.payment_method),
            autopay: false,
            reminder: self.reminder,
            notes: None,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUtility {
    /// electricity, water, gas, internet, ...
    pub utility_type: String,
    pub provider_name: String,
    pub account_number: String,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub frequency: BillingCycle,
    #[serde(default)]
    pub autopay: bool,
    #[serde(default)]
    pub reminder: Reminder,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewUtility {
    pub fn into_record(self, now: NaiveDateTime) -> Result<RecurringObligation> {
        if let BillingCycle::Custom { .. } = self.frequency {
            return Err(FinanceError::invalid(
                "frequency",
                "utilities bill monthly, quarterly or yearly",
            ));
        }
        let next_occurrence = roll_forward(self.due_date, self.due_date, self.frequency, now.date())?;
        let provider = require_text("providerName", &self.provider_name)?;
        Ok(RecurringObligation {
            id: Uuid::new_v4(),
            kind: RecurringKind::Utility,
            title: provider.clone(),
            provider: Some(provider),
            account_number: Some(require_text("accountNumber", &self.account_number)?),
            category: require_text("utilityType", &self.utility_type)?,
            amount: require_amount("amount", self.amount)?,
            cycle: self.frequency,
            anchor_date: self.due_date,
            next_occurrence,
            status: RecurringStatus::Active,
            payment_method: None,
            autopay: self.autopay,
            reminder: self.reminder,
            notes: optional_text(self.notes),
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillStatus {
    Pending,
    Paid,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repeat {
    pub frequency: RepeatFrequency,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

/// A one-time bill, or one that repeats until an optional end date.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bill {
    pub id: Uuid,
    pub name: String,
    pub amount: f64,
    /// First due date as entered.
    pub due_date: NaiveDate,
    pub next_due_date: NaiveDate,
    pub category: String,
    #[serde(default)]
    pub repeat: Option<Repeat>,
    #[serde(default)]
    pub reminder: Reminder,
    #[serde(default)]
    pub notes: Option<String>,
    pub status: BillStatus,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Bill {
    pub fn is_pending(&self) -> bool {
        self.status == BillStatus::Pending
    }

    /// `None` once a bill is paid, or a repeating bill has run past its end date.
    /// One-time bills keep their date even when overdue.
    pub fn current_due_date(&self, today: NaiveDate) -> Result<Option<NaiveDate>> {
        if !self.is_pending() {
            return Ok(None);
        }
        match self.repeat {
            None => Ok(Some(self.next_due_date)),
            Some(repeat) => {
                let due = roll_forward(self.next_due_date, self.due_date, repeat.frequency.as_cycle(), today)?;
                Ok(within_end(due, repeat.end_date))
            }
        }
    }

    pub fn pay(&mut self, now: NaiveDateTime) -> Result<()> {
        if !self.is_pending() {
            return Err(FinanceError::invalid(
                "status",
                format!("bill {} is already paid", self.name),
            ));
        }
        match (self.repeat, self.current_due_date(now.date())?) {
            (Some(repeat), Some(owed)) => {
                let next = next_occurrence_after(
                    self.due_date,
                    repeat.frequency.as_cycle(),
                    day_after(owed)?,
                )?;
                match within_end(next, repeat.end_date) {
                    Some(next) => self.next_due_date = next,
                    None => self.status = BillStatus::Paid,
                }
            }
            _ => self.status = BillStatus::Paid,
        }
        self.updated_at = now;
        Ok(())
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBill {
    pub name: String,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub category: String,
    #[serde(default)]
    pub repeat: Option<Repeat>,
    #[serde(default)]
    pub reminder: Reminder,
    #[serde(default)]
    pub notes: Option<String>,
}

impl NewBill {
    pub fn into_record(self, now: NaiveDateTime) -> Result<Bill> {
        if let Some(Repeat {
            end_date: Some(end),
            ..
        }) = self.repeat
        {
            if end < self.due_date {
                return Err(FinanceError::invalid("endDate", "must not be before the due date"));
            }
        }
        Ok(Bill {
            id: Uuid::new_v4(),
            name: require_text("name", &self.name)?,
            amount: require_amount("amount", self.amount)?,
            due_date: self.due_date,
            next_due_date: self.due_date,
            category: require_text("category", &self.category)?,
            repeat: self.repeat,
            reminder: self.reminder,
            notes: optional_text(self.notes),
            status: BillStatus::Pending,
            created_at: now,
            updated_at: now,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanProduct {
    Personal,
    Home,
    Vehicle,
    Education,
}

impl LoanProduct {
    /// Advertised annual rate, percent.
    pub fn annual_rate_percent(&self) -> f64 {
        match self {
            LoanProduct::Personal => 10.5,
            LoanProduct::Home => 8.5,
            LoanProduct::Vehicle => 9.5,
            LoanProduct::Education => 7.5,
        }
    }
}

impl FromStr for LoanProduct {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "personal" => Ok(LoanProduct::Personal),
            "home" => Ok(LoanProduct::Home),
            "vehicle" => Ok(LoanProduct::Vehicle),
            "education" => Ok(LoanProduct::Education),
            other => Err(FinanceError::invalid(
                "product",
                format!("'{}' is not one of personal, home, vehicle, education", other),
            )),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplicationStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Applicant {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile: String,
}

impl Applicant {
    fn validated(self) -> Result<Self> {
        let email = self.email.trim().to_ascii_lowercase();
        if !is_email(&email) {
            return Err(FinanceError::invalid("email", format!("'{}' is not an email address", self.email)));
        }
        let mobile = self.mobile.trim().to_string();
        if !is_mobile(&mobile) {
            return Err(FinanceError::invalid("mobile", format!("'{}' is not a mobile number", self.mobile)));
        }
        Ok(Self {
            first_name: require_text("firstName", &self.first_name)?,
            last_name: require_text("lastName", &self.last_name)?,
            email,
            mobile,
        })
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanApplication {
    pub id: Uuid,
    /// `LOAN-YYYYMMDD-NNNN`, shown to the applicant.
    pub reference: String,
    pub product: LoanProduct,
    pub loan_amount: f64,
    pub tenure_months: u32,
    pub applicant: Applicant,
    #[serde(default)]
    pub employment_details: serde_json::Value,
    #[serde(default)]
    pub bank_details: serde_json::Value,
    pub emi: EmiBreakdown,
    pub status: ApplicationStatus,
    pub applied_at: NaiveDateTime,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLoanApplication {
    pub product: LoanProduct,
    pub loan_amount: f64,
    pub tenure_months: i64,
    pub applicant: Applicant,
    #[serde(default)]
    pub employment_details: serde_json::Value,
    #[serde(default)]
    pub bank_details: serde_json::Value,
}

impl NewLoanApplication {
    /// EMI, total and interest are computed once here and stored as is.
    pub fn into_record(self, now: NaiveDateTime) -> Result<LoanApplication> {
        let terms = LoanTerms::new(
            self.loan_amount,
            Some(self.product.annual_rate_percent()),
            self.tenure_months,
        )?;
        let applicant = self.applicant.validated()?;
        let id = Uuid::new_v4();
        let reference = format!(
            "LOAN-{}-{:04}",
            now.format("%Y%m%d"),
            id.as_u128() % 10_000
        );

        Ok(LoanApplication {
            id,
            reference,
            product: self.product,
            loan_amount: terms.principal,
            tenure_months: terms.tenure_months,
            applicant,
            employment_details: self.employment_details,
            bank_details: self.bank_details,
            emi: terms.emi()?,
            status: ApplicationStatus::Pending,
            applied_at: now,
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RechargeType {
    #[default]
    Prepaid,
    Postpaid,
}

impl FromStr for RechargeType {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prepaid" => Ok(RechargeType::Prepaid),
            "postpaid" => Ok(RechargeType::Postpaid),
            other => Err(FinanceError::invalid(
                "rechargeType",
                format!("'{}' is not prepaid or postpaid", other),
            )),
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RechargeStatus {
    Completed,
    Failed,
}

/// A mobile top-up as recorded in the history. No money moves here; the
/// record is bookkeeping for a payment made elsewhere.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recharge {
    pub id: Uuid,
    /// `IRIS<epoch millis><4 digits>`
    pub transaction_id: String,
    pub mobile_number: String,
    pub operator: String,
    pub recharge_type: RechargeType,
    pub amount: f64,
    pub payment_method: String,
    pub status: RechargeStatus,
    pub recharged_at: NaiveDateTime,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecharge {
    pub mobile_number: String,
    pub operator: String,
    #[serde(default)]
    pub recharge_type: RechargeType,
    pub amount: f64,
    pub payment_method: String,
}

impl NewRecharge {
    pub fn into_record(self, now: NaiveDateTime) -> Result<Recharge> {
        let mobile_number = self.mobile_number.trim().to_string();
        if !is_mobile(&mobile_number) {
            return Err(FinanceError::invalid(
                "mobileNumber",
                format!("'{}' is not a mobile number", self.mobile_number),
            ));
        }
        let amount = require_amount("amount", self.amount)?;
        if amount == 0. {
            return Err(FinanceError::invalid("amount", "must be greater than zero"));
        }
        let id = Uuid::new_v4();
        Ok(Recharge {
            id,
            transaction_id: format!(
                "IRIS{}{:04}",
                now.and_utc().timestamp_millis(),
                id.as_u128() % 10_000
            ),
            mobile_number,
            operator: require_text("operator", &self.operator)?,
            recharge_type: self.recharge_type,
            amount,
            payment_method: require_text("paymentMethod", &self.payment_method)?,
            status: RechargeStatus::Completed,
            recharged_at: now,
        })
    }
}

fn roll_forward(
    current: NaiveDate,
    anchor: NaiveDate,
    cycle: BillingCycle,
    today: NaiveDate,
) -> Result<NaiveDate> {
    if current >= today {
        Ok(current)
    } else {
        next_occurrence_after(anchor, cycle, today)
    }
}

fn within_end(date: NaiveDate, end: Option<NaiveDate>) -> Option<NaiveDate> {
    match end {
        Some(end) if date > end => None,
        _ => Some(date),
    }
}

fn day_after(date: NaiveDate) -> Result<NaiveDate> {
    date.checked_add_days(Days::new(1))
        .ok_or_else(|| FinanceError::InvalidDate(format!("no day after {}", date)))
}

fn require_text(field: &str, value: &str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(FinanceError::invalid(field, "must not be empty"))
    } else {
        Ok(trimmed.to_string())
    }
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn require_amount(field: &str, amount: f64) -> Result<f64> {
    if amount.is_finite() && amount >= 0. {
        Ok(amount)
    } else {
        Err(FinanceError::invalid(field, "must be a non-negative amount"))
    }
}

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$").expect("email pattern compiles")
});

static MOBILE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+?[0-9]{10,15}$").expect("mobile pattern compiles"));

fn is_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

fn is_mobile(mobile: &str) -> bool {
    MOBILE_PATTERN.is_match(mobile)
}

/// Date of installment `n`, counting from 1.
pub fn nth_installment_date(loan: &LoanObligation, n: u32) -> Result<NaiveDate> {
    if n == 0 || n > loan.tenure_months {
        return Err(FinanceError::invalid(
            "installment",
            format!("{} is outside 1..={}", n, loan.tenure_months),
        ));
    }
    advance(loan.payment_day_of_cycle, BillingCycle::Monthly, n - 1)
}
