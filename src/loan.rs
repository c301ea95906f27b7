use crate::error::{FinanceError, Result};
use crate::schedule::{advance, BillingCycle};
use chrono::NaiveDate;
use log::{debug, trace};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Longest tenure accepted, in months (100 years).
pub const MAX_TENURE_MONTHS: u32 = 1200;

/// Validated loan terms. Monthly installments, nominal annual rate in percent.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanTerms {
    pub principal: f64,
    pub annual_rate_percent: f64,
    pub tenure_months: u32,
}

/// Installment and the totals derived from it. Values are unrounded; use
/// [`EmiBreakdown::rounded`] at the display boundary.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmiBreakdown {
    pub installment: f64,
    pub total_amount: f64,
    pub total_interest: f64,
}

impl EmiBreakdown {
    pub fn rounded(&self, dec_places: u32) -> Self {
        Self {
            installment: round(self.installment, dec_places),
            total_amount: round(self.total_amount, dec_places),
            total_interest: round(self.total_interest, dec_places),
        }
    }
}

impl fmt::Display for EmiBreakdown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "installment {:.2}, total payable {:.2}, total interest {:.2}",
            self.installment, self.total_amount, self.total_interest
        )
    }
}

impl LoanTerms {
    /// A missing rate means an interest-free loan.
    pub fn new(principal: f64, annual_rate_percent: Option<f64>, tenure_months: i64) -> Result<Self> {
        if !principal.is_finite() || principal <= 0. {
            return Err(FinanceError::invalid("principal", "must be greater than zero"));
        }
        let annual_rate_percent = annual_rate_percent.unwrap_or(0.);
        if !annual_rate_percent.is_finite() || annual_rate_percent < 0. {
            return Err(FinanceError::invalid(
                "annualRatePercent",
                "must be zero or greater",
            ));
        }
        if tenure_months <= 0 {
            return Err(FinanceError::invalid("tenureMonths", "must be at least one month"));
        }
        let tenure_months = u32::try_from(tenure_months)
            .ok()
            .filter(|n| *n <= MAX_TENURE_MONTHS)
            .ok_or_else(|| {
                FinanceError::invalid(
                    "tenureMonths",
                    format!("must be at most {} months", MAX_TENURE_MONTHS),
                )
            })?;

        Ok(Self {
            principal,
            annual_rate_percent,
            tenure_months,
        })
    }

    pub fn monthly_rate(&self) -> f64 {
        self.annual_rate_percent / 12. / 100.
    }

    /// Equal monthly installment by the annuity formula; `P / N` when the
    /// loan is interest free.
    pub fn installment(&self) -> Result<f64> {
        let r = self.monthly_rate();
        let n = f64::from(self.tenure_months);

        let installment = if r == 0. {
            self.principal / n
        } else {
            let factor = (1. + r).powf(n);
            (self.principal * r * factor) / (factor - 1.)
        };

        if !installment.is_finite() {
            return Err(FinanceError::invalid(
                "annualRatePercent",
                format!(
                    "{}% over {} months cannot be amortized",
                    self.annual_rate_percent, self.tenure_months
                ),
            ));
        }
        Ok(installment)
    }

    pub fn emi(&self) -> Result<EmiBreakdown> {
        let installment = self.installment()?;
        let total_amount = installment * f64::from(self.tenure_months);
        let breakdown = EmiBreakdown {
            installment,
            total_amount,
            total_interest: total_amount - self.principal,
        };
        debug!(
            "principal {}, rate {}%, {} months: {}",
            self.principal, self.annual_rate_percent, self.tenure_months, breakdown
        );
        Ok(breakdown)
    }

    /// True when `stored` is what this loan's installment rounds to at
    /// `dec_places` (0 for whole-unit figures, 2 for cents).
    pub fn reproduces_installment(&self, stored: f64, dec_places: u32) -> Result<bool> {
        let tolerance = 0.5 / 10_f64.powi(dec_places as i32) + 1e-9;
        Ok((self.installment()? - stored).abs() <= tolerance)
    }
}

/// Convenience wrapper: validate the terms and compute the breakdown.
pub fn calculate_emi(
    principal: f64,
    annual_rate_percent: Option<f64>,
    tenure_months: i64,
) -> Result<EmiBreakdown> {
    LoanTerms::new(principal, annual_rate_percent, tenure_months)?.emi()
}

#[derive(PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanPayment {
    pub pmt_number: u32,
    pub pmt_date: NaiveDate,
    pub pmt_amount: f64,
    pub pmt_interest_paid: f64,
    pub pmt_principal_paid: f64,
    pub pmt_end_balance: f64,
}

impl fmt::Display for LoanPayment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pmt number {}, date {}, payment {:.2}, interest paid {:.2}, principal paid {:.2}, ending balance {:.2}",
            self.pmt_number,
            self.pmt_date,
            self.pmt_amount,
            self.pmt_interest_paid,
            self.pmt_principal_paid,
            self.pmt_end_balance
        )
    }
}

/// Month-by-month schedule starting at `first_pmt_date`. Balances run
/// unrounded; each row is rounded to cents. The last payment absorbs the
/// residual so the loan closes at exactly zero.
pub fn amortization_schedule(terms: &LoanTerms, first_pmt_date: NaiveDate) -> Result<Vec<LoanPayment>> {
    let pmt_amount = terms.installment()?;
    let rate = terms.monthly_rate();
    let mut sched_pmt = Vec::with_capacity(terms.tenure_months as usize);
    let mut begin_balance = terms.principal;

    for pmt_number in 1..=terms.tenure_months {
        let pmt_date = advance(first_pmt_date, BillingCycle::Monthly, pmt_number - 1)?;
        let interest = begin_balance * rate;

        let (pmt_amt, end_balance) = if pmt_number == terms.tenure_months {
            (begin_balance + interest, 0.)
        } else {
            (pmt_amount, begin_balance - (pmt_amount - interest))
        };
        trace!(
            "Pmt # {}, date {}, interest {}, end bal {}",
            pmt_number,
            pmt_date,
            interest,
            end_balance
        );

        sched_pmt.push(LoanPayment {
            pmt_number,
            pmt_date,
            pmt_amount: round(pmt_amt, 2),
            pmt_interest_paid: round(interest, 2),
            pmt_principal_paid: round(pmt_amt - interest, 2),
            pmt_end_balance: round(end_balance, 2),
        });
        begin_balance = end_balance;
    }
    Ok(sched_pmt)
}

/// "18 months", "2 years", "2 years 6 months".
pub fn format_tenure(months: u32) -> String {
    let (years, rest) = (months / 12, months % 12);
    let unit = |n: u32, one: &str, many: &str| format!("{} {}", n, if n == 1 { one } else { many });
    match (years, rest) {
        (0, m) => unit(m, "month", "months"),
        (y, 0) => unit(y, "year", "years"),
        (y, m) => format!("{} {}", unit(y, "year", "years"), unit(m, "month", "months")),
    }
}

pub fn round(amt: f64, dec_places: u32) -> f64 {
    if amt == 0. {
        0.
    } else {
        let scale = 10_f64.powi(dec_places as i32);
        (amt * scale).round() / scale
    }
}
