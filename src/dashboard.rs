//! Read-only dashboard projection over every kind of obligation.

use crate::error::Result;
use crate::loan::round;
use crate::obligation::{Bill, LoanObligation, RecurringKind, RecurringObligation};
use crate::schedule::days_until;
use crate::store::ObligationStore;
use chrono::NaiveDate;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const DEFAULT_UPCOMING_LIMIT: usize = 5;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum ObligationKind {
    #[serde(rename = "EMI")]
    Emi,
    Subscription,
    Utility,
    Bill,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DisplayStyle {
    pub icon: &'static str,
    pub color: &'static str,
}

impl ObligationKind {
    pub fn style(&self) -> DisplayStyle {
        let (icon, color) = match self {
            ObligationKind::Emi => ("cash", "#3b82f6"),
            ObligationKind::Subscription => ("refresh", "#10b981"),
            ObligationKind::Utility => ("bulb", "#8b5cf6"),
            ObligationKind::Bill => ("card", "#6b7280"),
        };
        DisplayStyle { icon, color }
    }
}

impl From<RecurringKind> for ObligationKind {
    fn from(kind: RecurringKind) -> Self {
        match kind {
            RecurringKind::Subscription => ObligationKind::Subscription,
            RecurringKind::Utility => ObligationKind::Utility,
        }
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingPayment {
    pub id: Uuid,
    pub kind: ObligationKind,
    pub title: String,
    pub amount: f64,
    pub due_date: NaiveDate,
    pub days_left: i64,
    pub display_icon: String,
    pub display_color: String,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCounts {
    pub emis: usize,
    pub subscriptions: usize,
    pub utilities: usize,
    pub bills: usize,
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    /// Every active obligation's amount, whatever its due date.
    pub total_dues: f64,
    pub upcoming_payments: Vec<UpcomingPayment>,
    pub categories: CategoryCounts,
}

struct Candidate {
    id: Uuid,
    kind: ObligationKind,
    title: String,
    amount: f64,
    due_date: NaiveDate,
}

/// Merges active loans, active subscriptions/utilities and pending bills,
/// ranks them by due date and keeps the first `limit`. Nothing is mutated.
pub fn aggregate(
    loans: &[LoanObligation],
    recurring: &[RecurringObligation],
    bills: &[Bill],
    today: NaiveDate,
    limit: usize,
) -> Result<Dashboard> {
    let mut categories = CategoryCounts::default();
    let mut total_dues = 0.;
    let mut candidates = Vec::new();

    for loan in loans.iter().filter(|l| l.is_active()) {
        categories.emis += 1;
        total_dues += loan.installment_amount;
        candidates.push(Candidate {
            id: loan.id,
            kind: ObligationKind::Emi,
            title: loan.name.clone(),
            amount: loan.installment_amount,
            due_date: loan.next_due_date,
        });
    }

    for obligation in recurring.iter().filter(|r| r.is_active()) {
        match obligation.kind {
            RecurringKind::Subscription => categories.subscriptions += 1,
            RecurringKind::Utility => categories.utilities += 1,
        }
        total_dues += obligation.amount;
        candidates.push(Candidate {
            id: obligation.id,
            kind: obligation.kind.into(),
            title: obligation.title.clone(),
            amount: obligation.amount,
            due_date: obligation.current_due_date(today)?,
        });
    }

    for bill in bills.iter().filter(|b| b.is_pending()) {
        categories.bills += 1;
        total_dues += bill.amount;
        if let Some(due_date) = bill.current_due_date(today)? {
            candidates.push(Candidate {
                id: bill.id,
                kind: ObligationKind::Bill,
                title: bill.name.clone(),
                amount: bill.amount,
                due_date,
            });
        }
    }

    candidates.sort_by_key(|c| c.due_date);
    debug!(
        "{} candidates for the upcoming list, keeping {}",
        candidates.len(),
        limit
    );

    let upcoming_payments = candidates
        .into_iter()
        .take(limit)
        .map(|c| {
            let style = c.kind.style();
            UpcomingPayment {
                id: c.id,
                kind: c.kind,
                title: c.title,
                amount: c.amount,
                due_date: c.due_date,
                days_left: days_until(c.due_date, today),
                display_icon: style.icon.to_string(),
                display_color: style.color.to_string(),
            }
        })
        .collect();

    Ok(Dashboard {
        total_dues: round(total_dues, 2),
        upcoming_payments,
        categories,
    })
}

/// Reads every source from `store` and aggregates. Any failed read fails the
/// whole dashboard.
pub fn build_dashboard<S: ObligationStore + ?Sized>(
    store: &S,
    today: NaiveDate,
    limit: usize,
) -> Result<Dashboard> {
    let loans = store.loans().map_err(|e| {
        warn!("dashboard: loans unavailable: {}", e);
        e
    })?;
    let recurring = store.recurring().map_err(|e| {
        warn!("dashboard: subscriptions/utilities unavailable: {}", e);
        e
    })?;
    let bills = store.bills().map_err(|e| {
        warn!("dashboard: bills unavailable: {}", e);
        e
    })?;
    aggregate(&loans, &recurring, &bills, today, limit)
}
