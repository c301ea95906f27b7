//! Obligation management over an injected [`ObligationStore`].

use crate::dashboard::{build_dashboard, Dashboard};
use crate::error::Result;
use crate::obligation::{
    Bill, LoanApplication, LoanObligation, NewBill, NewLoan, NewLoanApplication, NewRecharge,
    NewSubscription, NewUtility, Recharge, RecurringKind, RecurringObligation,
};
use crate::store::ObligationStore;
use chrono::{Local, NaiveDate, NaiveDateTime};
use log::info;
use uuid::Uuid;

/// Where "now" comes from. Fixed clocks make runs reproducible.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Clock {
    System,
    Fixed(NaiveDateTime),
}

impl Clock {
    pub fn now(&self) -> NaiveDateTime {
        match self {
            Clock::System => Local::now().naive_local(),
            Clock::Fixed(at) => *at,
        }
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date()
    }
}

pub struct Tracker<S: ObligationStore> {
    store: S,
    clock: Clock,
}

impl<S: ObligationStore> Tracker<S> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, Clock::System)
    }

    pub fn with_clock(store: S, clock: Clock) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    pub fn create_loan(&mut self, input: NewLoan) -> Result<Uuid> {
        let loan = input.into_record(self.clock.now())?;
        let id = loan.id;
        info!("adding loan {} ({}), installment {:.2}", id, loan.name, loan.installment_amount);
        self.store.put_loan(loan)?;
        self.store.flush()?;
        Ok(id)
    }

    /// Active loans, soonest due first.
    pub fn list_loans(&self) -> Result<Vec<LoanObligation>> {
        let mut loans: Vec<_> = self.store.loans()?.into_iter().filter(|l| l.is_active()).collect();
        loans.sort_by_key(|l| l.next_due_date);
        Ok(loans)
    }

    pub fn pay_loan(&mut self, id: Uuid) -> Result<LoanObligation> {
        let mut loan = self.store.loan(id)?;
        loan.record_payment(self.clock.now())?;
        info!("installment paid on loan {} ({})", id, loan.name);
        self.store.put_loan(loan.clone())?;
        self.store.flush()?;
        Ok(loan)
    }

    pub fn create_subscription(&mut self, input: NewSubscription) -> Result<Uuid> {
        let subscription = input.into_record(self.clock.now())?;
        let id = subscription.id;
        info!(
            "adding subscription {} ({}), renews {}",
            id, subscription.title, subscription.next_occurrence
        );
        self.store.put_recurring(subscription)?;
        self.store.flush()?;
        Ok(id)
    }

    /// All subscriptions, cancelled ones included, by next renewal.
    pub fn list_subscriptions(&self) -> Result<Vec<RecurringObligation>> {
        self.list_recurring(RecurringKind::Subscription, false)
    }

    pub fn cancel_subscription(&mut self, id: Uuid) -> Result<RecurringObligation> {
        let mut subscription = self.recurring_of_kind(id, RecurringKind::Subscription)?;
        subscription.cancel(self.clock.now());
        info!("cancelled subscription {} ({})", id, subscription.title);
        self.store.put_recurring(subscription.clone())?;
        self.store.flush()?;
        Ok(subscription)
    }

    pub fn create_utility(&mut self, input: NewUtility) -> Result<Uuid> {
        let utility = input.into_record(self.clock.now())?;
        let id = utility.id;
        info!("adding utility {} ({}), due {}", id, utility.title, utility.next_occurrence);
        self.store.put_recurring(utility)?;
        self.store.flush()?;
        Ok(id)
    }

    /// Active utility accounts by due date.
    pub fn list_utilities(&self) -> Result<Vec<RecurringObligation>> {
        self.list_recurring(RecurringKind::Utility, true)
    }

    pub fn pay_utility(&mut self, id: Uuid) -> Result<RecurringObligation> {
        let mut utility = self.recurring_of_kind(id, RecurringKind::Utility)?;
        utility.advance_cycle(self.clock.now())?;
        info!("utility {} ({}) paid, next due {}", id, utility.title, utility.next_occurrence);
        self.store.put_recurring(utility.clone())?;
        self.store.flush()?;
        Ok(utility)
    }

    pub fn create_bill(&mut self, input: NewBill) -> Result<Uuid> {
        let bill = input.into_record(self.clock.now())?;
        let id = bill.id;
        info!("adding bill {} ({}), due {}", id, bill.name, bill.next_due_date);
        self.store.put_bill(bill)?;
        self.store.flush()?;
        Ok(id)
    }

    /// Every bill, paid or not, by due date. Pending repeating bills report
    /// the date currently owed.
    pub fn list_bills(&self) -> Result<Vec<Bill>> {
        let today = self.today();
        let mut bills = self.store.bills()?;
        for bill in bills.iter_mut() {
            if let Some(due) = bill.current_due_date(today)? {
                bill.next_due_date = due;
            }
        }
        bills.sort_by_key(|b| b.next_due_date);
        Ok(bills)
    }

    pub fn pay_bill(&mut self, id: Uuid) -> Result<Bill> {
        let mut bill = self.store.bill(id)?;
        bill.pay(self.clock.now())?;
        info!("bill {} ({}) paid", id, bill.name);
        self.store.put_bill(bill.clone())?;
        self.store.flush()?;
        Ok(bill)
    }

    pub fn submit_loan_application(&mut self, input: NewLoanApplication) -> Result<LoanApplication> {
        let application = input.into_record(self.clock.now())?;
        info!(
            "loan application {} for {:.2} over {} months",
            application.reference, application.loan_amount, application.tenure_months
        );
        self.store.put_application(application.clone())?;
        self.store.flush()?;
        Ok(application)
    }

    pub fn record_recharge(&mut self, input: NewRecharge) -> Result<Recharge> {
        let recharge = input.into_record(self.clock.now())?;
        info!(
            "recharge {} of {:.2} for {} ({})",
            recharge.transaction_id, recharge.amount, recharge.mobile_number, recharge.operator
        );
        self.store.put_recharge(recharge.clone())?;
        self.store.flush()?;
        Ok(recharge)
    }

    /// Recharge history, newest first.
    pub fn list_recharges(&self) -> Result<Vec<Recharge>> {
        let mut recharges = self.store.recharges()?;
        recharges.sort_by(|a, b| b.recharged_at.cmp(&a.recharged_at));
        Ok(recharges)
    }

    /// Sum of active subscriptions expressed per month.
    pub fn monthly_subscription_spend(&self) -> Result<f64> {
        Ok(self
            .list_subscriptions()?
            .iter()
            .filter(|s| s.is_active())
            .map(|s| s.monthly_equivalent())
            .sum())
    }

    pub fn dashboard(&self, limit: usize) -> Result<Dashboard> {
        build_dashboard(&self.store, self.today(), limit)
    }

    // returned copies carry the re-derived due date; the store is untouched
    fn list_recurring(&self, kind: RecurringKind, active_only: bool) -> Result<Vec<RecurringObligation>> {
        let today = self.today();
        let mut items = Vec::new();
        for mut item in self.store.recurring()? {
            if item.kind != kind || (active_only && !item.is_active()) {
                continue;
            }
            if item.is_active() {
                item.next_occurrence = item.current_due_date(today)?;
            }
            items.push(item);
        }
        items.sort_by_key(|r| r.next_occurrence);
        Ok(items)
    }

    // a subscription id passed to pay_utility is as missing as an unknown id
    fn recurring_of_kind(&self, id: Uuid, kind: RecurringKind) -> Result<RecurringObligation> {
        let obligation = self.store.recurring_by_id(id)?;
        if obligation.kind == kind {
            Ok(obligation)
        } else {
            let name = match kind {
                RecurringKind::Subscription => "subscription",
                RecurringKind::Utility => "utility",
            };
            Err(crate::error::FinanceError::not_found(name, id))
        }
    }
}
