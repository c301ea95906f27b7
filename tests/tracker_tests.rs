use chrono::{NaiveDate, NaiveDateTime};
use paytrack::dashboard::ObligationKind;
use paytrack::obligation::{
    Applicant, Bill, BillStatus, LoanApplication, LoanObligation, LoanProduct, LoanStatus,
    NewBill, NewLoan, NewLoanApplication, NewRecharge, NewSubscription, NewUtility, Recharge,
    RechargeType, RecurringObligation, RecurringStatus, Reminder,
};
use paytrack::schedule::BillingCycle;
use paytrack::store::{MemoryStore, ObligationStore};
use paytrack::tracker::{Clock, Tracker};
use paytrack::{FinanceError, Result};
use pretty_assertions::assert_eq;
use test_log::test;
use uuid::Uuid;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn july_10th() -> Clock {
    Clock::Fixed(date(2025, 7, 10).and_hms_opt(8, 0, 0).unwrap())
}

fn at(day: NaiveDate) -> Clock {
    Clock::Fixed(day.and_hms_opt(9, 30, 0).unwrap())
}

fn home_loan() -> NewLoan {
    NewLoan {
        name: "Home Loan".to_string(),
        principal: 2_500_000.,
        annual_rate_percent: Some(8.5),
        tenure_months: 240,
        installment_amount: None,
        payment_date: date(2025, 7, 15),
        bank_details: "HDFC Bank".to_string(),
        reminder: Reminder::default(),
    }
}

fn netflix() -> NewSubscription {
    NewSubscription {
        name: "Netflix".to_string(),
        provider: Some("Netflix".to_string()),
        amount: 649.,
        cycle: BillingCycle::Monthly,
        start_date: date(2025, 6, 20),
        category: "Entertainment".to_string(),
        payment_method: Some("card".to_string()),
        reminder: Reminder::default(),
    }
}

fn electricity() -> NewUtility {
    NewUtility {
        utility_type: "electricity".to_string(),
        provider_name: "BESCOM".to_string(),
        account_number: "7741-22".to_string(),
        amount: 2500.,
        due_date: date(2025, 7, 18),
        frequency: BillingCycle::Monthly,
        autopay: false,
        reminder: Reminder::default(),
        notes: None,
    }
}

fn card_bill() -> NewBill {
    NewBill {
        name: "Credit card".to_string(),
        amount: 12_000.,
        due_date: date(2025, 7, 12),
        category: "cards".to_string(),
        repeat: None,
        reminder: Reminder::default(),
        notes: None,
    }
}

struct Seeded {
    tracker: Tracker<MemoryStore>,
    loan: Uuid,
    subscription: Uuid,
    utility: Uuid,
    bill: Uuid,
}

fn seeded() -> Seeded {
    let mut tracker = Tracker::with_clock(MemoryStore::new(), july_10th());
    let loan = tracker.create_loan(home_loan()).unwrap();
    let subscription = tracker.create_subscription(netflix()).unwrap();
    let utility = tracker.create_utility(electricity()).unwrap();
    let bill = tracker.create_bill(card_bill()).unwrap();
    Seeded {
        tracker,
        loan,
        subscription,
        utility,
        bill,
    }
}

#[test]
fn dashboard_ranks_every_kind_by_due_date() {
    let s = seeded();
    let dashboard = s.tracker.dashboard(5).unwrap();

    assert_eq!(dashboard.total_dues, 36_844.58);
    let ranked: Vec<(ObligationKind, i64)> = dashboard
        .upcoming_payments
        .iter()
        .map(|p| (p.kind, p.days_left))
        .collect();
    assert_eq!(
        ranked,
        vec![
            (ObligationKind::Bill, 2),
            (ObligationKind::Emi, 5),
            (ObligationKind::Utility, 8),
            (ObligationKind::Subscription, 10),
        ]
    );
    assert_eq!(dashboard.upcoming_payments[1].id, s.loan);
    assert_eq!(dashboard.upcoming_payments[1].amount, 21_695.58);
}

#[test]
fn dashboard_limit_truncates_but_total_does_not() {
    let s = seeded();
    let dashboard = s.tracker.dashboard(2).unwrap();
    assert_eq!(dashboard.upcoming_payments.len(), 2);
    assert_eq!(dashboard.total_dues, 36_844.58);
}

#[test]
fn paying_an_emi_moves_it_a_month_on() {
    let mut s = seeded();
    let loan = s.tracker.pay_loan(s.loan).unwrap();

    assert_eq!(loan.remaining_tenure_months, 239);
    assert_eq!(loan.next_due_date, date(2025, 8, 15));
    assert_eq!(loan.status, LoanStatus::Active);
    assert_eq!(s.tracker.list_loans().unwrap(), vec![loan]);
}

#[test]
fn cancelled_subscription_drops_out_of_dues() {
    let mut s = seeded();
    let cancelled = s.tracker.cancel_subscription(s.subscription).unwrap();
    assert_eq!(cancelled.status, RecurringStatus::Cancelled);

    // still listed, no longer counted
    assert_eq!(s.tracker.list_subscriptions().unwrap().len(), 1);
    assert_eq!(s.tracker.monthly_subscription_spend().unwrap(), 0.);

    let dashboard = s.tracker.dashboard(5).unwrap();
    assert_eq!(dashboard.total_dues, 36_195.58);
    assert_eq!(dashboard.categories.subscriptions, 0);
    assert!(dashboard
        .upcoming_payments
        .iter()
        .all(|p| p.id != s.subscription));
}

#[test]
fn paying_a_utility_advances_its_cycle() {
    let mut s = seeded();
    let utility = s.tracker.pay_utility(s.utility).unwrap();
    assert_eq!(utility.next_occurrence, date(2025, 8, 18));
    assert_eq!(s.tracker.list_utilities().unwrap(), vec![utility]);
}

#[test]
fn months_later_every_view_agrees_on_due_dates() {
    let s = seeded();
    let mut later = Tracker::with_clock(s.tracker.into_store(), at(date(2025, 10, 1)));

    let subscriptions = later.list_subscriptions().unwrap();
    assert_eq!(subscriptions[0].next_occurrence, date(2025, 10, 20));
    let utilities = later.list_utilities().unwrap();
    assert_eq!(utilities[0].next_occurrence, date(2025, 10, 18));

    let dashboard = later.dashboard(5).unwrap();
    let ranked: Vec<(Uuid, NaiveDate, i64)> = dashboard
        .upcoming_payments
        .iter()
        .map(|p| (p.id, p.due_date, p.days_left))
        .collect();
    assert_eq!(
        ranked,
        vec![
            (s.bill, date(2025, 7, 12), -81),
            (s.loan, date(2025, 7, 15), -78),
            (s.utility, date(2025, 10, 18), 17),
            (s.subscription, date(2025, 10, 20), 19),
        ]
    );

    // paying settles the owed cycle, so the shown date moves on
    let paid = later.pay_utility(s.utility).unwrap();
    assert_eq!(paid.next_occurrence, date(2025, 11, 18));
    assert_eq!(later.list_utilities().unwrap()[0].next_occurrence, date(2025, 11, 18));
    let dashboard = later.dashboard(5).unwrap();
    let utility = dashboard
        .upcoming_payments
        .iter()
        .find(|p| p.id == s.utility)
        .unwrap();
    assert_eq!((utility.due_date, utility.days_left), (date(2025, 11, 18), 48));
}

#[test]
fn long_running_subscription_lists_its_next_renewal() {
    let mut tracker = Tracker::with_clock(MemoryStore::new(), at(date(2025, 1, 25)));
    let id = tracker
        .create_subscription(NewSubscription {
            start_date: date(2025, 1, 20),
            ..netflix()
        })
        .unwrap();
    assert_eq!(tracker.list_subscriptions().unwrap()[0].next_occurrence, date(2025, 2, 20));

    let later = Tracker::with_clock(tracker.into_store(), at(date(2026, 10, 19)));
    let listed = later.list_subscriptions().unwrap();
    let shown = later.dashboard(5).unwrap().upcoming_payments;
    assert_eq!(listed[0].id, id);
    assert_eq!(listed[0].next_occurrence, date(2026, 10, 20));
    assert_eq!(shown[0].due_date, date(2026, 10, 20));
    // listing does not write the derived date back
    assert_eq!(later.store().recurring().unwrap()[0].next_occurrence, date(2025, 2, 20));
}

#[test]
fn repeating_bill_lists_the_owed_date() {
    let mut tracker = Tracker::with_clock(MemoryStore::new(), july_10th());
    let id = tracker
        .create_bill(NewBill {
            name: "Rent".to_string(),
            amount: 25_000.,
            due_date: date(2025, 7, 1),
            repeat: Some(paytrack::obligation::Repeat {
                frequency: paytrack::schedule::RepeatFrequency::Monthly,
                end_date: None,
            }),
            ..card_bill()
        })
        .unwrap();

    let mut later = Tracker::with_clock(tracker.into_store(), at(date(2025, 9, 20)));
    assert_eq!(later.list_bills().unwrap()[0].next_due_date, date(2025, 10, 1));
    let bill = later.pay_bill(id).unwrap();
    assert_eq!(bill.next_due_date, date(2025, 11, 1));
    assert_eq!(bill.status, BillStatus::Pending);
}

#[test]
fn recharges_are_kept_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paytrack.json");
    let top_up = NewRecharge {
        mobile_number: "9876543210".to_string(),
        operator: "jio".to_string(),
        recharge_type: RechargeType::Prepaid,
        amount: 239.,
        payment_method: "upi".to_string(),
    };

    let mut tracker = Tracker::with_clock(MemoryStore::load(&path).unwrap(), july_10th());
    let first = tracker.record_recharge(top_up.clone()).unwrap();
    let mut tracker = Tracker::with_clock(tracker.into_store(), at(date(2025, 8, 10)));
    let second = tracker
        .record_recharge(NewRecharge {
            amount: 479.,
            ..top_up
        })
        .unwrap();
    assert_ne!(first.transaction_id, second.transaction_id);
    drop(tracker);

    let reopened = Tracker::new(MemoryStore::load(&path).unwrap());
    let history: Vec<f64> = reopened.list_recharges().unwrap().iter().map(|r| r.amount).collect();
    assert_eq!(history, vec![479., 239.]);
}

#[test]
fn ids_of_the_wrong_kind_are_not_found() {
    let mut s = seeded();
    assert!(matches!(
        s.tracker.pay_utility(s.subscription),
        Err(FinanceError::NotFound { .. })
    ));
    assert!(matches!(
        s.tracker.cancel_subscription(s.utility),
        Err(FinanceError::NotFound { .. })
    ));
    assert!(matches!(
        s.tracker.pay_loan(Uuid::new_v4()),
        Err(FinanceError::NotFound { .. })
    ));
}

#[test]
fn one_time_bill_is_paid_once() {
    let mut s = seeded();
    let bill = s.tracker.pay_bill(s.bill).unwrap();
    assert_eq!(bill.status, BillStatus::Paid);
    assert!(matches!(
        s.tracker.pay_bill(s.bill),
        Err(FinanceError::InvalidInput { .. })
    ));

    let dashboard = s.tracker.dashboard(5).unwrap();
    assert_eq!(dashboard.categories.bills, 0);
    assert_eq!(dashboard.total_dues, 24_844.58);
}

#[test]
fn yearly_subscriptions_count_per_month() {
    let mut s = seeded();
    s.tracker
        .create_subscription(NewSubscription {
            name: "Prime".to_string(),
            amount: 1_500.,
            cycle: BillingCycle::Yearly,
            start_date: date(2025, 3, 1),
            ..netflix()
        })
        .unwrap();
    assert_eq!(s.tracker.monthly_subscription_spend().unwrap(), 649. + 125.);
}

#[test]
fn loan_application_carries_computed_emi() {
    let mut tracker = Tracker::with_clock(MemoryStore::new(), july_10th());
    let application = tracker
        .submit_loan_application(NewLoanApplication {
            product: LoanProduct::Home,
            loan_amount: 2_500_000.,
            tenure_months: 240,
            applicant: Applicant {
                first_name: "Asha".to_string(),
                last_name: "Rao".to_string(),
                email: "Asha.Rao@example.com".to_string(),
                mobile: "9876543210".to_string(),
            },
            employment_details: serde_json::json!({ "employer": "Acme" }),
            bank_details: serde_json::Value::Null,
        })
        .unwrap();

    assert!(application.reference.starts_with("LOAN-20250710-"));
    assert_eq!(application.emi.rounded(0).installment, 21_696.);
    assert_eq!(application.applicant.email, "asha.rao@example.com");
    assert_eq!(tracker.store().applications().unwrap(), vec![application]);
}

#[test]
fn writes_survive_a_reload() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("paytrack.json");

    let mut tracker = Tracker::with_clock(MemoryStore::load(&path).unwrap(), july_10th());
    let loan = tracker.create_loan(home_loan()).unwrap();
    tracker.pay_loan(loan).unwrap();
    drop(tracker);

    let reopened = Tracker::with_clock(MemoryStore::load(&path).unwrap(), july_10th());
    let loans = reopened.list_loans().unwrap();
    assert_eq!(loans.len(), 1);
    assert_eq!(loans[0].remaining_tenure_months, 239);
}

/// Store whose bill source is down.
#[derive(Default)]
struct BillsDown {
    inner: MemoryStore,
}

impl ObligationStore for BillsDown {
    fn loans(&self) -> Result<Vec<LoanObligation>> {
        self.inner.loans()
    }

    fn recurring(&self) -> Result<Vec<RecurringObligation>> {
        self.inner.recurring()
    }

    fn bills(&self) -> Result<Vec<Bill>> {
        Err(FinanceError::unavailable("bills", "connection reset"))
    }

    fn applications(&self) -> Result<Vec<LoanApplication>> {
        self.inner.applications()
    }

    fn recharges(&self) -> Result<Vec<Recharge>> {
        self.inner.recharges()
    }

    fn put_loan(&mut self, loan: LoanObligation) -> Result<()> {
        self.inner.put_loan(loan)
    }

    fn put_recurring(&mut self, obligation: RecurringObligation) -> Result<()> {
        self.inner.put_recurring(obligation)
    }

    fn put_bill(&mut self, bill: Bill) -> Result<()> {
        self.inner.put_bill(bill)
    }

    fn put_application(&mut self, application: LoanApplication) -> Result<()> {
        self.inner.put_application(application)
    }

    fn put_recharge(&mut self, recharge: Recharge) -> Result<()> {
        self.inner.put_recharge(recharge)
    }
}

#[test]
fn unreadable_source_fails_the_dashboard() {
    let mut tracker = Tracker::with_clock(BillsDown::default(), july_10th());
    tracker.create_loan(home_loan()).unwrap();

    assert!(matches!(
        tracker.dashboard(5),
        Err(FinanceError::DataUnavailable { .. })
    ));
    // other reads are unaffected
    assert_eq!(tracker.list_loans().unwrap().len(), 1);
}

#[test]
fn fixed_clock_is_used_for_timestamps() {
    let s = seeded();
    let at: NaiveDateTime = date(2025, 7, 10).and_hms_opt(8, 0, 0).unwrap();
    assert!(s.tracker.list_loans().unwrap().iter().all(|l| l.created_at == at));
    assert_eq!(s.tracker.today(), date(2025, 7, 10));
}
