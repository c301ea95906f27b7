use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::debug;
use paytrack::config::Config;
use paytrack::dashboard::Dashboard;
use paytrack::loan::{amortization_schedule, format_tenure, LoanTerms};
use paytrack::obligation::{
    Applicant, LoanProduct, NewBill, NewLoan, NewLoanApplication, NewRecharge, NewSubscription,
    NewUtility, RechargeType, Reminder, Repeat,
};
use paytrack::schedule::{
    days_until, due_status_text, next_occurrence, next_occurrence_after, parse_date,
    BillingCycle, RepeatFrequency, Urgency,
};
use paytrack::store::MemoryStore;
use paytrack::tracker::{Clock, Tracker};
use serde::Serialize;
use simple_logger::SimpleLogger;
use std::error::Error;
use std::path::PathBuf;
use std::process;
use uuid::Uuid;

/// Track EMIs, subscriptions, utility accounts and bills
#[derive(Parser)]
#[command(name = "paytrack", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// YAML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON data file (overrides the configuration)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    /// Treat this date as today
    #[arg(long, global = true, value_parser = parse_date)]
    today: Option<NaiveDate>,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Text,
}

#[derive(Subcommand)]
enum Commands {
    /// Equal monthly installment, total payable and total interest
    Emi(EmiArgs),
    /// Next renewal date of a recurring cycle
    NextDate(NextDateArgs),
    /// Days from today to a date (negative when overdue)
    DaysUntil(DaysUntilArgs),
    /// Total dues and the upcoming payments
    Dashboard(DashboardArgs),
    /// Installment loans
    #[command(subcommand)]
    Loans(LoanCommand),
    /// Subscriptions
    #[command(subcommand)]
    Subscriptions(SubscriptionCommand),
    /// Utility accounts
    #[command(subcommand)]
    Utilities(UtilityCommand),
    /// One-time and repeating bills
    #[command(subcommand)]
    Bills(BillCommand),
    /// Submit a loan application
    Apply(ApplyArgs),
    /// Mobile recharge history
    #[command(subcommand)]
    Recharges(RechargeCommand),
}

#[derive(Args)]
struct EmiArgs {
    #[arg(long)]
    principal: f64,
    /// Annual rate in percent; omit for an interest-free loan
    #[arg(long)]
    rate: Option<f64>,
    /// Tenure in months
    #[arg(long, allow_negative_numbers = true)]
    tenure: i64,
    /// Also print the month-by-month schedule starting on this date
    #[arg(long, value_parser = parse_date)]
    schedule_from: Option<NaiveDate>,
}

#[derive(Args)]
struct NextDateArgs {
    #[arg(long, value_parser = parse_date)]
    anchor: NaiveDate,
    /// monthly, quarterly, yearly or <count>-<unit> (e.g. 2-weeks)
    #[arg(long)]
    cycle: BillingCycle,
    /// Keep stepping until the date is on or after today
    #[arg(long)]
    roll: bool,
}

#[derive(Args)]
struct DaysUntilArgs {
    #[arg(long, value_parser = parse_date)]
    date: NaiveDate,
}

#[derive(Args)]
struct DashboardArgs {
    /// Number of upcoming payments to show
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Subcommand)]
enum LoanCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        principal: f64,
        #[arg(long)]
        rate: Option<f64>,
        #[arg(long)]
        tenure: i64,
        /// Installment as agreed with the bank; computed when omitted
        #[arg(long)]
        installment: Option<f64>,
        #[arg(long, value_parser = parse_date)]
        payment_date: NaiveDate,
        #[arg(long)]
        bank: String,
    },
    List,
    Pay {
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum SubscriptionCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        amount: f64,
        #[arg(long, default_value = "monthly")]
        cycle: BillingCycle,
        #[arg(long, value_parser = parse_date)]
        start_date: NaiveDate,
        #[arg(long)]
        category: String,
        #[arg(long)]
        payment_method: Option<String>,
    },
    List,
    Cancel {
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum UtilityCommand {
    Add {
        /// electricity, water, gas, internet, ...
        #[arg(long = "type")]
        utility_type: String,
        #[arg(long)]
        provider: String,
        #[arg(long)]
        account: String,
        #[arg(long)]
        amount: f64,
        #[arg(long, value_parser = parse_date)]
        due_date: NaiveDate,
        #[arg(long, default_value = "monthly")]
        frequency: BillingCycle,
        #[arg(long)]
        autopay: bool,
    },
    List,
    Pay {
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum BillCommand {
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        amount: f64,
        #[arg(long, value_parser = parse_date)]
        due_date: NaiveDate,
        #[arg(long)]
        category: String,
        /// weekly, monthly or yearly; one-time when omitted
        #[arg(long)]
        repeat: Option<RepeatFrequency>,
        #[arg(long, value_parser = parse_date, requires = "repeat")]
        end_date: Option<NaiveDate>,
        #[arg(long)]
        notes: Option<String>,
    },
    List,
    Pay {
        #[arg(long)]
        id: Uuid,
    },
}

#[derive(Subcommand)]
enum RechargeCommand {
    Add {
        #[arg(long)]
        mobile: String,
        #[arg(long)]
        operator: String,
        /// prepaid or postpaid
        #[arg(long = "type", default_value = "prepaid")]
        recharge_type: RechargeType,
        #[arg(long)]
        amount: f64,
        #[arg(long)]
        payment_method: String,
    },
    List,
}

#[derive(Args)]
struct ApplyArgs {
    /// personal, home, vehicle or education
    #[arg(long)]
    product: LoanProduct,
    #[arg(long)]
    amount: f64,
    /// Tenure in months
    #[arg(long)]
    tenure: i64,
    #[arg(long)]
    first_name: String,
    #[arg(long)]
    last_name: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    mobile: String,
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(data) = cli.data {
        config.data_file = data;
    }

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        config.level_filter()?
    };
    SimpleLogger::new().with_level(level).init()?;
    debug!("using data file {}", config.data_file.display());

    let clock = match cli.today {
        Some(today) => Clock::Fixed(today.and_time(chrono::NaiveTime::MIN)),
        None => Clock::System,
    };
    let output = cli.output;

    match cli.command {
        Commands::Emi(args) => {
            let terms = LoanTerms::new(args.principal, args.rate, args.tenure)?;
            let emi = terms.emi()?;
            let schedule = match args.schedule_from {
                Some(first) => Some(amortization_schedule(&terms, first)?),
                None => None,
            };
            let value = serde_json::json!({
                "terms": terms,
                "emi": emi.rounded(2),
                "schedule": schedule,
            });
            emit(output, &value, || {
                let mut text = format!(
                    "{} at {}% for {}\n  installment    {}\n  total payable  {}\n  total interest {}",
                    config.format_amount(terms.principal),
                    terms.annual_rate_percent,
                    format_tenure(terms.tenure_months),
                    config.format_amount(emi.installment),
                    config.format_amount(emi.total_amount),
                    config.format_amount(emi.total_interest),
                );
                for pmt in schedule.iter().flatten() {
                    text.push_str(&format!("\n{}", pmt));
                }
                text
            })
        }
        Commands::NextDate(args) => {
            let next = if args.roll {
                next_occurrence_after(args.anchor, args.cycle, clock.today())?
            } else {
                next_occurrence(args.anchor, args.cycle)?
            };
            emit(output, &next, || next.to_string())
        }
        Commands::DaysUntil(args) => {
            let days = days_until(args.date, clock.today());
            emit(output, &days, || due_status_text(days))
        }
        Commands::Dashboard(args) => {
            let limit = args.limit.unwrap_or(config.upcoming_limit);
            let tracker = Tracker::with_clock(MemoryStore::load(&config.data_file)?, clock);
            let dashboard = tracker.dashboard(limit)?;
            emit(output, &dashboard, || dashboard_text(&dashboard, &config))
        }
        Commands::Loans(cmd) => {
            let mut tracker = Tracker::with_clock(MemoryStore::load(&config.data_file)?, clock);
            match cmd {
                LoanCommand::Add {
                    name,
                    principal,
                    rate,
                    tenure,
                    installment,
                    payment_date,
                    bank,
                } => {
                    let id = tracker.create_loan(NewLoan {
                        name,
                        principal,
                        annual_rate_percent: rate,
                        tenure_months: tenure,
                        installment_amount: installment,
                        payment_date,
                        bank_details: bank,
                        reminder: Reminder::default(),
                    })?;
                    emit(output, &id, || id.to_string())
                }
                LoanCommand::List => {
                    let loans = tracker.list_loans()?;
                    emit(output, &loans, || {
                        lines(loans.iter().map(|l| {
                            format!(
                                "{}  {:<20} {:>14}  {} left, {}",
                                l.id,
                                l.name,
                                config.format_amount(l.installment_amount),
                                format_tenure(l.remaining_tenure_months),
                                due_status_text(days_until(l.next_due_date, clock.today()))
                            )
                        }))
                    })
                }
                LoanCommand::Pay { id } => {
                    let loan = tracker.pay_loan(id)?;
                    emit(output, &loan, || {
                        format!("{} paid, {} left", loan.name, format_tenure(loan.remaining_tenure_months))
                    })
                }
            }
        }
        Commands::Subscriptions(cmd) => {
            let mut tracker = Tracker::with_clock(MemoryStore::load(&config.data_file)?, clock);
            match cmd {
                SubscriptionCommand::Add {
                    name,
                    provider,
                    amount,
                    cycle,
                    start_date,
                    category,
                    payment_method,
                } => {
                    let id = tracker.create_subscription(NewSubscription {
                        name,
                        provider,
                        amount,
                        cycle,
                        start_date,
                        category,
                        payment_method,
                        reminder: Reminder::default(),
                    })?;
                    emit(output, &id, || id.to_string())
                }
                SubscriptionCommand::List => {
                    let subscriptions = tracker.list_subscriptions()?;
                    let monthly = tracker.monthly_subscription_spend()?;
                    let value = serde_json::json!({
                        "subscriptions": subscriptions,
                        "monthlyTotal": paytrack::loan::round(monthly, 2),
                    });
                    emit(output, &value, || {
                        let mut text = lines(subscriptions.iter().map(|s| {
                            format!(
                                "{}  {:<20} {:>12} {:<10} renews {} ({:?})",
                                s.id,
                                s.title,
                                config.format_amount(s.amount),
                                s.cycle.to_string(),
                                s.next_occurrence,
                                s.status
                            )
                        }));
                        text.push_str(&format!("\nmonthly total {}", config.format_amount(monthly)));
                        text
                    })
                }
                SubscriptionCommand::Cancel { id } => {
                    let subscription = tracker.cancel_subscription(id)?;
                    emit(output, &subscription, || format!("{} cancelled", subscription.title))
                }
            }
        }
        Commands::Utilities(cmd) => {
            let mut tracker = Tracker::with_clock(MemoryStore::load(&config.data_file)?, clock);
            match cmd {
                UtilityCommand::Add {
                    utility_type,
                    provider,
                    account,
                    amount,
                    due_date,
                    frequency,
                    autopay,
                } => {
                    let id = tracker.create_utility(NewUtility {
                        utility_type,
                        provider_name: provider,
                        account_number: account,
                        amount,
                        due_date,
                        frequency,
                        autopay,
                        reminder: Reminder::default(),
                        notes: None,
                    })?;
                    emit(output, &id, || id.to_string())
                }
                UtilityCommand::List => {
                    let utilities = tracker.list_utilities()?;
                    emit(output, &utilities, || {
                        lines(utilities.iter().map(|u| {
                            format!(
                                "{}  {:<12} {:<16} {:>12}  {}",
                                u.id,
                                u.category,
                                u.title,
                                config.format_amount(u.amount),
                                due_status_text(days_until(u.next_occurrence, clock.today()))
                            )
                        }))
                    })
                }
                UtilityCommand::Pay { id } => {
                    let utility = tracker.pay_utility(id)?;
                    emit(output, &utility, || {
                        format!("{} paid, next due {}", utility.title, utility.next_occurrence)
                    })
                }
            }
        }
        Commands::Bills(cmd) => {
            let mut tracker = Tracker::with_clock(MemoryStore::load(&config.data_file)?, clock);
            match cmd {
                BillCommand::Add {
                    name,
                    amount,
                    due_date,
                    category,
                    repeat,
                    end_date,
                    notes,
                } => {
                    let id = tracker.create_bill(NewBill {
                        name,
                        amount,
                        due_date,
                        category,
                        repeat: repeat.map(|frequency| Repeat { frequency, end_date }),
                        reminder: Reminder::default(),
                        notes,
                    })?;
                    emit(output, &id, || id.to_string())
                }
                BillCommand::List => {
                    let bills = tracker.list_bills()?;
                    emit(output, &bills, || {
                        lines(bills.iter().map(|b| {
                            format!(
                                "{}  {:<20} {:>12}  due {} ({:?})",
                                b.id,
                                b.name,
                                config.format_amount(b.amount),
                                b.next_due_date,
                                b.status
                            )
                        }))
                    })
                }
                BillCommand::Pay { id } => {
                    let bill = tracker.pay_bill(id)?;
                    emit(output, &bill, || format!("{} is {:?}", bill.name, bill.status))
                }
            }
        }
        Commands::Recharges(cmd) => {
            let mut tracker = Tracker::with_clock(MemoryStore::load(&config.data_file)?, clock);
            match cmd {
                RechargeCommand::Add {
                    mobile,
                    operator,
                    recharge_type,
                    amount,
                    payment_method,
                } => {
                    let recharge = tracker.record_recharge(NewRecharge {
                        mobile_number: mobile,
                        operator,
                        recharge_type,
                        amount,
                        payment_method,
                    })?;
                    emit(output, &recharge, || {
                        format!(
                            "{} recharged with {}, transaction {}",
                            recharge.mobile_number,
                            config.format_amount(recharge.amount),
                            recharge.transaction_id
                        )
                    })
                }
                RechargeCommand::List => {
                    let recharges = tracker.list_recharges()?;
                    emit(output, &recharges, || {
                        lines(recharges.iter().map(|r| {
                            format!(
                                "{}  {}  {:<12} {:<8} {:>10}  {}",
                                r.recharged_at.format("%Y-%m-%d %H:%M"),
                                r.transaction_id,
                                r.mobile_number,
                                r.operator,
                                config.format_amount(r.amount),
                                r.payment_method
                            )
                        }))
                    })
                }
            }
        }
        Commands::Apply(args) => {
            let mut tracker = Tracker::with_clock(MemoryStore::load(&config.data_file)?, clock);
            let application = tracker.submit_loan_application(NewLoanApplication {
                product: args.product,
                loan_amount: args.amount,
                tenure_months: args.tenure,
                applicant: Applicant {
                    first_name: args.first_name,
                    last_name: args.last_name,
                    email: args.email,
                    mobile: args.mobile,
                },
                employment_details: serde_json::Value::Null,
                bank_details: serde_json::Value::Null,
            })?;
            emit(output, &application, || {
                format!(
                    "application {} submitted, EMI {}",
                    application.reference,
                    config.format_amount(application.emi.installment)
                )
            })
        }
    }
}

fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    text: impl FnOnce() -> String,
) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Text => println!("{}", text()),
    }
    Ok(())
}

fn lines(rows: impl Iterator<Item = String>) -> String {
    rows.collect::<Vec<_>>().join("\n")
}

fn dashboard_text(dashboard: &Dashboard, config: &Config) -> String {
    let mut text = format!("Total dues {}\n", config.format_amount(dashboard.total_dues));
    for payment in &dashboard.upcoming_payments {
        let urgency = Urgency::classify(payment.days_left, config.due_soon_days);
        text.push_str(&format!(
            "  [{:?}] {:<24} {:>14}  {} ({})\n",
            payment.kind,
            payment.title,
            config.format_amount(payment.amount),
            due_status_text(payment.days_left),
            urgency.color()
        ));
    }
    text.trim_end().to_string()
}
