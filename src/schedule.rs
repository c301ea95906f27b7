//! Due-date and renewal-date arithmetic.
//!
//! All functions work on calendar dates (`NaiveDate`), so "due today" and
//! "due tomorrow" do not depend on the time of day a calculation runs.

use crate::error::{FinanceError, Result};
use chrono::{Days, Months, NaiveDate, NaiveDateTime};
use log::trace;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Average days per month, used only to normalise day/week cycles to a
/// monthly figure.
const DAYS_PER_MONTH: f64 = 30.4375;

#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleUnit {
    Days,
    Weeks,
    Months,
    Years,
}

impl fmt::Display for CycleUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CycleUnit::Days => "days",
            CycleUnit::Weeks => "weeks",
            CycleUnit::Months => "months",
            CycleUnit::Years => "years",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for CycleUnit {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "day" | "days" => Ok(CycleUnit::Days),
            "week" | "weeks" => Ok(CycleUnit::Weeks),
            "month" | "months" => Ok(CycleUnit::Months),
            "year" | "years" => Ok(CycleUnit::Years),
            other => Err(FinanceError::invalid(
                "unit",
                format!("'{}' is not one of days, weeks, months, years", other),
            )),
        }
    }
}

/// How often a recurring obligation renews.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BillingCycle {
    Monthly,
    Quarterly,
    Yearly,
    Custom { count: u32, unit: CycleUnit },
}

impl BillingCycle {
    /// Checks that a custom cycle actually moves the date forward.
    pub fn validate(&self) -> Result<()> {
        match self {
            BillingCycle::Custom { count: 0, .. } => Err(FinanceError::invalid(
                "cycle",
                "custom cycle count must be at least 1",
            )),
            _ => Ok(()),
        }
    }

    // (step, unit) of a single cycle
    fn step(&self) -> (u32, CycleUnit) {
        match *self {
            BillingCycle::Monthly => (1, CycleUnit::Months),
            BillingCycle::Quarterly => (3, CycleUnit::Months),
            BillingCycle::Yearly => (1, CycleUnit::Years),
            BillingCycle::Custom { count, unit } => (count, unit),
        }
    }

    /// Longest possible length of one cycle in days. Never smaller than the
    /// real span, so `elapsed / max_days` never overshoots the cycle count.
    fn max_days(&self) -> i64 {
        let (count, unit) = self.step();
        let per_unit = match unit {
            CycleUnit::Days => 1,
            CycleUnit::Weeks => 7,
            CycleUnit::Months => 31,
            CycleUnit::Years => 366,
        };
        i64::from(count) * per_unit
    }

    /// Converts an amount billed once per cycle into its monthly equivalent.
    pub fn monthly_equivalent(&self, amount: f64) -> f64 {
        let (count, unit) = self.step();
        let count = f64::from(count.max(1));
        match unit {
            CycleUnit::Days => amount * DAYS_PER_MONTH / count,
            CycleUnit::Weeks => amount * DAYS_PER_MONTH / (7. * count),
            CycleUnit::Months => amount / count,
            CycleUnit::Years => amount / (12. * count),
        }
    }
}

impl fmt::Display for BillingCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BillingCycle::Monthly => write!(f, "monthly"),
            BillingCycle::Quarterly => write!(f, "quarterly"),
            BillingCycle::Yearly => write!(f, "yearly"),
            BillingCycle::Custom { count, unit } => write!(f, "every {} {}", count, unit),
        }
    }
}

/// Accepts `monthly`, `quarterly`, `yearly` or `<count>-<unit>` such as `2-weeks`.
impl FromStr for BillingCycle {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        let cycle = match s.as_str() {
            "monthly" => BillingCycle::Monthly,
            "quarterly" => BillingCycle::Quarterly,
            "yearly" | "annually" => BillingCycle::Yearly,
            custom => {
                let (count, unit) = custom.split_once('-').ok_or_else(|| {
                    FinanceError::invalid("cycle", format!("unrecognised cycle '{}'", custom))
                })?;
                let count = count.parse::<u32>().map_err(|_| {
                    FinanceError::invalid("cycle", format!("'{}' is not a whole number", count))
                })?;
                BillingCycle::Custom {
                    count,
                    unit: unit.parse()?,
                }
            }
        };
        cycle.validate()?;
        Ok(cycle)
    }
}

/// Repeat cadence of a recurring bill.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatFrequency {
    Weekly,
    Monthly,
    Yearly,
}

impl RepeatFrequency {
    pub fn as_cycle(&self) -> BillingCycle {
        match self {
            RepeatFrequency::Weekly => BillingCycle::Custom {
                count: 1,
                unit: CycleUnit::Weeks,
            },
            RepeatFrequency::Monthly => BillingCycle::Monthly,
            RepeatFrequency::Yearly => BillingCycle::Yearly,
        }
    }
}

impl FromStr for RepeatFrequency {
    type Err = FinanceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "weekly" => Ok(RepeatFrequency::Weekly),
            "monthly" => Ok(RepeatFrequency::Monthly),
            "yearly" => Ok(RepeatFrequency::Yearly),
            other => Err(FinanceError::invalid(
                "repeat",
                format!("'{}' is not one of weekly, monthly, yearly", other),
            )),
        }
    }
}

/// Parses a strict ISO-8601 calendar date (`YYYY-MM-DD`).
pub fn parse_date(input: &str) -> Result<NaiveDate> {
    let trimmed = input.trim();
    if trimmed.len() != 10 {
        return Err(FinanceError::InvalidDate(format!(
            "'{}' is not a YYYY-MM-DD date",
            input
        )));
    }
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .map_err(|e| FinanceError::InvalidDate(format!("'{}': {}", input, e)))
}

/// Whole calendar days from `reference` to `target`. Negative when overdue.
pub fn days_until(target: NaiveDate, reference: NaiveDate) -> i64 {
    target.signed_duration_since(reference).num_days()
}

/// Same as [`days_until`], measured from an instant. Only the calendar date of
/// `now` matters.
pub fn days_until_instant(target: NaiveDate, now: NaiveDateTime) -> i64 {
    days_until(target, now.date())
}

/// Moves `anchor` forward by `times` whole cycles. Month and year steps clamp
/// to the last valid day, so Jan 31 + 1 month is Feb 28 (or 29).
pub fn advance(anchor: NaiveDate, cycle: BillingCycle, times: u32) -> Result<NaiveDate> {
    cycle.validate()?;
    let (count, unit) = cycle.step();
    let steps = count
        .checked_mul(times)
        .ok_or_else(|| FinanceError::InvalidDate(format!("{} x {} overflows", cycle, times)))?;

    let next = match unit {
        CycleUnit::Days => anchor.checked_add_days(Days::new(u64::from(steps))),
        CycleUnit::Weeks => anchor.checked_add_days(Days::new(u64::from(steps) * 7)),
        CycleUnit::Months => anchor.checked_add_months(Months::new(steps)),
        CycleUnit::Years => steps
            .checked_mul(12)
            .and_then(|months| anchor.checked_add_months(Months::new(months))),
    };

    next.ok_or_else(|| {
        FinanceError::InvalidDate(format!("{} advanced {} x {} is out of range", anchor, times, cycle))
    })
}

/// The date exactly one cycle after `anchor`.
pub fn next_occurrence(anchor: NaiveDate, cycle: BillingCycle) -> Result<NaiveDate> {
    advance(anchor, cycle, 1)
}

/// The first `anchor + k * cycle` (k >= 1) that falls on or after `today`.
///
/// Each candidate is computed from the anchor rather than from the previous
/// candidate, so a month-end anchor keeps its day where the month allows it.
pub fn next_occurrence_after(
    anchor: NaiveDate,
    cycle: BillingCycle,
    today: NaiveDate,
) -> Result<NaiveDate> {
    cycle.validate()?;
    let elapsed = days_until(today, anchor);
    let mut k = if elapsed > 0 {
        u32::try_from(elapsed / cycle.max_days())
            .unwrap_or(u32::MAX)
            .max(1)
    } else {
        1
    };

    let mut next = advance(anchor, cycle, k)?;
    while next < today {
        k += 1;
        next = advance(anchor, cycle, k)?;
    }
    trace!("{} {} rolled {} cycles to {}", anchor, cycle, k, next);
    Ok(next)
}

/// Colour band for how close a due date is.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Urgency {
    Overdue,
    DueSoon,
    OnTime,
}

impl Urgency {
    pub fn classify(days_left: i64, due_soon_days: i64) -> Self {
        if days_left < 0 {
            Urgency::Overdue
        } else if days_left <= due_soon_days {
            Urgency::DueSoon
        } else {
            Urgency::OnTime
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Urgency::Overdue => "#ef4444",
            Urgency::DueSoon => "#f59e0b",
            Urgency::OnTime => "#10b981",
        }
    }
}

/// Human text for a days-left count.
pub fn due_status_text(days_left: i64) -> String {
    match days_left {
        d if d < 0 => format!("{} days overdue", d.abs()),
        0 => "Due today".to_string(),
        1 => "Due tomorrow".to_string(),
        d => format!("Due in {} days", d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_days_until() {
        let today = ymd(2025, 7, 10);
        assert_eq!(days_until(today, today), 0);
        assert_eq!(days_until(ymd(2025, 7, 11), today), 1);
        assert_eq!(days_until(ymd(2025, 7, 9), today), -1);
        assert_eq!(days_until(ymd(2025, 8, 10), today), 31);
    }

    #[test]
    fn test_days_until_ignores_time_of_day() {
        let due = ymd(2025, 7, 11);
        let early = ymd(2025, 7, 10).and_hms_opt(0, 0, 1).unwrap();
        let late = ymd(2025, 7, 10).and_hms_opt(23, 59, 59).unwrap();
        assert_eq!(days_until_instant(due, early), 1);
        assert_eq!(days_until_instant(due, late), 1);
        assert_eq!(days_until_instant(ymd(2025, 7, 10), late), 0);
    }

    #[test]
    fn test_next_occurrence() {
        assert_eq!(
            next_occurrence(ymd(2025, 1, 31), BillingCycle::Monthly).unwrap(),
            ymd(2025, 2, 28)
        );
        assert_eq!(
            next_occurrence(ymd(2024, 1, 31), BillingCycle::Monthly).unwrap(),
            ymd(2024, 2, 29)
        );
        assert_eq!(
            next_occurrence(ymd(2025, 1, 15), BillingCycle::Yearly).unwrap(),
            ymd(2026, 1, 15)
        );
        assert_eq!(
            next_occurrence(ymd(2024, 2, 29), BillingCycle::Yearly).unwrap(),
            ymd(2025, 2, 28)
        );
        assert_eq!(
            next_occurrence(ymd(2022, 11, 30), BillingCycle::Quarterly).unwrap(),
            ymd(2023, 2, 28)
        );
    }

    #[test]
    fn test_next_occurrence_custom() {
        let anchor = ymd(2025, 3, 1);
        let cycle = |count, unit| BillingCycle::Custom { count, unit };
        assert_eq!(
            next_occurrence(anchor, cycle(10, CycleUnit::Days)).unwrap(),
            ymd(2025, 3, 11)
        );
        assert_eq!(
            next_occurrence(anchor, cycle(2, CycleUnit::Weeks)).unwrap(),
            ymd(2025, 3, 15)
        );
        assert_eq!(
            next_occurrence(anchor, cycle(6, CycleUnit::Months)).unwrap(),
            ymd(2025, 9, 1)
        );
        assert_eq!(
            next_occurrence(anchor, cycle(2, CycleUnit::Years)).unwrap(),
            ymd(2027, 3, 1)
        );
        assert!(next_occurrence(anchor, cycle(0, CycleUnit::Days)).is_err());
    }

    #[test]
    fn test_next_occurrence_out_of_range() {
        let err = next_occurrence(NaiveDate::MAX, BillingCycle::Monthly).unwrap_err();
        assert!(matches!(err, FinanceError::InvalidDate(_)));
    }

    #[test]
    fn test_next_occurrence_after() {
        let anchor = ymd(2025, 1, 31);
        // month-end anchors keep the 31st where the month has one
        assert_eq!(
            next_occurrence_after(anchor, BillingCycle::Monthly, ymd(2025, 3, 5)).unwrap(),
            ymd(2025, 3, 31)
        );
        assert_eq!(
            next_occurrence_after(anchor, BillingCycle::Monthly, ymd(2025, 2, 1)).unwrap(),
            ymd(2025, 2, 28)
        );
        // landing exactly on today counts
        assert_eq!(
            next_occurrence_after(ymd(2025, 1, 20), BillingCycle::Monthly, ymd(2025, 7, 20))
                .unwrap(),
            ymd(2025, 7, 20)
        );
        // an anchor in the future still moves one whole cycle
        assert_eq!(
            next_occurrence_after(ymd(2025, 9, 1), BillingCycle::Monthly, ymd(2025, 7, 1))
                .unwrap(),
            ymd(2025, 10, 1)
        );
        // many cycles behind
        assert_eq!(
            next_occurrence_after(
                ymd(2020, 1, 1),
                BillingCycle::Custom { count: 1, unit: CycleUnit::Days },
                ymd(2025, 6, 15)
            )
            .unwrap(),
            ymd(2025, 6, 15)
        );
        assert_eq!(
            next_occurrence_after(ymd(2024, 12, 15), BillingCycle::Yearly, ymd(2026, 10, 19))
                .unwrap(),
            ymd(2026, 12, 15)
        );
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2025-07-15").unwrap(), ymd(2025, 7, 15));
        assert_eq!(parse_date(" 2025-07-15 ").unwrap(), ymd(2025, 7, 15));
        for bad in ["", "2025-02-30", "15/07/2025", "2025-7-5", "tomorrow", "2025-13-01"] {
            assert!(
                matches!(parse_date(bad), Err(FinanceError::InvalidDate(_))),
                "{} should be rejected",
                bad
            );
        }
    }

    #[test]
    fn test_cycle_from_str() {
        assert_eq!("monthly".parse::<BillingCycle>().unwrap(), BillingCycle::Monthly);
        assert_eq!("Yearly".parse::<BillingCycle>().unwrap(), BillingCycle::Yearly);
        assert_eq!(
            "2-weeks".parse::<BillingCycle>().unwrap(),
            BillingCycle::Custom { count: 2, unit: CycleUnit::Weeks }
        );
        assert_eq!(
            "1-month".parse::<BillingCycle>().unwrap(),
            BillingCycle::Custom { count: 1, unit: CycleUnit::Months }
        );
        assert!("0-days".parse::<BillingCycle>().is_err());
        assert!("fortnightly".parse::<BillingCycle>().is_err());
        assert!("x-days".parse::<BillingCycle>().is_err());
        assert!("2-dayssss".parse::<BillingCycle>().is_err());
        assert!("2-s".parse::<BillingCycle>().is_err());
        assert_eq!("Weeks".parse::<CycleUnit>().unwrap(), CycleUnit::Weeks);
        assert_eq!("year".parse::<CycleUnit>().unwrap(), CycleUnit::Years);
    }

    #[test]
    fn test_cycle_serde() {
        let json = serde_json::to_string(&BillingCycle::Monthly).unwrap();
        assert_eq!(json, "\"monthly\"");
        let custom: BillingCycle =
            serde_json::from_str(r#"{"custom":{"count":3,"unit":"weeks"}}"#).unwrap();
        assert_eq!(custom, BillingCycle::Custom { count: 3, unit: CycleUnit::Weeks });
    }

    #[test]
    fn test_monthly_equivalent() {
        assert_eq!(BillingCycle::Monthly.monthly_equivalent(649.), 649.);
        assert_eq!(BillingCycle::Yearly.monthly_equivalent(4199.), 4199. / 12.);
        assert_eq!(BillingCycle::Quarterly.monthly_equivalent(300.), 100.);
        let weekly = RepeatFrequency::Weekly.as_cycle().monthly_equivalent(70.);
        assert!((weekly - 304.375).abs() < 1e-9);
    }

    #[test]
    fn test_urgency() {
        assert_eq!(Urgency::classify(-2, 3), Urgency::Overdue);
        assert_eq!(Urgency::classify(0, 3), Urgency::DueSoon);
        assert_eq!(Urgency::classify(3, 3), Urgency::DueSoon);
        assert_eq!(Urgency::classify(4, 3), Urgency::OnTime);
        assert_eq!(Urgency::Overdue.color(), "#ef4444");
        assert_eq!(due_status_text(-4), "4 days overdue");
        assert_eq!(due_status_text(0), "Due today");
        assert_eq!(due_status_text(1), "Due tomorrow");
        assert_eq!(due_status_text(12), "Due in 12 days");
    }
}
