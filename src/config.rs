use crate::dashboard::DEFAULT_UPCOMING_LIMIT;
use crate::error::{FinanceError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Runtime settings, read from a YAML file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// JSON snapshot backing the store.
    pub data_file: PathBuf,
    /// How many entries the dashboard's upcoming list shows.
    pub upcoming_limit: usize,
    /// Due within this many days counts as "due soon".
    pub due_soon_days: i64,
    pub currency_symbol: String,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("paytrack.json"),
            upcoming_limit: DEFAULT_UPCOMING_LIMIT,
            due_soon_days: 3,
            currency_symbol: "₹".to_string(),
            log_level: "warn".to_string(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| FinanceError::Config(format!("{}: {}", path.display(), e)))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| FinanceError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.upcoming_limit == 0 {
            return Err(FinanceError::Config("upcoming_limit must be at least 1".to_string()));
        }
        if self.due_soon_days < 0 {
            return Err(FinanceError::Config("due_soon_days must not be negative".to_string()));
        }
        self.level_filter()?;
        Ok(())
    }

    pub fn level_filter(&self) -> Result<log::LevelFilter> {
        self.log_level
            .parse()
            .map_err(|_| FinanceError::Config(format!("unknown log_level '{}'", self.log_level)))
    }

    /// `₹1,234.50` style amount with Indian digit grouping.
    pub fn format_amount(&self, amount: f64) -> String {
        let cents = (amount.abs() * 100.).round() as u64;
        let (whole, frac) = (cents / 100, cents % 100);
        let digits = whole.to_string();

        let grouped = if digits.len() <= 3 {
            digits
        } else {
            let (head, tail) = digits.split_at(digits.len() - 3);
            let mut groups: Vec<&str> = Vec::new();
            let mut rest = head;
            while rest.len() > 2 {
                let (l, r) = rest.split_at(rest.len() - 2);
                groups.push(r);
                rest = l;
            }
            groups.push(rest);
            groups.reverse();
            format!("{},{}", groups.join(","), tail)
        };

        let sign = if amount < 0. && cents > 0 { "-" } else { "" };
        format!("{}{}{}.{:02}", sign, self.currency_symbol, grouped, frac)
    }
}
