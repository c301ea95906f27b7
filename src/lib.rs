pub mod config;
pub mod dashboard;
pub mod error;
pub mod loan;
pub mod obligation;
pub mod schedule;
pub mod store;
pub mod tracker;

pub use error::{FinanceError, Result};
