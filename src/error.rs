use thiserror::Error;

#[derive(Debug, Error)]
pub enum FinanceError {
    #[error("Invalid input: {field} - {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Data unavailable: {source_name} could not be read ({reason})")]
    DataUnavailable { source_name: String, reason: String },

    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl FinanceError {
    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        FinanceError::InvalidInput {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    pub fn unavailable(source_name: &str, reason: impl ToString) -> Self {
        FinanceError::DataUnavailable {
            source_name: source_name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn not_found(kind: &str, id: impl ToString) -> Self {
        FinanceError::NotFound {
            kind: kind.to_string(),
            id: id.to_string(),
        }
    }
}

impl From<serde_json::Error> for FinanceError {
    fn from(e: serde_json::Error) -> Self {
        FinanceError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FinanceError>;
