//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add build-level context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("validation failed after {attempts} attempt(s): {reason}")]
    ValidationExhausted { attempts: usize, reason: String },

    #[error("post condition on '{path}' not satisfied after {attempts} attempt(s)")]
    PostConditionExhausted { path: String, attempts: usize },

    #[error("cannot deserialize sample: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
