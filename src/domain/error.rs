//! Domain-level errors (no external dependencies)

use thiserror::Error;

/// Domain errors represent structural violations of the fixture tree.
/// These are independent of collaborator and I/O concerns.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid expression '{expression}': {reason}")]
    ExpressionSyntax { expression: String, reason: String },

    #[error("only containers can be sized, '{path}' is not a container")]
    ContainerSizeOnNonContainer { path: String },

    #[error("invalid size constraint: min={min:?}, max={max:?}")]
    InvalidSizeConstraint {
        min: Option<usize>,
        max: Option<usize>,
    },

    #[error("unknown type: {0}")]
    UnknownType(String),

    #[error("recursion limit reached at '{path}' (depth {depth})")]
    RecursionLimit { path: String, depth: usize },
}

impl DomainError {
    pub(crate) fn syntax(expression: &str, reason: impl Into<String>) -> Self {
        Self::ExpressionSyntax {
            expression: expression.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
