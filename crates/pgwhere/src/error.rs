//! Error types for pgwhere

use thiserror::Error;

/// Result type alias for pgwhere operations
pub type ClauseResult<T> = Result<T, ClauseError>;

/// Error types for clause construction and combination
#[derive(Debug, Error)]
pub enum ClauseError {
    /// Identifier or template validation error
    #[error("Validation error: {0}")]
    Validation(String),

    /// Filter argument shape with no translation rule
    #[error("Unsupported argument type: {value} ({type_name})")]
    UnsupportedArgument {
        value: String,
        type_name: &'static str,
    },

    /// `invert` was asked to negate a unit with no predicate
    #[error("Invalid argument for invert(), got a unit with no predicate")]
    InvalidNegation,
}

impl ClauseError {
    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Create an unsupported-argument error from the offending value and its type name
    pub fn unsupported(value: impl std::fmt::Display, type_name: &'static str) -> Self {
        Self::UnsupportedArgument {
            value: value.to_string(),
            type_name,
        }
    }

    /// Check if this is an unsupported-argument error
    pub fn is_unsupported_argument(&self) -> bool {
        matches!(self, Self::UnsupportedArgument { .. })
    }

    /// Check if this is an invalid-negation error
    pub fn is_invalid_negation(&self) -> bool {
        matches!(self, Self::InvalidNegation)
    }
}
