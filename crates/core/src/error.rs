//! Errors raised by warehouse domain rules.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// A deterministic rule failure. Storage and transport failures have their
/// own error types in the infrastructure crates.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input rejected before any state changes (blank description, zero quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The change would break a stock rule, such as going below zero.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Duplicate material number, already-deactivated material, stale version.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_the_detail() {
        let err = DomainError::invariant("stock cannot go negative (25 - 30)");
        assert_eq!(err.to_string(), "invariant violated: stock cannot go negative (25 - 30)");
    }

    #[test]
    fn conflicts_keep_their_own_variant() {
        assert!(matches!(DomainError::conflict("dup"), DomainError::Conflict(_)));
        assert_ne!(DomainError::validation("x"), DomainError::invalid_id("x"));
    }
}
