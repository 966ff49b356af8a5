//! Errors raised by aggregates and value objects.

use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

/// A business rule said no.
///
/// Storage, sequence and transport failures are not represented here; infra
/// wraps these into its own error types and maps them to HTTP statuses.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Bad input: empty description, missing lot, out-of-range amount.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The command is well-formed but the aggregate's state forbids it,
    /// e.g. editing a saved delivery or using a lot twice.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// Names the kind of record that is missing ("delivery", "lot").
    #[error("{0} not found")]
    NotFound(&'static str),

    /// Stale version or duplicate creation.
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

    pub fn not_found(what: &'static str) -> Self {
        Self::NotFound(what)
    }
}
