//! Domain error model.

use thiserror::Error;

use crate::status::MigrationStatus;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Deterministic failures only: bad identifiers and illegal lifecycle
/// transitions. Execution and storage errors belong to the engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// An identifier was invalid (e.g. blank).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A lifecycle transition is not allowed from the current status.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        from: MigrationStatus,
        to: MigrationStatus,
    },
}

impl DomainError {
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn invalid_transition(from: MigrationStatus, to: MigrationStatus) -> Self {
        Self::InvalidTransition { from, to }
    }
}
