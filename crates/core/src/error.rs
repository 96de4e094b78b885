//! Domain error model.

use thiserror::Error;

use crate::entity::EntityKind;

/// Result type used across the domain and storage layers.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Every store and assembler operation reports failures through this type;
/// the HTTP layer matches it exhaustively to pick a status code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Input failed validation: missing/blank fields, malformed values,
    /// duplicate email, or a reference to a parent record that does not exist.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The addressed record does not exist.
    #[error("{entity} {id} not found")]
    NotFound { entity: EntityKind, id: i64 },

    /// The backing store failed (connection, I/O, corrupt row).
    #[error("storage failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(entity: EntityKind, id: impl Into<i64>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
