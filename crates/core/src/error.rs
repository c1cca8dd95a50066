//! Domain error model.

use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Domain-level error.
///
/// Errors fall into three tiers:
///
/// - **Invariant** (`UnknownEntry`, `InvariantViolation`): the caller passed something
///   the ledger never handed out. These are programmer errors.
/// - **Business rule** (`Validation`, `InsufficientStock`, `Rejected`, `Conflict`,
///   `InvalidId`): the attempted operation is refused and state is left untouched.
/// - **Data integrity** (`DataIntegrity`): persisted state cannot be made consistent.
///   Fatal for the whole rehydration pass.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. negative quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. empty serial).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// The entry is not registered in the ledger.
    #[error("unknown entry: {0}")]
    UnknownEntry(String),

    /// A component (or the entry itself) does not have enough stock.
    #[error("insufficient stock for {serial}: required {required}, available {available}")]
    InsufficientStock {
        serial: String,
        required: i64,
        available: i64,
    },

    /// A log lifecycle transition was refused (revert, suppress, solve).
    #[error("rejected: {0}")]
    Rejected(String),

    /// A uniqueness conflict (duplicate serial or SKU).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Persisted data refers to something that does not exist.
    #[error("data integrity failure: {0}")]
    DataIntegrity(String),
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

    pub fn unknown_entry(what: impl Into<String>) -> Self {
        Self::UnknownEntry(what.into())
    }

    pub fn insufficient(serial: impl Into<String>, required: i64, available: i64) -> Self {
        Self::InsufficientStock {
            serial: serial.into(),
            required,
            available,
        }
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn data_integrity(msg: impl Into<String>) -> Self {
        Self::DataIntegrity(msg.into())
    }

    /// Business-rule failures are user-facing and leave state unchanged; the other
    /// tiers indicate a bug in the caller or corrupted persisted state.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            DomainError::Validation(_)
                | DomainError::InvalidId(_)
                | DomainError::InsufficientStock { .. }
                | DomainError::Rejected(_)
                | DomainError::Conflict(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_rule_errors_are_recoverable() {
        assert!(DomainError::validation("x").is_recoverable());
        assert!(DomainError::insufficient("BOLT", 2, 1).is_recoverable());
        assert!(DomainError::rejected("already reverted").is_recoverable());
    }

    #[test]
    fn invariant_and_integrity_errors_are_not_recoverable() {
        assert!(!DomainError::unknown_entry("BOLT").is_recoverable());
        assert!(!DomainError::invariant("x").is_recoverable());
        assert!(!DomainError::data_integrity("missing serial").is_recoverable());
    }

    #[test]
    fn insufficient_stock_message_names_the_entry() {
        let err = DomainError::insufficient("BOLT", 4, 1);
        assert_eq!(
            err.to_string(),
            "insufficient stock for BOLT: required 4, available 1"
        );
    }
}
