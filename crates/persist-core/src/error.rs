// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Error taxonomy shared by every persist-core component.

use thiserror::Error;

/// Unified error type returned by mapping, DDL, predicate translation,
/// the persistence provider, the transaction scope and the cache
/// facade.
#[derive(Debug, Error)]
pub enum PersistError {
    /// Entity with the given key does not exist (or is soft-deleted /
    /// expired).
    #[error("entity not found")]
    NotFound,

    /// Primary-key collision on `create`.
    #[error("duplicate primary key")]
    Duplicate,

    /// Stored `Version` did not match the caller's expected version.
    #[error("optimistic concurrency conflict")]
    Concurrency,

    /// The engine's write lock could not be acquired within
    /// `busy_timeout`.
    #[error("database busy: lock not acquired in time")]
    Busy,

    /// The predicate translator rejected an unsupported expression.
    #[error("unsupported predicate expression: {0}")]
    UnsupportedExpression(String),

    /// Mapping or DDL synthesis found an inconsistent entity
    /// definition (missing primary key, mismatched foreign-key
    /// actions, ...).
    #[error("invalid entity configuration: {0}")]
    Configuration(String),

    /// The serializer failed to encode or decode a payload.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// A transaction scope failed; carries the originating cause and,
    /// if compensation itself failed, the rollback cause as a linked
    /// error.
    #[error("transaction failed: {cause}{}", rollback_suffix(.rollback_cause))]
    TransactionFailed {
        /// The error that triggered rollback.
        #[source]
        cause: Box<PersistError>,
        /// The error raised while executing the inverse command chain,
        /// if compensation itself failed.
        rollback_cause: Option<Box<PersistError>>
    },

    /// Cooperative cancellation observed before or during dispatch.
    #[error("operation canceled")]
    Canceled,

    /// Passthrough for engine errors that do not map onto a named
    /// taxonomy member.
    #[error("storage engine error: {0}")]
    Storage(String)
}

fn rollback_suffix(rollback_cause: &Option<Box<PersistError>>) -> String {
    match rollback_cause {
        Some(e) => format!(" (rollback also failed: {e})"),
        None => String::new()
    }
}

impl PersistError {
    /// Build a [`PersistError::TransactionFailed`] from an originating
    /// cause with no rollback failure.
    #[must_use]
    pub fn transaction_failed(cause: PersistError) -> Self {
        Self::TransactionFailed {
            cause: Box::new(cause),
            rollback_cause: None
        }
    }

    /// Build a [`PersistError::TransactionFailed`] recording that the
    /// inverse command chain itself failed.
    #[must_use]
    pub fn transaction_failed_with_rollback(cause: PersistError, rollback_cause: PersistError) -> Self {
        Self::TransactionFailed {
            cause: Box::new(cause),
            rollback_cause: Some(Box::new(rollback_cause))
        }
    }

    /// True for [`PersistError::NotFound`].
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// True for [`PersistError::Concurrency`].
    #[must_use]
    pub const fn is_concurrency(&self) -> bool {
        matches!(self, Self::Concurrency)
    }
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for PersistError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if let Some(code) = db_err.code() {
                // SQLITE_BUSY = 5, SQLITE_LOCKED = 6
                if code == "5" || code == "6" {
                    return Self::Busy;
                }
            }
        }
        match err {
            sqlx::Error::RowNotFound => Self::NotFound,
            other => Self::Storage(other.to_string())
        }
    }
}

impl From<serde_json::Error> for PersistError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience alias used throughout persist-core.
pub type PersistResult<T> = Result<T, PersistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transaction_failed_display_without_rollback() {
        let err = PersistError::transaction_failed(PersistError::Concurrency);
        assert_eq!(
            err.to_string(),
            "transaction failed: optimistic concurrency conflict"
        );
    }

    #[test]
    fn transaction_failed_display_with_rollback() {
        let err = PersistError::transaction_failed_with_rollback(
            PersistError::Concurrency,
            PersistError::Busy
        );
        let msg = err.to_string();
        assert!(msg.contains("optimistic concurrency conflict"));
        assert!(msg.contains("rollback also failed"));
        assert!(msg.contains("database busy"));
    }

    #[test]
    fn is_not_found_and_concurrency() {
        assert!(PersistError::NotFound.is_not_found());
        assert!(!PersistError::NotFound.is_concurrency());
        assert!(PersistError::Concurrency.is_concurrency());
    }
}
