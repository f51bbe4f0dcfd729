//! Store error types

use thiserror::Error;

/// SQLSTATE: deadlock_detected
const PG_DEADLOCK_DETECTED: &str = "40P01";
/// SQLSTATE: serialization_failure
const PG_SERIALIZATION_FAILURE: &str = "40001";
/// SQLSTATE: lock_not_available (raised when `lock_timeout` expires)
const PG_LOCK_NOT_AVAILABLE: &str = "55P03";
/// SQLSTATE: unique_violation
const PG_UNIQUE_VIOLATION: &str = "23505";

/// Failures raised by a [`LedgerStore`](super::LedgerStore) or its units of work.
///
/// None of these leave partial effects behind: the unit of work that raised
/// it is rolled back before the error reaches the caller.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Lock wait timed out on account {0}")]
    LockTimeout(String),

    #[error("Operation {0} already recorded")]
    DuplicateOperation(String),

    #[error("Account {0} was not locked by this unit of work")]
    NotLocked(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("Injected failure at {point}")]
    Injected { point: &'static str, retryable: bool },
}

impl StoreError {
    /// Whether a fresh attempt of the same unit of work may succeed.
    ///
    /// Deadlock victims, serialization failures and lock-wait timeouts are
    /// transient. Constraint violations and connectivity errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Database(e) => matches!(
                sqlstate(e).as_deref(),
                Some(PG_DEADLOCK_DETECTED | PG_SERIALIZATION_FAILURE | PG_LOCK_NOT_AVAILABLE)
            ),
            StoreError::LockTimeout(_) => true,
            StoreError::Injected { retryable, .. } => *retryable,
            StoreError::DuplicateOperation(_)
            | StoreError::NotLocked(_)
            | StoreError::CorruptRow(_) => false,
        }
    }

    /// Map a failed `processed_ops` insert, turning a unique violation into
    /// [`StoreError::DuplicateOperation`].
    pub(crate) fn from_operation_insert(e: sqlx::Error, operation_id: &str) -> Self {
        if sqlstate(&e).as_deref() == Some(PG_UNIQUE_VIOLATION) {
            StoreError::DuplicateOperation(operation_id.to_string())
        } else {
            StoreError::Database(e)
        }
    }

    /// Short label for structured logs
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::Database(_) => "database",
            StoreError::LockTimeout(_) => "lock_timeout",
            StoreError::DuplicateOperation(_) => "duplicate_operation",
            StoreError::NotLocked(_) => "not_locked",
            StoreError::CorruptRow(_) => "corrupt_row",
            StoreError::Injected { .. } => "injected",
        }
    }
}

fn sqlstate(e: &sqlx::Error) -> Option<String> {
    e.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_timeout_is_retryable() {
        assert!(StoreError::LockTimeout("A".into()).is_retryable());
    }

    #[test]
    fn test_duplicate_is_not_retryable() {
        assert!(!StoreError::DuplicateOperation("op-1".into()).is_retryable());
        assert!(!StoreError::NotLocked("A".into()).is_retryable());
    }

    #[test]
    fn test_injected_follows_flag() {
        let transient = StoreError::Injected {
            point: "commit",
            retryable: true,
        };
        let fatal = StoreError::Injected {
            point: "commit",
            retryable: false,
        };
        assert!(transient.is_retryable());
        assert!(!fatal.is_retryable());
    }

    #[test]
    fn test_pool_errors_are_not_retryable() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "database");
    }

    #[test]
    fn test_non_database_insert_error_stays_database() {
        let err = StoreError::from_operation_insert(sqlx::Error::RowNotFound, "op-1");
        assert!(matches!(err, StoreError::Database(_)));
    }
}
