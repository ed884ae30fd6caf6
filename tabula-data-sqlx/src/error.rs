use sqlx::error::ErrorKind;
use tabula_data::{ConstraintKind, StorageError};

/// Extension trait for classifying `sqlx::Error` as a [`StorageError`].
///
/// Constraint violations are recognised from the driver's error kind, never
/// from its message text. Pool exhaustion and I/O failures count as the
/// storage being unavailable.
pub trait SqlxErrorExt {
    fn into_storage_error(self) -> StorageError;
}

fn constraint_kind(kind: ErrorKind) -> Option<ConstraintKind> {
    match kind {
        ErrorKind::UniqueViolation => Some(ConstraintKind::Unique),
        ErrorKind::ForeignKeyViolation => Some(ConstraintKind::ForeignKey),
        ErrorKind::NotNullViolation => Some(ConstraintKind::NotNull),
        ErrorKind::CheckViolation => Some(ConstraintKind::Check),
        _ => None,
    }
}

impl SqlxErrorExt for sqlx::Error {
    fn into_storage_error(self) -> StorageError {
        let constraint = match &self {
            sqlx::Error::Database(db) => {
                constraint_kind(db.kind()).map(|kind| (kind, db.message().to_string()))
            }
            _ => None,
        };
        if let Some((kind, message)) = constraint {
            return StorageError::constraint(kind, message);
        }

        match self {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                StorageError::Unavailable(self.to_string())
            }
            other => StorageError::backend(other),
        }
    }
}

/// Convenience alias for storage results.
pub type SqlxResult<T> = Result<T, StorageError>;
