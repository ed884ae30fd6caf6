use async_trait::async_trait;
use serde::Serialize;

use crate::filter::Filters;
use crate::Record;

/// Structural class of a constraint violation, decided by the backend from
/// the driver's error type rather than from its message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    NotNull,
    Check,
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The engine refused a write because of a constraint. `message` is the
    /// raw driver text.
    #[error("{message}")]
    Constraint {
        kind: ConstraintKind,
        message: String,
    },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StorageError {
    /// Wrap any driver-specific error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        StorageError::Backend(Box::new(err))
    }

    pub fn constraint(kind: ConstraintKind, message: impl Into<String>) -> Self {
        StorageError::Constraint {
            kind,
            message: message.into(),
        }
    }
}

/// Port to the storage engine that executes queries.
///
/// The data layer only decides which columns may be filtered and which
/// literal values are acceptable; building and running the actual statement
/// (with bound parameters) is the engine's job.
#[async_trait]
pub trait StorageEngine: Send + Sync + 'static {
    /// Rows of `kind` matching every condition in `filters`.
    ///
    /// `limit = None` means no limit.
    async fn find_rows(
        &self,
        kind: &str,
        filters: &Filters,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Record>, StorageError>;

    async fn count_rows(&self, kind: &str) -> Result<u64, StorageError>;

    /// Update the row identified by `id` or insert a new row when `id` is
    /// `None` (or no such row exists). Returns the row's id.
    async fn insert_or_update(
        &self,
        kind: &str,
        id_field: &str,
        id: Option<i64>,
        fields: Record,
    ) -> Result<i64, StorageError>;

    /// Delete rows matching `filters` and return how many went away.
    async fn delete_rows(&self, kind: &str, filters: &Filters) -> Result<u64, StorageError>;
}
