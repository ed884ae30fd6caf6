//! # tabula-data-sqlx: SQLx backend for the Tabula data layer
//!
//! This crate implements [`tabula_data::StorageEngine`] on top of
//! [SQLx](https://github.com/launchbadge/sqlx). Statements are produced by
//! the data layer's [`QueryBuilder`](tabula_data::QueryBuilder) with quoted
//! identifiers and bound parameters, so submitted values never end up in
//! SQL text.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SqlxStorage`] | Storage engine holding an `SqlitePool` |
//! | [`SqlxErrorExt`] | Extension trait to classify `sqlx::Error` as a `StorageError` (`.into_storage_error()`) |
//! | [`SqlxResult<T>`] | Type alias for `Result<T, StorageError>` |
//!
//! # Feature flags
//!
//! | Feature  | Driver |
//! |----------|--------|
//! | `sqlite` | SQLite via `sqlx/sqlite` (default) |
//!
//! # Quick start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tabula_data_sqlx::prelude::*;
//!
//! let pool = sqlx::SqlitePool::connect("sqlite:app.db").await?;
//! let repo = Repository::builder(Arc::new(SqlxStorage::new(pool)))
//!     .entity(EntityConfig::new("note").with_column(ColumnDefinition::string("title")))
//!     .build()?;
//! let id = repo.create("note", fields).await?;
//! ```
//!
//! Constraint violations reported by the driver keep their raw message, so
//! friendly-error rules match SQLite's wording (`UNIQUE constraint failed:
//! note.title`) rather than MySQL's.

pub mod error;
#[cfg(feature = "sqlite")]
pub mod storage;

pub use error::{SqlxErrorExt, SqlxResult};
#[cfg(feature = "sqlite")]
pub use storage::{SqlxStorage, DEFAULT_ID_FIELD};

pub mod prelude {
    //! Re-exports of the most commonly used types.
    pub use crate::{SqlxErrorExt, SqlxResult};
    #[cfg(feature = "sqlite")]
    pub use crate::SqlxStorage;
    pub use tabula_data::prelude::*;
}
