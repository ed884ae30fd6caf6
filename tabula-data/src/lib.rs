pub mod config;
pub mod entity;
pub mod error;
pub mod filter;
pub mod memory;
pub mod page;
pub mod payload;
pub mod query;
pub mod repository;
pub mod sanitize;
pub mod schema;
pub mod storage;
pub mod translate;
pub mod typed;
pub mod validate;

/// A row or a submitted field set: column name to JSON value.
pub type Record = serde_json::Map<String, serde_json::Value>;

pub use config::DataConfig;
pub use entity::{Entity, EntityHooks, EntityKind, NoHooks};
pub use error::DataError;
pub use filter::{Condition, Filters, Operator};
pub use memory::InMemoryStorage;
pub use page::{PageLinks, PageSettings, Paginator};
pub use payload::Payload;
pub use query::{QueryBuilder, QueryError};
pub use repository::{Repository, RepositoryBuilder};
pub use sanitize::Sanitizer;
pub use schema::{ColumnDefinition, ColumnType, EntityConfig, Rule};
pub use storage::{ConstraintKind, StorageEngine, StorageError};
pub use translate::{ErrorTranslator, FriendlyErrorRule};
pub use typed::{TypeLookup, TypeTable, TypeTableHooks, TypedHooks};
pub use validate::{Validation, Validator};

pub mod prelude {
    //! Re-exports of the most commonly used data types.
    pub use crate::{
        ColumnDefinition, DataConfig, DataError, Entity, EntityConfig, Filters, Payload, Record,
        Repository, RepositoryBuilder, StorageEngine,
    };
}
