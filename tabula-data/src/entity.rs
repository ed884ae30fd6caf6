use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Serialize, Serializer};
use serde_json::Value;
use tabula_core::FieldError;

use crate::error::DataError;
use crate::filter::Filters;
use crate::sanitize::Sanitizer;
use crate::schema::{ColumnType, EntityConfig};
use crate::storage::{StorageEngine, StorageError};
use crate::translate::ErrorTranslator;
use crate::validate::{cast_record, cast_value, Validation, Validator};
use crate::Record;

/// Default maximum number of rows a single `find_all` may return.
pub const DEFAULT_MAX_LIMIT: u64 = 200;

/// Extension points around an entity's lifecycle.
///
/// Every method has a pass-through default, so implementors only override
/// what they need. Typed entities resolve labels in [`prepare`](Self::prepare);
/// type tables drop their cached snapshot in [`after_save`](Self::after_save).
#[async_trait]
pub trait EntityHooks: Send + Sync {
    /// Rewrite submitted fields before they are merged or validated.
    async fn prepare(&self, _config: &EntityConfig, submitted: Record) -> Result<Record, DataError> {
        Ok(submitted)
    }

    /// Final transform of the values about to be written. `raw` is the
    /// submission as the caller sent it.
    fn before_save(&self, values: Record, _raw: &Record) -> Record {
        values
    }

    async fn after_save(&self, _config: &EntityConfig, _id: i64) {}

    async fn after_load(&self, _config: &EntityConfig, _id: i64) {}

    async fn after_delete(&self, _config: &EntityConfig, _removed: u64) {}
}

/// Hooks that do nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoHooks;

impl EntityHooks for NoHooks {}

/// Everything shared by the entities of one kind: schema, storage, error
/// translation and hooks. Built once and handed out behind an `Arc`.
pub struct EntityKind {
    config: EntityConfig,
    storage: Arc<dyn StorageEngine>,
    translator: Arc<ErrorTranslator>,
    sanitizer: Sanitizer,
    hooks: Arc<dyn EntityHooks>,
    max_limit: u64,
}

impl fmt::Debug for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityKind")
            .field("config", &self.config)
            .field("sanitizer", &self.sanitizer)
            .field("max_limit", &self.max_limit)
            .finish_non_exhaustive()
    }
}

impl EntityKind {
    pub fn new(config: EntityConfig, storage: Arc<dyn StorageEngine>) -> Self {
        Self {
            config,
            storage,
            translator: Arc::new(ErrorTranslator::default()),
            sanitizer: Sanitizer::default(),
            hooks: Arc::new(NoHooks),
            max_limit: DEFAULT_MAX_LIMIT,
        }
    }

    pub fn with_translator(mut self, translator: Arc<ErrorTranslator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_sanitizer(mut self, sanitizer: Sanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn EntityHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_max_limit(mut self, max_limit: u64) -> Self {
        self.max_limit = max_limit.max(1);
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &EntityConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn StorageEngine> {
        &self.storage
    }

    pub fn max_limit(&self) -> u64 {
        self.max_limit
    }

    /// A fresh, unloaded entity of this kind.
    pub fn entity(self: &Arc<Self>) -> Entity {
        Entity::new(self.clone())
    }

    /// Zero means "as many as allowed"; anything above the cap is clamped.
    pub fn effective_limit(&self, limit: u64) -> u64 {
        if limit == 0 {
            self.max_limit
        } else {
            limit.min(self.max_limit)
        }
    }

    pub fn build_filters(&self, raw: &Record) -> Result<Filters, DataError> {
        Filters::build(&self.config, raw, &self.sanitizer)
    }

    /// Rows matching `raw` filters. Unknown filter keys are ignored.
    pub async fn find_all(&self, raw: &Record, limit: u64, offset: u64) -> Result<Vec<Record>, DataError> {
        let filters = self.build_filters(raw)?;
        let limit = self.effective_limit(limit);
        let rows = self
            .storage
            .find_rows(self.name(), &filters, Some(limit), offset)
            .await?;
        Ok(rows)
    }

    pub async fn count(&self) -> Result<u64, DataError> {
        Ok(self.storage.count_rows(self.name()).await?)
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<u64, DataError> {
        let filters = Filters::eq(self.config.id_field.as_str(), id);
        self.delete_filtered(&filters).await
    }

    /// Delete rows matching `raw` filters.
    ///
    /// When none of the keys are declared columns nothing is deleted; an
    /// empty filter set never reaches the storage engine.
    pub async fn delete_by(&self, raw: &Record) -> Result<u64, DataError> {
        let filters = self.build_filters(raw)?;
        if filters.is_empty() {
            tracing::warn!(kind = %self.name(), "refusing delete without usable filters");
            return Ok(0);
        }
        self.delete_filtered(&filters).await
    }

    async fn delete_filtered(&self, filters: &Filters) -> Result<u64, DataError> {
        let removed = self.storage.delete_rows(self.name(), filters).await?;
        tracing::debug!(kind = %self.name(), removed, "rows deleted");
        self.hooks.after_delete(&self.config, removed).await;
        Ok(removed)
    }

    /// Columns to serialize: everything except hidden ones.
    pub fn visible(&self, row: &Record) -> Record {
        row.iter()
            .filter(|(k, _)| !self.config.is_hidden(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// A schema-bound record.
///
/// An entity is loaded when its id field holds a non-zero id. `data` only
/// ever changes through [`load`](Self::load), a successful
/// [`store`](Self::store) or an explicit [`set_data`](Self::set_data).
#[derive(Debug, Clone)]
pub struct Entity {
    kind: Arc<EntityKind>,
    data: Record,
    errors: Vec<FieldError>,
    children: Record,
}

impl Entity {
    pub fn new(kind: Arc<EntityKind>) -> Self {
        Self {
            kind,
            data: Record::new(),
            errors: Vec::new(),
            children: Record::new(),
        }
    }

    pub fn kind(&self) -> &Arc<EntityKind> {
        &self.kind
    }

    pub fn config(&self) -> &EntityConfig {
        &self.kind.config
    }

    pub fn id_field(&self) -> &str {
        &self.kind.config.id_field
    }

    /// Resolved id; `None` for missing, zero, `false` or unparsable values.
    pub fn id(&self) -> Option<i64> {
        let raw = self.data.get(self.id_field())?;
        match cast_value(raw.clone(), ColumnType::Int) {
            Value::Number(n) => n.as_i64().filter(|id| *id != 0),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.id().is_some()
    }

    pub fn data(&self) -> &Record {
        &self.data
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Overwrite fields in memory. Nothing is persisted.
    pub fn set_data(&mut self, fields: Record) -> &mut Self {
        self.data.extend(fields);
        self
    }

    /// Errors collected by the last validation.
    pub fn errors(&self) -> &[FieldError] {
        &self.errors
    }

    pub fn can_filter(&self, key: &str) -> bool {
        self.kind.config.can_filter(key)
    }

    pub fn column_names(&self, blacklist: &[&str]) -> Vec<&str> {
        self.kind.config.column_names(blacklist)
    }

    /// Merge `submitted` over the current state after running the kind's
    /// `prepare` hook. Undeclared and `null` fields are dropped.
    pub async fn populate(&self, submitted: Record) -> Result<Record, DataError> {
        let prepared = self.kind.hooks.prepare(&self.kind.config, submitted).await?;
        Ok(self.merge(&prepared))
    }

    fn merge(&self, prepared: &Record) -> Record {
        let mut values = if self.is_loaded() {
            self.data.clone()
        } else {
            Record::new()
        };
        for column in &self.kind.config.columns {
            if let Some(value) = prepared.get(&column.name).filter(|v| !v.is_null()) {
                values.insert(column.name.clone(), value.clone());
            }
        }
        values
    }

    /// Validate `submitted` and keep the errors on the entity.
    ///
    /// New entities are checked on the merged candidate so that required
    /// columns must be present; loaded entities only on what was submitted.
    pub async fn validate(&mut self, submitted: Record) -> Result<Validation, DataError> {
        let prepared = self.kind.hooks.prepare(&self.kind.config, submitted).await?;
        Ok(self.check(&prepared))
    }

    fn check(&mut self, prepared: &Record) -> Validation {
        let is_new = !self.is_loaded();
        let candidate = if is_new {
            self.merge(prepared)
        } else {
            prepared.clone()
        };
        let validation =
            Validator::new(&self.kind.config, self.kind.sanitizer.max_length()).check(&candidate, is_new);
        self.errors = validation.errors.clone();
        validation
    }

    /// Validate and persist `submitted`, returning the row id.
    ///
    /// Nothing is written when validation fails. A constraint violation from
    /// the storage engine comes back as [`DataError::Store`] with a friendly
    /// message; any other storage failure is returned untranslated.
    pub async fn store(&mut self, submitted: Record) -> Result<i64, DataError> {
        let kind = self.kind.clone();
        let config = &kind.config;
        let id = self.id();

        let prepared = kind.hooks.prepare(config, submitted.clone()).await?;
        let validation = self.check(&prepared);
        if !validation.is_valid() {
            return Err(DataError::Validation(validation.errors));
        }

        let values = cast_record(config, self.merge(&prepared));
        let values = kind.hooks.before_save(values, &submitted);
        let fields: Record = values
            .iter()
            .filter(|(k, _)| **k != config.id_field && config.can_filter(k))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let stored = match kind
            .storage
            .insert_or_update(&config.name, &config.id_field, id, fields)
            .await
        {
            Ok(stored) => stored,
            Err(StorageError::Constraint { kind: constraint, message }) => {
                let friendly = kind.translator.translate(&message);
                tracing::warn!(
                    kind = %config.name,
                    constraint = ?constraint,
                    raw = %message,
                    "store refused: {friendly}"
                );
                return Err(DataError::Store {
                    friendly,
                    raw: message,
                    constraint,
                });
            }
            Err(err) => return Err(err.into()),
        };

        self.data = values;
        self.data.insert(config.id_field.clone(), Value::from(stored));
        tracing::debug!(kind = %config.name, id = stored, "entity stored");
        kind.hooks.after_save(config, stored).await;
        Ok(stored)
    }

    /// Load the row whose id field equals `id`.
    ///
    /// A missing row is not an error: the entity keeps its previous state
    /// and callers check [`is_loaded`](Self::is_loaded).
    pub async fn load(&mut self, id: i64) -> Result<&mut Self, DataError> {
        let field = self.id_field().to_string();
        self.load_by(&field, id).await
    }

    pub async fn load_by(&mut self, field: &str, value: impl Into<Value>) -> Result<&mut Self, DataError> {
        if field != self.id_field() && !self.can_filter(field) {
            return Err(DataError::invalid_filter(field, "not a declared column"));
        }
        let filters = Filters::eq(field, value);
        let mut rows = self
            .kind
            .storage
            .find_rows(self.kind.name(), &filters, Some(1), 0)
            .await?;
        if let Some(row) = rows.pop() {
            self.data = row;
            if let Some(id) = self.id() {
                self.kind.hooks.after_load(&self.kind.config, id).await;
            }
        }
        Ok(self)
    }

    /// Load the single row matching `raw` filters.
    ///
    /// Keys that are all undeclared are an error rather than a match on an
    /// arbitrary row.
    pub async fn find_one(&mut self, raw: &Record) -> Result<&mut Self, DataError> {
        let filters = self.kind.build_filters(raw)?;
        if filters.is_empty() && !raw.is_empty() {
            let keys: Vec<&str> = raw.keys().map(String::as_str).collect();
            return Err(DataError::invalid_filter(
                &keys.join(","),
                "no declared column among the find_one keys",
            ));
        }
        let mut rows = self
            .kind
            .storage
            .find_rows(self.kind.name(), &filters, Some(2), 0)
            .await?;
        match rows.len() {
            0 => Err(DataError::not_loaded(
                self.kind.name(),
                Value::Object(raw.clone()),
            )),
            1 => {
                self.data = rows.remove(0);
                if let Some(id) = self.id() {
                    self.kind.hooks.after_load(&self.kind.config, id).await;
                }
                Ok(self)
            }
            _ => Err(DataError::InvalidFilter {
                field: self.kind.name().to_string(),
                reason: "multiple records found for find_one".to_string(),
            }),
        }
    }

    pub async fn find_all(&self, raw: &Record, limit: u64, offset: u64) -> Result<Vec<Record>, DataError> {
        self.kind.find_all(raw, limit, offset).await
    }

    pub async fn count(&self) -> Result<u64, DataError> {
        self.kind.count().await
    }

    pub async fn delete_by_id(&self, id: i64) -> Result<u64, DataError> {
        self.kind.delete_by_id(id).await
    }

    pub async fn delete_by(&self, raw: &Record) -> Result<u64, DataError> {
        self.kind.delete_by(raw).await
    }

    /// Attach a child under `name` for serialization.
    pub fn attach(&mut self, name: impl Into<String>, child: impl Serialize) -> Result<&mut Self, DataError> {
        self.children.insert(name.into(), serde_json::to_value(child)?);
        Ok(self)
    }

    /// `data` without hidden columns, with attached children merged in.
    pub fn to_json(&self) -> Record {
        let mut out = self.kind.visible(&self.data);
        out.extend(self.children.iter().map(|(k, v)| (k.clone(), v.clone())));
        out
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}
