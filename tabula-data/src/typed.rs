//! Enumeration tables and the entities that reference them by label.
//!
//! A type table is a kind of `(id, label)` rows. Its rows are read through a
//! [`TypeLookup`], which keeps one complete snapshot per kind and drops it
//! whenever that kind is written. A typed entity stores the numeric foreign
//! key but accepts the human label on input.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use tabula_cache::SnapshotCache;

use crate::entity::EntityHooks;
use crate::error::DataError;
use crate::filter::Filters;
use crate::schema::EntityConfig;
use crate::storage::StorageEngine;
use crate::validate::to_text;
use crate::Record;

pub const DEFAULT_LABEL_FIELD: &str = "label";

/// Complete snapshot of one type table, ordered by id.
#[derive(Debug, Clone, Default)]
pub struct TypeTable {
    rows: BTreeMap<i64, Record>,
    label_field: String,
}

impl TypeTable {
    pub fn from_rows(rows: Vec<Record>, id_field: &str, label_field: &str) -> Self {
        let rows = rows
            .into_iter()
            .filter_map(|row| {
                let id = row.get(id_field).and_then(|v| {
                    v.as_i64()
                        .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
                })?;
                Some((id, row))
            })
            .collect();
        Self {
            rows,
            label_field: label_field.to_string(),
        }
    }

    pub fn rows(&self) -> &BTreeMap<i64, Record> {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn label(&self, id: i64) -> Option<&str> {
        self.rows
            .get(&id)
            .and_then(|row| row.get(&self.label_field))
            .and_then(Value::as_str)
    }

    /// Id of the first row (in id order) whose label matches, ignoring case.
    pub fn label_id(&self, label: &str) -> Option<i64> {
        let wanted = label.to_lowercase();
        self.rows.iter().find_map(|(id, row)| {
            let candidate = row.get(&self.label_field)?.as_str()?;
            (candidate.to_lowercase() == wanted).then_some(*id)
        })
    }
}

#[derive(Debug, Clone)]
struct TableFields {
    id_field: String,
    label_field: String,
}

/// Process-wide label lookup over every registered type table.
#[derive(Clone)]
pub struct TypeLookup {
    cache: SnapshotCache<TypeTable>,
    storage: Arc<dyn StorageEngine>,
    fields: Arc<DashMap<String, TableFields>>,
}

impl TypeLookup {
    pub fn new(storage: Arc<dyn StorageEngine>) -> Self {
        Self {
            cache: SnapshotCache::new(),
            storage,
            fields: Arc::new(DashMap::new()),
        }
    }

    /// Record which columns of `kind` hold the id and the label.
    pub fn register(&self, kind: &str, id_field: &str, label_field: &str) {
        self.fields.insert(
            kind.to_string(),
            TableFields {
                id_field: id_field.to_string(),
                label_field: label_field.to_string(),
            },
        );
    }

    pub fn is_registered(&self, kind: &str) -> bool {
        self.fields.contains_key(kind)
    }

    /// The current snapshot of `kind`, read from storage on first use.
    pub async fn table(&self, kind: &str) -> Result<Arc<TypeTable>, DataError> {
        let fields = self
            .fields
            .get(kind)
            .map(|f| f.value().clone())
            .unwrap_or_else(|| TableFields {
                id_field: "id".to_string(),
                label_field: DEFAULT_LABEL_FIELD.to_string(),
            });
        let storage = self.storage.clone();
        let table = self
            .cache
            .get_or_try_build(kind, || async move {
                let rows = storage.find_rows(kind, &Filters::new(), None, 0).await?;
                tracing::debug!(kind, rows = rows.len(), "type table loaded");
                Ok::<_, DataError>(TypeTable::from_rows(rows, &fields.id_field, &fields.label_field))
            })
            .await?;
        Ok(table)
    }

    pub async fn label(&self, kind: &str, id: i64) -> Result<Option<String>, DataError> {
        Ok(self.table(kind).await?.label(id).map(str::to_string))
    }

    pub async fn label_id(&self, kind: &str, label: &str) -> Result<Option<i64>, DataError> {
        Ok(self.table(kind).await?.label_id(label))
    }

    /// Drop the snapshot of `kind` only. The next lookup rebuilds it.
    pub fn invalidate(&self, kind: &str) {
        self.cache.invalidate(kind);
        tracing::info!(kind, "type table cache invalidated");
    }

    pub fn is_cached(&self, kind: &str) -> bool {
        self.cache.peek(kind).is_some()
    }
}

/// Hooks for a type table: any write drops that table's snapshot.
pub struct TypeTableHooks {
    lookup: TypeLookup,
}

impl TypeTableHooks {
    pub fn new(lookup: TypeLookup) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl EntityHooks for TypeTableHooks {
    async fn after_save(&self, config: &EntityConfig, _id: i64) {
        self.lookup.invalidate(&config.name);
    }

    async fn after_delete(&self, config: &EntityConfig, removed: u64) {
        if removed > 0 {
            self.lookup.invalidate(&config.name);
        }
    }
}

/// Hooks for an entity that stores a type id but accepts a type label.
pub struct TypedHooks {
    lookup: TypeLookup,
    type_kind: String,
    label_key: String,
    foreign_key: String,
}

impl TypedHooks {
    pub fn new(lookup: TypeLookup, type_kind: impl Into<String>) -> Self {
        Self {
            lookup,
            type_kind: type_kind.into(),
            label_key: "type".to_string(),
            foreign_key: "type_id".to_string(),
        }
    }

    pub fn with_keys(mut self, label_key: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        self.label_key = label_key.into();
        self.foreign_key = foreign_key.into();
        self
    }

    pub fn type_kind(&self) -> &str {
        &self.type_kind
    }

    pub fn foreign_key(&self) -> &str {
        &self.foreign_key
    }
}

#[async_trait]
impl EntityHooks for TypedHooks {
    /// Swap a submitted label for its id.
    async fn prepare(&self, _config: &EntityConfig, mut submitted: Record) -> Result<Record, DataError> {
        let Some(label) = submitted.remove(&self.label_key) else {
            return Ok(submitted);
        };
        if label.is_null() {
            return Ok(submitted);
        }
        let label = to_text(&label);
        match self.lookup.label_id(&self.type_kind, &label).await? {
            Some(id) => {
                submitted.insert(self.foreign_key.clone(), Value::from(id));
                Ok(submitted)
            }
            None => Err(DataError::InvalidTypeLabel { label }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: i64, label: &str) -> Record {
        json!({"id": id, "label": label}).as_object().cloned().unwrap()
    }

    #[test]
    fn test_label_lookup_is_case_insensitive() {
        let table = TypeTable::from_rows(vec![row(1, "draft"), row(2, "final")], "id", "label");
        assert_eq!(table.label_id("FINAL"), Some(2));
        assert_eq!(table.label_id("Draft"), Some(1));
        assert_eq!(table.label_id("missing"), None);
        assert_eq!(table.label(1), Some("draft"));
        assert_eq!(table.label(3), None);
    }

    #[test]
    fn test_first_match_in_id_order() {
        let table = TypeTable::from_rows(vec![row(5, "Dup"), row(3, "dup")], "id", "label");
        assert_eq!(table.label_id("DUP"), Some(3));
    }

    #[test]
    fn test_rows_without_id_are_skipped() {
        let no_id = json!({"label": "orphan"}).as_object().cloned().unwrap();
        let table = TypeTable::from_rows(vec![no_id, row(1, "x")], "id", "label");
        assert_eq!(table.len(), 1);
    }
}
