use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use crate::filter::Filters;
use crate::storage::{ConstraintKind, StorageEngine, StorageError};
use crate::Record;

const SCHEMA: &str = "tabula";
const DEFAULT_ID_FIELD: &str = "id";

#[derive(Debug, Clone)]
struct ForeignKey {
    column: String,
    references: String,
}

#[derive(Debug, Default)]
struct Table {
    /// Set by the first seed or write.
    id_field: Option<String>,
    next_id: i64,
    rows: BTreeMap<i64, Record>,
    unique: Vec<String>,
    foreign: Vec<ForeignKey>,
}

/// A `DashMap`-backed storage engine holding every table in memory.
///
/// Rows are kept in id order. Unique and foreign-key constraints can be
/// declared per table; violations report MySQL-style driver text so friendly
/// error rules written for that format apply unchanged.
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    tables: Arc<DashMap<String, Table>>,
    writes: Arc<AtomicU64>,
    unavailable: Arc<AtomicBool>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a unique constraint on `kind.column`.
    pub fn unique(self, kind: &str, column: &str) -> Self {
        self.tables
            .entry(kind.to_string())
            .or_default()
            .unique
            .push(column.to_string());
        self
    }

    /// Declare that `kind.column` must reference an existing id in `references`.
    pub fn foreign_key(self, kind: &str, column: &str, references: &str) -> Self {
        self.tables
            .entry(kind.to_string())
            .or_default()
            .foreign
            .push(ForeignKey {
                column: column.to_string(),
                references: references.to_string(),
            });
        self
    }

    /// Insert rows without constraint checks. Rows carrying an integer
    /// `id_field` keep it; others get the next free id. Not counted as writes.
    pub fn seed(&self, kind: &str, id_field: &str, rows: impl IntoIterator<Item = Record>) {
        let mut table = self.tables.entry(kind.to_string()).or_default();
        table.id_field.get_or_insert_with(|| id_field.to_string());
        for mut row in rows {
            let id = row
                .get(id_field)
                .and_then(Value::as_i64)
                .unwrap_or(table.next_id + 1);
            row.insert(id_field.to_string(), Value::from(id));
            table.next_id = table.next_id.max(id);
            table.rows.insert(id, row);
        }
    }

    /// Snapshot of every row of `kind` in id order.
    pub fn rows(&self, kind: &str) -> Vec<Record> {
        self.tables
            .get(kind)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of successful `insert_or_update` and `delete_rows` calls.
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every call fail with [`StorageError::Unavailable`] until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StorageError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("in-memory storage is offline".into()));
        }
        Ok(())
    }

    fn table_has_id(&self, kind: &str, id: i64) -> bool {
        self.tables
            .get(kind)
            .is_some_and(|t| t.rows.contains_key(&id))
    }

    fn id_field_of(&self, kind: &str) -> String {
        self.tables
            .get(kind)
            .and_then(|t| t.id_field.clone())
            .unwrap_or_else(|| DEFAULT_ID_FIELD.to_string())
    }

    fn foreign_keys(&self, kind: &str) -> Vec<ForeignKey> {
        self.tables
            .get(kind)
            .map(|t| t.foreign.clone())
            .unwrap_or_default()
    }
}

fn constraint_name(kind: &str, column: &str) -> String {
    format!("{kind}_{column}_fk")
}

#[async_trait]
impl StorageEngine for InMemoryStorage {
    async fn find_rows(
        &self,
        kind: &str,
        filters: &Filters,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Record>, StorageError> {
        self.check_available()?;
        let Some(table) = self.tables.get(kind) else {
            return Ok(Vec::new());
        };
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(table
            .rows
            .values()
            .filter(|row| filters.matches(row))
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_rows(&self, kind: &str) -> Result<u64, StorageError> {
        self.check_available()?;
        Ok(self.tables.get(kind).map_or(0, |t| t.rows.len() as u64))
    }

    async fn insert_or_update(
        &self,
        kind: &str,
        id_field: &str,
        id: Option<i64>,
        fields: Record,
    ) -> Result<i64, StorageError> {
        self.check_available()?;

        // Referenced tables are read before this table's entry is locked.
        for fk in self.foreign_keys(kind) {
            let Some(value) = fields.get(&fk.column).filter(|v| !v.is_null()) else {
                continue;
            };
            let exists = value
                .as_i64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
                .is_some_and(|target| self.table_has_id(&fk.references, target));
            if !exists {
                return Err(StorageError::constraint(
                    ConstraintKind::ForeignKey,
                    format!(
                        "SQLSTATE[23000]: Integrity constraint violation: 1452 Cannot add or update a child row: \
                         a foreign key constraint fails (`{SCHEMA}`.`{kind}`, CONSTRAINT `{}` FOREIGN KEY (`{}`) \
                         REFERENCES `{}` (`{}`))",
                        constraint_name(kind, &fk.column),
                        fk.column,
                        fk.references,
                        self.id_field_of(&fk.references)
                    ),
                ));
            }
        }

        let mut table = self.tables.entry(kind.to_string()).or_default();
        table.id_field.get_or_insert_with(|| id_field.to_string());
        let existing = id.filter(|id| table.rows.contains_key(id));

        let mut row = existing
            .and_then(|id| table.rows.get(&id).cloned())
            .unwrap_or_default();
        row.extend(fields);

        for column in &table.unique {
            let Some(value) = row.get(column).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = table
                .rows
                .iter()
                .any(|(other_id, other)| Some(*other_id) != existing && other.get(column) == Some(value));
            if clash {
                let shown = value.as_str().map_or_else(|| value.to_string(), str::to_string);
                return Err(StorageError::constraint(
                    ConstraintKind::Unique,
                    format!(
                        "SQLSTATE[23000]: Integrity constraint violation: 1062 Duplicate entry '{shown}' for key '{kind}.{column}'"
                    ),
                ));
            }
        }

        let id = match existing.or(id) {
            Some(id) => id,
            None => table.next_id + 1,
        };
        table.next_id = table.next_id.max(id);
        row.insert(id_field.to_string(), Value::from(id));
        table.rows.insert(id, row);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(id)
    }

    async fn delete_rows(&self, kind: &str, filters: &Filters) -> Result<u64, StorageError> {
        self.check_available()?;
        let Some(mut table) = self.tables.get_mut(kind) else {
            return Ok(0);
        };
        let before = table.rows.len();
        table.rows.retain(|_, row| !filters.matches(row));
        let removed = (before - table.rows.len()) as u64;
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(removed)
    }
}
