use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};
use tabula_data::{Filters, QueryBuilder, Record, StorageEngine, StorageError};

use crate::error::{SqlxErrorExt, SqlxResult};

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

/// Storage engine over an SQLite pool.
///
/// Statements come from [`QueryBuilder`] with quoted identifiers; every
/// value is bound as a parameter. Reads are ordered by the kind's id column
/// (`id` unless set with [`with_id_field`](Self::with_id_field)) so that
/// pages are stable.
///
/// ```ignore
/// let pool = SqlitePool::connect("sqlite:data.db").await?;
/// let repo = Repository::builder(Arc::new(SqlxStorage::new(pool)))
///     .entity(config)
///     .build()?;
/// ```
#[derive(Clone)]
pub struct SqlxStorage {
    pool: SqlitePool,
    id_fields: HashMap<String, String>,
}

/// Id column assumed for kinds without an explicit one.
pub const DEFAULT_ID_FIELD: &str = "id";

impl SqlxStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            id_fields: HashMap::new(),
        }
    }

    /// Use `id_field` as the ordering column of `kind`.
    pub fn with_id_field(mut self, kind: &str, id_field: &str) -> Self {
        self.id_fields.insert(kind.to_string(), id_field.to_string());
        self
    }

    pub fn id_field(&self, kind: &str) -> &str {
        self.id_fields
            .get(kind)
            .map(String::as_str)
            .unwrap_or(DEFAULT_ID_FIELD)
    }

    /// Get the underlying pool reference.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn insert(&self, kind: &str, fields: &Record) -> SqlxResult<i64> {
        let (sql, params) = QueryBuilder::new(kind)
            .build_insert(fields)
            .map_err(StorageError::backend)?;
        tracing::trace!(%sql, "insert");
        let result = bind_all(sqlx::query(&sql), &params)
            .execute(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_storage_error)?;
        Ok(result.last_insert_rowid())
    }

    async fn exists(&self, kind: &str, id_field: &str, id: i64) -> SqlxResult<bool> {
        let (sql, params) = QueryBuilder::new(kind)
            .where_eq(id_field, id)
            .build_count()
            .map_err(StorageError::backend)?;
        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        for param in &params {
            query = match param.as_i64() {
                Some(i) => query.bind(i),
                None => query.bind(param.to_string()),
            };
        }
        let count = query
            .fetch_one(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_storage_error)?;
        Ok(count > 0)
    }
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqliteQuery<'q> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.clone()),
        // arrays and objects are stored as JSON text
        other => query.bind(other.to_string()),
    }
}

fn bind_all<'q>(query: SqliteQuery<'q>, params: &[Value]) -> SqliteQuery<'q> {
    params.iter().fold(query, |query, value| bind_value(query, value))
}

fn decode_row(row: &SqliteRow) -> Result<Record, sqlx::Error> {
    let mut record = Record::new();
    for (idx, column) in row.columns().iter().enumerate() {
        let (is_null, type_name) = {
            let raw = row.try_get_raw(idx)?;
            (raw.is_null(), raw.type_info().name().to_string())
        };
        let value = if is_null {
            Value::Null
        } else {
            match type_name.as_str() {
                "INTEGER" | "BOOLEAN" => Value::from(row.try_get::<i64, _>(idx)?),
                "REAL" => Value::from(row.try_get::<f64, _>(idx)?),
                "BLOB" => Value::String(String::from_utf8_lossy(&row.try_get::<Vec<u8>, _>(idx)?).into_owned()),
                _ => Value::String(row.try_get::<String, _>(idx)?),
            }
        };
        record.insert(column.name().to_string(), value);
    }
    Ok(record)
}

#[async_trait]
impl StorageEngine for SqlxStorage {
    async fn find_rows(
        &self,
        kind: &str,
        filters: &Filters,
        limit: Option<u64>,
        offset: u64,
    ) -> Result<Vec<Record>, StorageError> {
        let mut builder = QueryBuilder::new(kind)
            .filters(filters)
            .order_by(self.id_field(kind), true);
        if let Some(limit) = limit {
            builder = builder.limit(limit);
        }
        if offset > 0 {
            builder = builder.offset(offset);
        }
        let (sql, params) = builder.build_select(&["*"]).map_err(StorageError::backend)?;
        tracing::trace!(%sql, params = params.len(), "select");

        let rows = bind_all(sqlx::query(&sql), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_storage_error)?;
        rows.iter()
            .map(decode_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(SqlxErrorExt::into_storage_error)
    }

    async fn count_rows(&self, kind: &str) -> Result<u64, StorageError> {
        let (sql, _) = QueryBuilder::new(kind).build_count().map_err(StorageError::backend)?;
        let count: i64 = sqlx::query_scalar(&sql)
            .fetch_one(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_storage_error)?;
        Ok(count.max(0) as u64)
    }

    async fn insert_or_update(
        &self,
        kind: &str,
        id_field: &str,
        id: Option<i64>,
        fields: Record,
    ) -> Result<i64, StorageError> {
        let Some(id) = id else {
            return self.insert(kind, &fields).await;
        };

        let updated = if fields.is_empty() {
            self.exists(kind, id_field, id).await?
        } else {
            let (sql, params) = QueryBuilder::new(kind)
                .where_eq(id_field, id)
                .build_update(&fields)
                .map_err(StorageError::backend)?;
            tracing::trace!(%sql, "update");
            let result = bind_all(sqlx::query(&sql), &params)
                .execute(&self.pool)
                .await
                .map_err(SqlxErrorExt::into_storage_error)?;
            result.rows_affected() > 0
        };
        if updated {
            return Ok(id);
        }

        // no row with that id yet: insert it under the requested id
        let mut fields = fields;
        fields.insert(id_field.to_string(), Value::from(id));
        self.insert(kind, &fields).await?;
        Ok(id)
    }

    async fn delete_rows(&self, kind: &str, filters: &Filters) -> Result<u64, StorageError> {
        let (sql, params) = QueryBuilder::new(kind)
            .filters(filters)
            .build_delete()
            .map_err(StorageError::backend)?;
        tracing::trace!(%sql, "delete");
        let result = bind_all(sqlx::query(&sql), &params)
            .execute(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_storage_error)?;
        Ok(result.rows_affected())
    }
}
