use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::filter::{Filters, Operator};
use crate::Record;

#[derive(Debug, Clone, thiserror::Error)]
pub enum QueryError {
    #[error("Invalid {kind} identifier: {ident}")]
    InvalidIdentifier { kind: &'static str, ident: String },

    #[error("Nothing to write to {table}")]
    EmptyWrite { table: String },
}

/// A parameterized statement builder for single-table CRUD in SQLite syntax.
///
/// Every literal ends up in the returned parameter list as a `?`
/// placeholder; statement text only ever contains validated, double-quoted
/// identifiers.
///
/// # Example
///
/// ```ignore
/// let q = QueryBuilder::new("document")
///     .filters(&Filters::eq("type_id", 2))
///     .order_by("id", true)
///     .limit(10);
/// let (sql, params) = q.build_select(&["*"])?;
/// ```
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    table: String,
    conditions: Vec<(String, Operator, Value)>,
    order: Vec<(String, bool)>,
    limit_val: Option<u64>,
    offset_val: Option<u64>,
}

impl QueryBuilder {
    pub fn new(table: &str) -> Self {
        Self {
            table: table.to_string(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit_val: None,
            offset_val: None,
        }
    }

    pub fn where_eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.conditions
            .push((column.to_string(), Operator::Eq, value.into()));
        self
    }

    /// Append every condition of `filters`.
    pub fn filters(mut self, filters: &Filters) -> Self {
        self.conditions.extend(
            filters
                .iter()
                .map(|c| (c.column.clone(), c.op, c.value.clone())),
        );
        self
    }

    pub fn order_by(mut self, column: &str, ascending: bool) -> Self {
        self.order.push((column.to_string(), ascending));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit_val = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset_val = Some(offset);
        self
    }

    /// Build a SELECT returning `(sql, bind_values)`.
    pub fn build_select(&self, columns: &[&str]) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.ident(&self.table, false, "table")?;
        let columns = self.column_list(columns)?;

        let mut sql = format!("SELECT {columns} FROM {table}");
        let mut params = Vec::new();
        self.append_where(&mut sql, &mut params)?;
        self.append_order(&mut sql)?;
        self.append_limit_offset(&mut sql);
        Ok((sql, params))
    }

    pub fn build_count(&self) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.ident(&self.table, false, "table")?;
        let mut sql = format!("SELECT COUNT(*) FROM {table}");
        let mut params = Vec::new();
        self.append_where(&mut sql, &mut params)?;
        Ok((sql, params))
    }

    pub fn build_delete(&self) -> Result<(String, Vec<Value>), QueryError> {
        let table = self.ident(&self.table, false, "table")?;
        let mut sql = format!("DELETE FROM {table}");
        let mut params = Vec::new();
        self.append_where(&mut sql, &mut params)?;
        Ok((sql, params))
    }

    /// INSERT of every field in `fields`, in map order.
    pub fn build_insert(&self, fields: &Record) -> Result<(String, Vec<Value>), QueryError> {
        if fields.is_empty() {
            return Err(QueryError::EmptyWrite {
                table: self.table.clone(),
            });
        }
        let table = self.ident(&self.table, false, "table")?;
        let mut columns = Vec::with_capacity(fields.len());
        let mut placeholders = Vec::with_capacity(fields.len());
        let mut params = Vec::with_capacity(fields.len());
        for (column, value) in fields {
            columns.push(self.ident(column, false, "column")?);
            placeholders.push("?");
            params.push(value.clone());
        }
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        Ok((sql, params))
    }

    /// UPDATE setting every field in `fields`, restricted by the builder's conditions.
    pub fn build_update(&self, fields: &Record) -> Result<(String, Vec<Value>), QueryError> {
        if fields.is_empty() {
            return Err(QueryError::EmptyWrite {
                table: self.table.clone(),
            });
        }
        let table = self.ident(&self.table, false, "table")?;
        let mut assignments = Vec::with_capacity(fields.len());
        let mut params = Vec::with_capacity(fields.len());
        for (column, value) in fields {
            let column = self.ident(column, false, "column")?;
            assignments.push(format!("{column} = ?"));
            params.push(value.clone());
        }
        let mut sql = format!("UPDATE {table} SET {}", assignments.join(", "));
        self.append_where(&mut sql, &mut params)?;
        Ok((sql, params))
    }

    fn append_where(&self, sql: &mut String, params: &mut Vec<Value>) -> Result<(), QueryError> {
        if self.conditions.is_empty() {
            return Ok(());
        }
        let mut clauses = Vec::with_capacity(self.conditions.len());
        for (col, op, value) in &self.conditions {
            let col = self.ident(col, false, "column")?;
            match (op, value) {
                (Operator::Eq, Value::Null) => clauses.push(format!("{col} IS NULL")),
                (Operator::NotEq, Value::Null) => clauses.push(format!("{col} IS NOT NULL")),
                _ => {
                    clauses.push(format!("{col} {} ?", op.as_sql()));
                    params.push(value.clone());
                }
            }
        }
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
        Ok(())
    }

    fn append_order(&self, sql: &mut String) -> Result<(), QueryError> {
        if self.order.is_empty() {
            return Ok(());
        }
        sql.push_str(" ORDER BY ");
        let mut clauses = Vec::with_capacity(self.order.len());
        for (col, asc) in &self.order {
            let col = self.ident(col, false, "column")?;
            if *asc {
                clauses.push(format!("{col} ASC"));
            } else {
                clauses.push(format!("{col} DESC"));
            }
        }
        sql.push_str(&clauses.join(", "));
        Ok(())
    }

    fn append_limit_offset(&self, sql: &mut String) {
        match (self.limit_val, self.offset_val) {
            (Some(limit), _) => sql.push_str(&format!(" LIMIT {limit}")),
            // OFFSET is only accepted after a LIMIT
            (None, Some(_)) => sql.push_str(" LIMIT -1"),
            (None, None) => {}
        }
        if let Some(offset) = self.offset_val {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    fn column_list(&self, columns: &[&str]) -> Result<String, QueryError> {
        let rendered = columns
            .iter()
            .map(|col| self.ident(col, true, "column"))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rendered.join(", "))
    }

    /// Check `ident` and render it double-quoted, segment by segment.
    fn ident(&self, ident: &str, allow_star: bool, kind: &'static str) -> Result<String, QueryError> {
        let (path, star) = match ident.strip_suffix('*') {
            Some(rest) if allow_star && (rest.is_empty() || rest.ends_with('.')) => {
                (rest.strip_suffix('.').unwrap_or(rest), true)
            }
            _ => (ident, false),
        };
        if !(path.is_empty() && star) && !IDENTIFIER.is_match(path) {
            return Err(QueryError::InvalidIdentifier {
                kind,
                ident: ident.to_string(),
            });
        }

        let mut segments: Vec<String> = path
            .split('.')
            .filter(|segment| !segment.is_empty())
            .map(|segment| format!("\"{segment}\""))
            .collect();
        if star {
            segments.push("*".to_string());
        }
        Ok(segments.join("."))
    }
}

/// Dot-separated segments of letters, digits and underscores, none starting
/// with a digit.
static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)*$").expect("identifier pattern is valid")
});
