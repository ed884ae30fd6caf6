use std::cmp::Ordering;

use regex::RegexBuilder;
use serde_json::Value;

use crate::error::DataError;
use crate::sanitize::Sanitizer;
use crate::schema::EntityConfig;
use crate::validate::{cast_value, to_text};
use crate::Record;

/// Comparison operator of a filter condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
}

impl Operator {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "=" | "==" | "eq" => Some(Operator::Eq),
            "!=" | "<>" | "ne" => Some(Operator::NotEq),
            ">" | "gt" => Some(Operator::Gt),
            ">=" | "gte" => Some(Operator::Gte),
            "<" | "lt" => Some(Operator::Lt),
            "<=" | "lte" => Some(Operator::Lte),
            "like" => Some(Operator::Like),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
            Operator::Like => "LIKE",
        }
    }

    /// Evaluate `left <op> right` with loose scalar comparison.
    pub fn matches(self, left: &Value, right: &Value) -> bool {
        match self {
            Operator::Eq if right.is_null() => left.is_null(),
            Operator::NotEq if right.is_null() => !left.is_null(),
            Operator::Eq => compare(left, right) == Some(Ordering::Equal),
            Operator::NotEq => compare(left, right).is_some_and(|o| o != Ordering::Equal),
            Operator::Gt => compare(left, right) == Some(Ordering::Greater),
            Operator::Gte => matches!(compare(left, right), Some(Ordering::Greater | Ordering::Equal)),
            Operator::Lt => compare(left, right) == Some(Ordering::Less),
            Operator::Lte => matches!(compare(left, right), Some(Ordering::Less | Ordering::Equal)),
            Operator::Like => !left.is_null() && like(&to_text(left), &to_text(right)),
        }
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}

fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    if left.is_null() || right.is_null() {
        return None;
    }
    if let (Value::String(l), Value::String(r)) = (left, right) {
        return Some(l.cmp(r));
    }
    match (as_number(left), as_number(right)) {
        (Some(l), Some(r)) => l.partial_cmp(&r),
        _ => Some(to_text(left).cmp(&to_text(right))),
    }
}

/// SQL `LIKE`, case-insensitive: `%` is any run, `_` any single character.
fn like(text: &str, pattern: &str) -> bool {
    let mut re = String::with_capacity(pattern.len() + 8);
    re.push('^');
    for c in pattern.chars() {
        match c {
            '%' => re.push_str(".*"),
            '_' => re.push('.'),
            other => re.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    re.push('$');
    RegexBuilder::new(&re)
        .case_insensitive(true)
        .dot_matches_new_line(true)
        .build()
        .map(|re| re.is_match(text))
        .unwrap_or(false)
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: Operator,
    pub value: Value,
}

/// A conjunction of column conditions, ready to be handed to a storage engine.
///
/// Values in a `Filters` built by [`Filters::build`] are whitelisted, cast
/// and sanitized. The engine binds them as parameters and never splices them
/// into statement text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    conditions: Vec<Condition>,
}

impl Filters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single equality condition on a trusted column.
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with(column, Operator::Eq, value)
    }

    pub fn with(mut self, column: impl Into<String>, op: Operator, value: impl Into<Value>) -> Self {
        self.push(column, op, value);
        self
    }

    pub fn push(&mut self, column: impl Into<String>, op: Operator, value: impl Into<Value>) {
        self.conditions.push(Condition {
            column: column.into(),
            op,
            value: value.into(),
        });
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// True when `row` satisfies every condition. Absent columns read as `null`.
    pub fn matches(&self, row: &Record) -> bool {
        self.conditions.iter().all(|cond| {
            let left = row.get(&cond.column).unwrap_or(&Value::Null);
            cond.op.matches(left, &cond.value)
        })
    }

    /// Build filters from caller-supplied `raw` key/value pairs.
    ///
    /// Keys that are not declared columns of `config` are dropped. A value
    /// of the form `[operator, value]` applies that operator; anything else
    /// is an equality. Values are cast to the column type (except `LIKE`
    /// patterns) and sanitized.
    pub fn build(config: &EntityConfig, raw: &Record, sanitizer: &Sanitizer) -> Result<Self, DataError> {
        let mut filters = Filters::new();
        for (key, value) in raw {
            let Some(column) = config.column(key) else {
                tracing::debug!(kind = %config.name, key = %key, "dropping filter on undeclared column");
                continue;
            };

            let (op, value) = match value {
                Value::Array(pair) if pair.len() == 2 => {
                    let op = pair[0]
                        .as_str()
                        .and_then(Operator::parse)
                        .ok_or_else(|| DataError::invalid_filter(key, format!("unsupported operator {}", pair[0])))?;
                    (op, pair[1].clone())
                }
                other => (Operator::Eq, other.clone()),
            };

            let value = match op {
                Operator::Like => Value::String(to_text(&value)),
                _ => cast_value(value, column.column_type),
            };
            let value = sanitizer.sanitize(key, &value)?;
            filters.push(key.as_str(), op, value);
        }
        Ok(filters)
    }
}

impl<'a> IntoIterator for &'a Filters {
    type Item = &'a Condition;
    type IntoIter = std::slice::Iter<'a, Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.conditions.iter()
    }
}
