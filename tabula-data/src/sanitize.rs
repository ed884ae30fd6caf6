use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::DataError;

static TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

pub const DEFAULT_MAX_LENGTH: usize = 256;

/// Cleans literal filter values before they reach the storage engine.
///
/// Strings are tag-stripped, then checked against the length ceiling.
/// Quotes, ampersands and angle brackets outside a tag are kept as written,
/// so a filter matches the value under the spelling it was stored with.
/// Values that are still too long after cleaning are rejected outright
/// instead of being cut.
#[derive(Debug, Clone, Copy)]
pub struct Sanitizer {
    max_length: usize,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LENGTH)
    }
}

impl Sanitizer {
    pub fn new(max_length: usize) -> Self {
        Self { max_length }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// Sanitize one literal value for `field`.
    pub fn sanitize(&self, field: &str, value: &Value) -> Result<Value, DataError> {
        match value {
            Value::String(s) => self.sanitize_str(field, s).map(Value::String),
            Value::Null | Value::Bool(_) | Value::Number(_) => Ok(value.clone()),
            Value::Array(_) | Value::Object(_) => Err(DataError::invalid_filter(
                field,
                "filter values must be scalar",
            )),
        }
    }

    pub fn sanitize_str(&self, field: &str, raw: &str) -> Result<String, DataError> {
        let cleaned = strip_tags(raw);
        if cleaned.chars().count() > self.max_length {
            return Err(DataError::invalid_filter(
                field,
                format!("value exceeds the maximum length of {}", self.max_length),
            ));
        }
        Ok(cleaned)
    }
}

pub fn strip_tags(raw: &str) -> String {
    TAG.replace_all(raw, "").into_owned()
}
