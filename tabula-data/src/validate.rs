use serde_json::{Map, Number, Value};
use tabula_core::FieldError;

use crate::error::DataError;
use crate::schema::{ColumnType, EntityConfig};
use crate::Record;

/// Cast a scalar to `ty` the loose way form input expects.
///
/// Non-scalars and `null` are returned unchanged. Strings cast to `Int`
/// keep their leading numeric prefix (`"12abc"` becomes `12`, `"abc"`
/// becomes `0`).
pub fn cast_value(value: Value, ty: ColumnType) -> Value {
    if !is_scalar(&value) {
        return value;
    }
    match ty {
        ColumnType::Int => Value::from(to_int(&value)),
        ColumnType::Bool => Value::Bool(is_truthy(&value)),
        ColumnType::String => Value::String(to_text(&value)),
        ColumnType::Array => Value::Array(vec![value]),
        ColumnType::Object => {
            let mut map = Map::new();
            map.insert("scalar".to_string(), value);
            Value::Object(map)
        }
    }
}

/// Cast every declared column present in `record`; unknown keys are kept as is.
pub fn cast_record(config: &EntityConfig, record: Record) -> Record {
    record
        .into_iter()
        .map(|(key, value)| match config.column(&key) {
            Some(column) => {
                let value = cast_value(value, column.column_type);
                (key, value)
            }
            None => (key, value),
        })
        .collect()
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::Bool(_) | Value::Number(_) | Value::String(_))
}

fn to_int(value: &Value) -> i64 {
    match value {
        Value::Bool(b) => i64::from(*b),
        Value::Number(n) => number_to_int(n),
        Value::String(s) => parse_int_prefix(s),
        _ => 0,
    }
}

fn number_to_int(n: &Number) -> i64 {
    n.as_i64()
        .or_else(|| n.as_u64().map(|u| i64::try_from(u).unwrap_or(i64::MAX)))
        .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
        .unwrap_or(0)
}

fn parse_int_prefix(s: &str) -> i64 {
    let s = s.trim();
    if let Ok(i) = s.parse::<i64>() {
        return i;
    }
    if let Ok(f) = s.parse::<f64>() {
        if f.is_finite() {
            return f.trunc() as i64;
        }
    }
    let mut end = 0;
    for (idx, c) in s.char_indices() {
        if c.is_ascii_digit() || (idx == 0 && (c == '-' || c == '+')) {
            end = idx + c.len_utf8();
        } else {
            break;
        }
    }
    s[..end].parse().unwrap_or(0)
}

pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Render a scalar as text, `true` as `"1"` and `false` as `""`.
pub(crate) fn to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) | Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Outcome of checking a candidate field set: the cast values plus every
/// error found. Callers decide what to do with a non-empty error list.
#[derive(Debug, Clone, Default)]
pub struct Validation {
    pub values: Record,
    pub errors: Vec<FieldError>,
}

impl Validation {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn into_result(self) -> Result<Record, DataError> {
        if self.errors.is_empty() {
            Ok(self.values)
        } else {
            Err(DataError::Validation(self.errors))
        }
    }
}

pub struct Validator<'a> {
    config: &'a EntityConfig,
    max_length: usize,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a EntityConfig, max_length: usize) -> Self {
        Self { config, max_length }
    }

    /// Check `candidate` against every declared column.
    ///
    /// Present values are cast and run through their rules. Annotated
    /// columns (required or carrying rules) may not be `null`, and must be
    /// present when `is_new` is set. The id column is never required.
    pub fn check(&self, candidate: &Record, is_new: bool) -> Validation {
        let mut errors = Vec::new();

        for column in &self.config.columns {
            let name = column.name.as_str();
            let is_id = name == self.config.id_field;
            match candidate.get(name) {
                Some(Value::Null) if column.is_annotated() && !is_id => {
                    errors.push(required(name));
                }
                None if is_new && column.is_annotated() && !is_id => {
                    errors.push(required(name));
                }
                Some(value) if !value.is_null() => {
                    let value = cast_value(value.clone(), column.column_type);
                    if let Value::String(text) = &value {
                        if text.chars().count() > self.max_length {
                            errors.push(FieldError::new(
                                name,
                                format!("{name} exceeds the maximum length of {}", self.max_length),
                                "length",
                            ));
                        }
                    }
                    if is_scalar(&value) {
                        let text = to_text(&value);
                        errors.extend(column.rules.iter().filter_map(|rule| rule.check(name, &text)));
                    }
                }
                _ => {}
            }
        }

        Validation {
            values: cast_record(self.config, candidate.clone()),
            errors,
        }
    }
}

fn required(field: &str) -> FieldError {
    FieldError::new(field, format!("{field} is a required field"), "required")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnDefinition;
    use serde_json::json;

    fn record(value: Value) -> Record {
        match value {
            Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    fn document() -> EntityConfig {
        EntityConfig::new("document")
            .with_column(ColumnDefinition::int("id"))
            .with_column(
                ColumnDefinition::string("name")
                    .required()
                    .rules("minlength:2|maxlength:255")
                    .unwrap(),
            )
            .with_column(ColumnDefinition::int("type_id").required())
            .with_column(ColumnDefinition::string("created_at"))
    }

    #[test]
    fn test_cast_value() {
        assert_eq!(cast_value(json!("42"), ColumnType::Int), json!(42));
        assert_eq!(cast_value(json!("12abc"), ColumnType::Int), json!(12));
        assert_eq!(cast_value(json!("abc"), ColumnType::Int), json!(0));
        assert_eq!(cast_value(json!(3.9), ColumnType::Int), json!(3));
        assert_eq!(cast_value(json!(true), ColumnType::Int), json!(1));
        assert_eq!(cast_value(json!("0"), ColumnType::Bool), json!(false));
        assert_eq!(cast_value(json!("yes"), ColumnType::Bool), json!(true));
        assert_eq!(cast_value(json!(7), ColumnType::String), json!("7"));
        assert_eq!(cast_value(json!(false), ColumnType::String), json!(""));
        assert_eq!(cast_value(json!(1), ColumnType::Array), json!([1]));
        // non-scalars are left alone
        assert_eq!(cast_value(json!([1, 2]), ColumnType::Int), json!([1, 2]));
        assert_eq!(cast_value(Value::Null, ColumnType::Int), Value::Null);
    }

    #[test]
    fn test_collects_every_error() {
        let config = document();
        let result = Validator::new(&config, 256).check(&record(json!({"name": "x"})), true);
        let messages: Vec<_> = result.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            vec!["name requires minimum length of 2", "type_id is a required field"]
        );
        assert!(!result.is_valid());
    }

    #[test]
    fn test_partial_update_skips_absent_fields() {
        let config = document();
        let result = Validator::new(&config, 256).check(&record(json!({"name": "Memo"})), false);
        assert!(result.is_valid());
    }

    #[test]
    fn test_null_for_annotated_field_is_an_error() {
        let config = document();
        let result = Validator::new(&config, 256)
            .check(&record(json!({"name": null, "type_id": 1})), false);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, "required");
    }

    #[test]
    fn test_length_ceiling_and_rule() {
        let config = document();
        let long = "n".repeat(300);
        let result = Validator::new(&config, 256)
            .check(&record(json!({"name": long, "type_id": 2})), true);
        let codes: Vec<_> = result.errors.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["length", "maxlength"]);
        assert!(matches!(result.into_result(), Err(DataError::Validation(_))));
    }

    #[test]
    fn test_values_are_cast() {
        let config = document();
        let result = Validator::new(&config, 256)
            .check(&record(json!({"name": "Report", "type_id": "2", "extra": 1})), true);
        let values = result.into_result().unwrap();
        assert_eq!(values["type_id"], json!(2));
        assert_eq!(values["extra"], json!(1));
    }
}
