use std::collections::HashMap;
use std::str::FromStr;

use serde_yaml::Value as Yaml;

use super::loader::key_text;
use super::ConfigError;

/// A raw configuration value as read from YAML or the environment.
///
/// Environment variables always arrive as `String`; conversions through
/// [`FromConfigValue`] parse them on demand.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    Null,
    List(Vec<ConfigValue>),
    Map(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    /// Text of a scalar value; `None` for null, lists and maps.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            ConfigValue::String(s) => Some(s.clone()),
            ConfigValue::Integer(i) => Some(i.to_string()),
            ConfigValue::Float(f) => Some(f.to_string()),
            ConfigValue::Bool(b) => Some(b.to_string()),
            ConfigValue::Null | ConfigValue::List(_) | ConfigValue::Map(_) => None,
        }
    }
}

impl From<&Yaml> for ConfigValue {
    fn from(value: &Yaml) -> Self {
        match value {
            Yaml::Null => ConfigValue::Null,
            Yaml::Bool(b) => ConfigValue::Bool(*b),
            Yaml::Number(n) => match (n.as_i64(), n.as_f64()) {
                (Some(i), _) => ConfigValue::Integer(i),
                (None, Some(f)) => ConfigValue::Float(f),
                (None, None) => ConfigValue::String(n.to_string()),
            },
            Yaml::String(s) => ConfigValue::String(s.clone()),
            Yaml::Sequence(items) => ConfigValue::List(items.iter().map(|v| ConfigValue::from(v)).collect()),
            Yaml::Mapping(map) => ConfigValue::Map(
                map.iter()
                    .map(|(k, v)| (key_text(k), ConfigValue::from(v)))
                    .collect(),
            ),
            Yaml::Tagged(tagged) => ConfigValue::from(&tagged.value),
        }
    }
}

fn mismatch(key: &str, expected: &'static str) -> ConfigError {
    ConfigError::TypeMismatch {
        key: key.to_string(),
        expected,
    }
}

/// Parse a `String` value (typically from the environment) as `T`.
fn parse_text<T: FromStr>(value: &ConfigValue, key: &str, expected: &'static str) -> Result<T, ConfigError> {
    match value {
        ConfigValue::String(s) => s.trim().parse().map_err(|_| mismatch(key, expected)),
        _ => Err(mismatch(key, expected)),
    }
}

/// Conversion from a [`ConfigValue`] into a concrete type.
///
/// `key` is only used to name the offending entry in errors.
#[diagnostic::on_unimplemented(
    message = "`{Self}` cannot be read from configuration",
    note = "supported: String, bool, f64, i32, i64, u32, u64, usize, Option<T>, Vec<T>, HashMap<String, T>"
)]
pub trait FromConfigValue: Sized {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError>;
}

impl FromConfigValue for ConfigValue {
    fn from_config_value(value: &ConfigValue, _key: &str) -> Result<Self, ConfigError> {
        Ok(value.clone())
    }
}

impl FromConfigValue for String {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        value.scalar_text().ok_or_else(|| mismatch(key, "String"))
    }
}

impl FromConfigValue for i64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Integer(i) => Ok(*i),
            other => parse_text(other, key, "i64"),
        }
    }
}

impl FromConfigValue for f64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        match value {
            ConfigValue::Float(f) => Ok(*f),
            ConfigValue::Integer(i) => Ok(*i as f64),
            other => parse_text(other, key, "f64"),
        }
    }
}

impl FromConfigValue for bool {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        if let ConfigValue::Bool(b) = value {
            return Ok(*b);
        }
        let text = value.scalar_text().map(|s| s.trim().to_ascii_lowercase());
        match text.as_deref() {
            Some("true" | "1" | "yes" | "on") => Ok(true),
            Some("false" | "0" | "no" | "off") => Ok(false),
            _ => Err(mismatch(key, "bool")),
        }
    }
}

/// Range-checked narrowing from the `i64` representation.
fn narrow<T: TryFrom<i64>>(value: &ConfigValue, key: &str, expected: &'static str) -> Result<T, ConfigError> {
    let wide = i64::from_config_value(value, key).map_err(|_| mismatch(key, expected))?;
    T::try_from(wide).map_err(|_| mismatch(key, expected))
}

impl FromConfigValue for i32 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        narrow(value, key, "i32")
    }
}

impl FromConfigValue for u32 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        narrow(value, key, "u32")
    }
}

impl FromConfigValue for u64 {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        narrow(value, key, "u64")
    }
}

impl FromConfigValue for usize {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        narrow(value, key, "usize")
    }
}

impl<T: FromConfigValue> FromConfigValue for Option<T> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        if *value == ConfigValue::Null {
            return Ok(None);
        }
        T::from_config_value(value, key).map(Some)
    }
}

/// A scalar reads as a one-element list.
impl<T: FromConfigValue> FromConfigValue for Vec<T> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let ConfigValue::List(items) = value else {
            return Ok(vec![T::from_config_value(value, key)?]);
        };
        let mut out = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            out.push(T::from_config_value(item, &format!("{key}.{i}"))?);
        }
        Ok(out)
    }
}

impl<T: FromConfigValue> FromConfigValue for HashMap<String, T> {
    fn from_config_value(value: &ConfigValue, key: &str) -> Result<Self, ConfigError> {
        let ConfigValue::Map(entries) = value else {
            return Err(mismatch(key, "map"));
        };
        let mut out = HashMap::with_capacity(entries.len());
        for (name, entry) in entries {
            out.insert(name.clone(), T::from_config_value(entry, &format!("{key}.{name}"))?);
        }
        Ok(out)
    }
}
