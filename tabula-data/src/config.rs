use std::collections::HashMap;

use tabula_core::{ConfigError, ConfigProperties, TabulaConfig};

use crate::page::{PageSettings, DEFAULT_PAGE_SIZE, MAX_LIMIT};
use crate::sanitize::{Sanitizer, DEFAULT_MAX_LENGTH};
use crate::translate::{ErrorTranslator, FriendlyErrorRule};

/// Data-layer settings under the `data` prefix.
///
/// ```yaml
/// data:
///   page:
///     size: 100
///     max: 200
///   sanitize:
///     length: 256
///   errors:
///     - pattern: "UNIQUE constraint failed: \\w+\\.(?P<field>\\w+)"
///       template: "{field} already exists"
/// ```
///
/// When `data.errors` is absent the shipped duplicate-entry and foreign-key
/// rules are used.
#[derive(Debug, Clone)]
pub struct DataConfig {
    pub page_size: u64,
    pub max_limit: u64,
    pub sanitize_length: usize,
    pub error_rules: Option<Vec<FriendlyErrorRule>>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            max_limit: MAX_LIMIT,
            sanitize_length: DEFAULT_MAX_LENGTH,
            error_rules: None,
        }
    }
}

impl DataConfig {
    pub fn page_settings(&self) -> PageSettings {
        PageSettings {
            default_limit: self.page_size,
            max_limit: self.max_limit,
        }
    }

    pub fn sanitizer(&self) -> Sanitizer {
        Sanitizer::new(self.sanitize_length)
    }

    pub fn translator(&self) -> ErrorTranslator {
        match &self.error_rules {
            Some(rules) => ErrorTranslator::new(rules.clone()),
            None => ErrorTranslator::default(),
        }
    }
}

fn positive<T: PartialOrd + Default>(key: &str, value: T) -> Result<T, ConfigError> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(ConfigError::Invalid {
            key: key.to_string(),
            message: "must be at least 1".to_string(),
        })
    }
}

impl ConfigProperties for DataConfig {
    fn prefix() -> &'static str {
        "data"
    }

    fn from_config(config: &TabulaConfig) -> Result<Self, ConfigError> {
        let page_key = Self::key("page.size");
        let max_key = Self::key("page.max");
        let length_key = Self::key("sanitize.length");
        let errors_key = Self::key("errors");

        let page_size = positive(&page_key, config.get_or(&page_key, DEFAULT_PAGE_SIZE)?)?;
        let max_limit = positive(&max_key, config.get_or(&max_key, MAX_LIMIT)?)?;
        let sanitize_length = positive(&length_key, config.get_or(&length_key, DEFAULT_MAX_LENGTH)?)?;

        let error_rules = config
            .get::<Option<Vec<HashMap<String, String>>>>(&errors_key)
            .or_else(|err| match err {
                ConfigError::NotFound(_) => Ok(None),
                other => Err(other),
            })?
            .map(|entries| {
                entries
                    .iter()
                    .enumerate()
                    .map(|(idx, entry)| rule_from_entry(&errors_key, idx, entry))
                    .collect::<Result<Vec<_>, _>>()
            })
            .transpose()?;

        Ok(Self {
            page_size,
            max_limit,
            sanitize_length,
            error_rules,
        })
    }
}

fn rule_from_entry(
    key: &str,
    idx: usize,
    entry: &HashMap<String, String>,
) -> Result<FriendlyErrorRule, ConfigError> {
    let key = format!("{key}.{idx}");
    let field = |name: &str| {
        entry.get(name).ok_or_else(|| ConfigError::Invalid {
            key: key.clone(),
            message: format!("missing '{name}'"),
        })
    };
    let pattern = field("pattern")?;
    let template = field("template")?;
    FriendlyErrorRule::new(pattern, template.clone()).map_err(|err| ConfigError::Invalid {
        key: key.clone(),
        message: err.to_string(),
    })
}
