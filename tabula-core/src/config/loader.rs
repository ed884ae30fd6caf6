use std::collections::HashMap;
use std::io;
use std::path::Path;

use serde_yaml::Value as Yaml;

use super::value::ConfigValue;
use super::ConfigError;

/// Configuration values flattened to dot-separated keys.
pub(crate) type Flat = HashMap<String, ConfigValue>;

/// Merge the YAML file at `path` into `into`. Returns `false` when the file
/// does not exist.
pub(crate) fn read_yaml_layer(path: &Path, into: &mut Flat) -> Result<bool, ConfigError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(ConfigError::Load(format!("{}: {e}", path.display()))),
    };
    parse_yaml_layer(&content, into)?;
    tracing::trace!(path = %path.display(), "config layer read");
    Ok(true)
}

/// Parse `content` and merge its leaves into `into`.
///
/// A list is kept whole under its own key and each element is also reachable
/// as `key.N`, so `data.errors.0.template` addresses a single field.
pub(crate) fn parse_yaml_layer(content: &str, into: &mut Flat) -> Result<(), ConfigError> {
    let root: Yaml = serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;

    let mut pending: Vec<(String, &Yaml)> = vec![(String::new(), &root)];
    while let Some((path, node)) = pending.pop() {
        match node {
            Yaml::Mapping(map) => {
                pending.extend(map.iter().map(|(k, v)| (join(&path, &key_text(k)), v)));
            }
            _ if path.is_empty() => {}
            Yaml::Sequence(items) => {
                pending.extend(
                    items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| (join(&path, &i.to_string()), item)),
                );
                into.insert(path, ConfigValue::from(node));
            }
            leaf => {
                into.insert(path, ConfigValue::from(leaf));
            }
        }
    }
    Ok(())
}

/// Render a YAML mapping key as a path segment.
pub(crate) fn key_text(key: &Yaml) -> String {
    match key {
        Yaml::String(s) => s.clone(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Bool(b) => b.to_string(),
        other => format!("{other:?}"),
    }
}

/// Environment variable name to config key: `DATA_PAGE_SIZE` is `data.page.size`.
pub(crate) fn env_key(name: &str) -> String {
    name.to_lowercase().replace('_', ".")
}

fn join(prefix: &str, segment: &str) -> String {
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{prefix}.{segment}")
    }
}
