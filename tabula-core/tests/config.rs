use std::collections::HashMap;

use serial_test::serial;
use tabula_core::config::{ConfigError, ConfigProperties, ConfigValue, TabulaConfig};

#[test]
fn test_empty_config() {
    let config = TabulaConfig::empty();
    assert!(matches!(
        config.get::<String>("nonexistent"),
        Err(ConfigError::NotFound(_))
    ));
}

#[test]
fn test_set_and_get() {
    let mut config = TabulaConfig::empty();
    config.set("data.page.size", ConfigValue::Integer(50));
    assert_eq!(config.get::<u64>("data.page.size").unwrap(), 50);
    assert_eq!(config.get::<String>("data.page.size").unwrap(), "50");
}

#[test]
fn test_get_or_default_and_mismatch() {
    let mut config = TabulaConfig::empty();
    assert_eq!(config.get_or("missing", 42i64).unwrap(), 42);

    config.set("data.page.size", ConfigValue::String("lots".into()));
    assert!(matches!(
        config.get_or("data.page.size", 100u64),
        Err(ConfigError::TypeMismatch { .. })
    ));
}

#[test]
fn test_negative_value_rejected_for_unsigned() {
    let mut config = TabulaConfig::empty();
    config.set("data.page.max", ConfigValue::Integer(-1));
    assert!(config.get::<u64>("data.page.max").is_err());
}

#[test]
fn test_flatten_yaml_with_list_of_maps() {
    let yaml = r#"
data:
  page:
    size: 25
  errors:
    - pattern: "UNIQUE constraint failed: \\w+\\.(?P<field>\\w+)"
      template: "{field} already exists"
"#;
    let config = TabulaConfig::from_yaml_str(yaml, "test").unwrap();

    assert_eq!(config.get::<i64>("data.page.size").unwrap(), 25);
    assert_eq!(
        config.get::<String>("data.errors.0.template").unwrap(),
        "{field} already exists"
    );

    let rules: Vec<HashMap<String, String>> = config.get("data.errors").unwrap();
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0]["template"], "{field} already exists");
}

#[test]
fn test_single_value_as_vec() {
    let mut config = TabulaConfig::empty();
    config.set("single", ConfigValue::String("only-one".into()));
    let result: Vec<String> = config.get("single").unwrap();
    assert_eq!(result, vec!["only-one"]);
}

#[test]
fn test_invalid_yaml() {
    let result = TabulaConfig::from_yaml_str("data: [unclosed", "test");
    assert!(matches!(result, Err(ConfigError::Load(_))));
}

// --- ConfigProperties ---

#[derive(Debug)]
struct PoolConfig {
    size: u32,
    label: Option<String>,
}

impl ConfigProperties for PoolConfig {
    fn prefix() -> &'static str {
        "pool"
    }

    fn from_config(config: &TabulaConfig) -> Result<Self, ConfigError> {
        Ok(PoolConfig {
            size: config.get_or(&Self::key("size"), 4)?,
            label: config.get_or(&Self::key("label"), None)?,
        })
    }
}

#[test]
fn test_with_typed_derefs_to_section() {
    let config = TabulaConfig::from_yaml_str("pool:\n  size: 16\n", "test")
        .unwrap()
        .with_typed::<PoolConfig>()
        .unwrap();

    assert_eq!(config.size, 16);
    assert!(config.label.is_none());
    assert_eq!(config.get::<i64>("pool.size").unwrap(), 16);
    assert_eq!(config.profile(), "test");
}

// --- File + environment layering ---

#[test]
#[serial]
fn test_load_from_dir_layers_profile_and_env() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("application.yaml"),
        "pool:\n  size: 2\n  label: base\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("application-staging.yaml"),
        "pool:\n  label: staging\n",
    )
    .unwrap();

    std::env::remove_var("TABULA_PROFILE");
    std::env::set_var("POOL_SIZE", "9");
    let config = TabulaConfig::load_from(dir.path(), "staging").unwrap();
    std::env::remove_var("POOL_SIZE");

    assert_eq!(config.profile(), "staging");
    assert_eq!(config.get::<String>("pool.label").unwrap(), "staging");
    assert_eq!(config.get::<u32>("pool.size").unwrap(), 9);
}

#[test]
#[serial]
fn test_load_from_reads_dotenv() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join(".env"), "TABULA_DOTENV_MARKER=from-file\n").unwrap();

    std::env::remove_var("TABULA_DOTENV_MARKER");
    let config = TabulaConfig::load_from(dir.path(), "dev").unwrap();
    std::env::remove_var("TABULA_DOTENV_MARKER");

    assert_eq!(
        config.get::<String>("tabula.dotenv.marker").unwrap(),
        "from-file"
    );
}
