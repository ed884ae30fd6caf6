mod loader;
pub mod typed;
pub mod value;

use std::ops::Deref;
use std::path::Path;

use loader::Flat;

pub use typed::ConfigProperties;
pub use value::{ConfigValue, FromConfigValue};

/// Environment variable that overrides the requested profile.
pub const PROFILE_ENV: &str = "TABULA_PROFILE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config key not found: {0}")]
    NotFound(String),
    #[error("Config type mismatch for '{key}': expected {expected}")]
    TypeMismatch { key: String, expected: &'static str },
    /// I/O or YAML syntax failure while reading a layer.
    #[error("Config load error: {0}")]
    Load(String),
    /// A typed section rejected a value that converted fine.
    #[error("Config value for '{key}' is invalid: {message}")]
    Invalid { key: String, message: String },
}

/// Layered application configuration.
///
/// Later layers win:
///
/// | Layer | Example |
/// |-------|---------|
/// | base file | `application.yaml` |
/// | profile file | `application-staging.yaml` |
/// | dotenv files | `.env`, then `.env.staging` (never overwrite variables already set) |
/// | process environment | `DATA_PAGE_SIZE=50` sets `data.page.size` |
///
/// `TabulaConfig<T>` also carries a typed section `T`, reachable through
/// `Deref` once [`with_typed`](TabulaConfig::with_typed) has built it.
#[derive(Debug, Clone)]
pub struct TabulaConfig<T = ()> {
    values: Flat,
    profile: String,
    typed: T,
}

impl TabulaConfig {
    /// Load the `profile` layers from the working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from(Path::new("."), profile)
    }

    /// Load the `profile` layers from `dir`. [`PROFILE_ENV`] takes precedence
    /// over `profile` when set.
    pub fn load_from(dir: &Path, profile: &str) -> Result<Self, ConfigError> {
        let profile = std::env::var(PROFILE_ENV).unwrap_or_else(|_| profile.to_string());
        let mut values = Flat::new();

        for file in ["application.yaml".to_string(), format!("application-{profile}.yaml")] {
            loader::read_yaml_layer(&dir.join(file), &mut values)?;
        }
        for file in [".env".to_string(), format!(".env.{profile}")] {
            if let Err(e) = dotenvy::from_path(dir.join(&file)) {
                if !e.not_found() {
                    return Err(ConfigError::Load(format!("{file}: {e}")));
                }
            }
        }
        values.extend(
            std::env::vars().map(|(name, value)| (loader::env_key(&name), ConfigValue::String(value))),
        );

        tracing::debug!(%profile, keys = values.len(), "configuration loaded");
        Ok(Self::from_values(values, profile))
    }

    /// A config holding only the keys of `yaml`.
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = Flat::new();
        loader::parse_yaml_layer(yaml, &mut values)?;
        Ok(Self::from_values(values, profile.to_string()))
    }

    pub fn empty() -> Self {
        Self::from_values(Flat::new(), "test".to_string())
    }

    fn from_values(values: Flat, profile: String) -> Self {
        TabulaConfig {
            values,
            profile,
            typed: (),
        }
    }

    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    /// Build the typed section `C` from the raw values.
    ///
    /// ```ignore
    /// let config = TabulaConfig::load("dev")?.with_typed::<DataConfig>()?;
    /// let size = config.page_size;
    /// ```
    pub fn with_typed<C: ConfigProperties>(self) -> Result<TabulaConfig<C>, ConfigError> {
        let typed = C::from_config(&self)?;
        Ok(TabulaConfig {
            values: self.values,
            profile: self.profile,
            typed,
        })
    }
}

impl<T> TabulaConfig<T> {
    /// Value under the dot-separated `key`, converted to `V`.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        match self.values.get(key) {
            Some(value) => V::from_config_value(value, key),
            None => Err(ConfigError::NotFound(key.to_string())),
        }
    }

    /// Like [`get`](Self::get) but falls back to `default` for a missing
    /// key. A present value of the wrong type is still an error.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> Result<V, ConfigError> {
        match self.get(key) {
            Err(ConfigError::NotFound(_)) => Ok(default),
            other => other,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    pub fn typed(&self) -> &T {
        &self.typed
    }
}

impl<T> Deref for TabulaConfig<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.typed
    }
}
