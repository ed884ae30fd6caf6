use super::{ConfigError, TabulaConfig};

/// Trait for strongly-typed configuration sections.
///
/// ```ignore
/// impl ConfigProperties for DataConfig {
///     fn prefix() -> &'static str { "data" }
///
///     fn from_config(config: &TabulaConfig) -> Result<Self, ConfigError> {
///         Ok(Self { page_size: config.get_or("data.page.size", 100)? })
///     }
/// }
/// ```
pub trait ConfigProperties: Sized {
    /// The configuration key prefix (e.g., `"data"`).
    fn prefix() -> &'static str;

    /// Construct from a `TabulaConfig` instance.
    fn from_config(config: &TabulaConfig) -> Result<Self, ConfigError>;

    /// Absolute key for a property relative to [`prefix`](Self::prefix).
    fn key(relative: &str) -> String {
        format!("{}.{relative}", Self::prefix())
    }
}
