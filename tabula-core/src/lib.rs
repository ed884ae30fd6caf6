pub mod config;
pub mod error;
pub mod logging;
pub mod params;

pub use config::{ConfigError, ConfigProperties, ConfigValue, FromConfigValue, TabulaConfig};
pub use error::{error_response, ApiError, FieldError};
pub use logging::{init_tracing, init_tracing_json};
pub use params::{parse_query_string, QueryParams};

pub use http::StatusCode;

pub mod prelude {
    //! Re-exports of the most commonly used core types.
    pub use crate::{
        ApiError, ConfigError, ConfigProperties, FieldError, QueryParams, StatusCode, TabulaConfig,
    };
}
