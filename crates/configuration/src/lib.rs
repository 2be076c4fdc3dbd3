use crate::error::ConfigError;
use std::path::Path;

// Declare the modules that make up this crate.
pub mod error;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use logging::init_tracing;
pub use settings::{
    ConnectionSettings, Credentials, ExchangeSettings, LogFormat, LoggingSettings, Settings,
};

/// Prefix for environment overrides, e.g. `BFX_EXCHANGE__WS_URL`.
pub const ENV_PREFIX: &str = "BFX";

pub const DEFAULT_WS_URL: &str = "wss://api-pub.bitfinex.com/ws/2";
pub const DEFAULT_REST_URL: &str = "https://api-pub.bitfinex.com/v2";

/// Loads the application configuration from the `config.toml` file.
///
/// Built-in defaults are applied first, then the file (which may be absent),
/// then `BFX_*` environment variables. The result is validated before it is
/// returned.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from(Path::new("config.toml"))
}

/// Same as [`load_config`], reading the file at `path` instead.
pub fn load_config_from(path: &Path) -> Result<Settings, ConfigError> {
    let builder = config::Config::builder()
        .set_default("exchange.ws_url", DEFAULT_WS_URL)?
        .set_default("exchange.rest_url", DEFAULT_REST_URL)?
        .set_default("connection.delivery_buffer", 1024_i64)?
        .set_default("connection.update_buffer", 1024_i64)?
        .set_default("connection.outbound_buffer", 64_i64)?
        .set_default("logging.level", "info")?
        .set_default("logging.format", "full")?
        .set_default("logging.file_prefix", "bfx-stream.log")?
        .add_source(config::File::from(path).required(false))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    // Attempt to deserialize the entire configuration into our `Settings` struct
    let settings = builder.try_deserialize::<Settings>()?;
    settings.validate()?;
    tracing::debug!(path = %path.display(), found = path.exists(), "Configuration loaded.");

    Ok(settings)
}
