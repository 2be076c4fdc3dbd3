use crate::error::ConfigError;
use serde::Deserialize;
use std::fmt;
use std::path::PathBuf;

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub exchange: ExchangeSettings,
    pub connection: ConnectionSettings,
    #[serde(default)]
    pub credentials: Credentials,
    pub logging: LoggingSettings,
}

/// Exchange endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeSettings {
    /// Websocket endpoint, e.g. `wss://api-pub.bitfinex.com/ws/2`.
    pub ws_url: String,
    /// REST base URL, e.g. `https://api-pub.bitfinex.com/v2`.
    pub rest_url: String,
}

/// Sizing of the queues between the reader task and its consumers.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionSettings {
    /// Capacity of the event envelope channel. A full channel back-pressures the reader.
    pub delivery_buffer: usize,
    /// Capacity of the channel carrying raw channel updates.
    pub update_buffer: usize,
    /// Capacity of the outbound request queue feeding the socket writer.
    pub outbound_buffer: usize,
}

/// API key pair for authenticated channels. Both empty means unauthenticated.
#[derive(Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
}

impl Credentials {
    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty() && !self.api_secret.is_empty()
    }
}

// Keep the secret out of logs.
impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &if self.api_secret.is_empty() { "" } else { "***" })
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum LogFormat {
    Full,
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingSettings {
    /// Default filter directive, used when `RUST_LOG` is not set.
    pub level: String,
    pub format: LogFormat,
    /// When set, logs are also written to a daily rolling file in this directory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    pub file_prefix: String,
}

impl Settings {
    /// Checks the invariants the deserializer cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.exchange.ws_url.starts_with("ws://") || self.exchange.ws_url.starts_with("wss://")) {
            return Err(ConfigError::ValidationError(format!(
                "exchange.ws_url must be a ws:// or wss:// URL, got '{}'",
                self.exchange.ws_url
            )));
        }
        if !(self.exchange.rest_url.starts_with("http://") || self.exchange.rest_url.starts_with("https://")) {
            return Err(ConfigError::ValidationError(format!(
                "exchange.rest_url must be an http(s) URL, got '{}'",
                self.exchange.rest_url
            )));
        }
        for (name, value) in [
            ("connection.delivery_buffer", self.connection.delivery_buffer),
            ("connection.update_buffer", self.connection.update_buffer),
            ("connection.outbound_buffer", self.connection.outbound_buffer),
        ] {
            if value == 0 {
                return Err(ConfigError::ValidationError(format!("{} must be greater than zero", name)));
            }
        }
        if self.credentials.api_key.is_empty() != self.credentials.api_secret.is_empty() {
            return Err(ConfigError::ValidationError(
                "credentials.api_key and credentials.api_secret must be set together".to_string(),
            ));
        }
        Ok(())
    }
}
