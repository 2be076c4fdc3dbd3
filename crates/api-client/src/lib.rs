use crate::error::ApiError;
use async_trait::async_trait;
use configuration::Settings;
use core_types::TickerSnapshot;
use serde_json::Value;

mod auth;
pub mod authentication;
pub mod error;
pub mod live_connector;
pub mod registry;
pub mod requests;
pub mod responses;
pub mod router;
// --- Public API ---
pub use authentication::{AuthStatus, AuthTracker};
pub use error::{RegistryError, RouterError};
pub use live_connector::{ChannelUpdate, Connection, Inbound, LiveConnector};
pub use registry::{Subscription, SubscriptionRegistry, SubscriptionState};
pub use requests::{AuthRequest, PingRequest, Request, SubscribeRequest, UnsubscribeRequest};
pub use responses::ApiErrorResponse;
pub use router::EventRouter;

/// The request/response side of the exchange API.
/// This trait is the contract callers depend on, allowing the
/// underlying implementation (live or mock) to be swapped out.
#[async_trait]
pub trait ApiClient: Send + Sync {
    /// Fetches a ticker snapshot for the given symbols; an empty list means all symbols.
    async fn fetch_tickers(&self, symbols: &[String]) -> Result<TickerSnapshot, ApiError>;
}

/// A concrete implementation of the `ApiClient` for the public Bitfinex REST API.
#[derive(Clone)]
pub struct BitfinexClient {
    client: reqwest::Client,
    base_url: String,
}

impl BitfinexClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        Self::new(settings.exchange.rest_url.as_str())
    }

    async fn get_public(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status.is_success() {
            serde_json::from_str::<Value>(&text).map_err(|e| ApiError::Deserialization(e.to_string()))
        } else {
            match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(api_error) => Err(ApiError::Exchange(api_error.code(), api_error.msg().to_string())),
                Err(_) => Err(ApiError::ApiError(format!("HTTP {}: {}", status, text))),
            }
        }
    }
}

#[async_trait]
impl ApiClient for BitfinexClient {
    async fn fetch_tickers(&self, symbols: &[String]) -> Result<TickerSnapshot, ApiError> {
        let symbols = if symbols.is_empty() {
            "ALL".to_string()
        } else {
            symbols.join(",")
        };
        tracing::debug!(%symbols, "Fetching tickers.");

        let body = self.get_public("/tickers", &[("symbols", symbols)]).await?;
        let rows = match body {
            Value::Array(rows) => rows,
            other => {
                return Err(ApiError::Deserialization(format!(
                    "expected an array of tickers, got: {}",
                    other
                )));
            }
        };

        Ok(TickerSnapshot::from_raw_rows(&rows)?)
    }
}
