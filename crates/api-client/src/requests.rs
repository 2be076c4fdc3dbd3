//! Outbound request frames.
//!
//! Every request serializes to a JSON object tagged with its `event` name,
//! e.g. `{"event":"subscribe","channel":"ticker","symbol":"tBTCUSD","subId":"..."}`.

use crate::auth::{auth_nonce, auth_payload, sign_payload};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum Request {
    Subscribe(SubscribeRequest),
    Unsubscribe(UnsubscribeRequest),
    Auth(AuthRequest),
    Ping(PingRequest),
}

impl Request {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Asks the server to open a channel. `sub_id` is the token the server
/// echoes back in the `subscribed` ack.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscribeRequest {
    pub channel: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    #[serde(rename = "subId")]
    pub sub_id: String,
    #[serde(rename = "prec", skip_serializing_if = "Option::is_none")]
    pub precision: Option<String>,
    #[serde(rename = "freq", skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<String>,
}

impl SubscribeRequest {
    /// A request for `channel` with a freshly generated token.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            channel: channel.into(),
            symbol: None,
            sub_id: Uuid::new_v4().to_string(),
            precision: None,
            frequency: None,
            key: None,
            len: None,
        }
    }

    pub fn ticker(symbol: impl Into<String>) -> Self {
        Self::new("ticker").symbol(symbol)
    }

    pub fn trades(symbol: impl Into<String>) -> Self {
        Self::new("trades").symbol(symbol)
    }

    pub fn book(symbol: impl Into<String>, precision: &str, frequency: &str, len: u32) -> Self {
        let mut request = Self::new("book").symbol(symbol);
        request.precision = Some(precision.to_string());
        request.frequency = Some(frequency.to_string());
        request.len = Some(len.to_string());
        request
    }

    /// Candles are addressed by key, e.g. `trade:1m:tBTCUSD`, not by symbol.
    pub fn candles(key: impl Into<String>) -> Self {
        let mut request = Self::new("candles");
        request.key = Some(key.into());
        request
    }

    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Replaces the generated token with a caller-chosen one.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.sub_id = token.into();
        self
    }

    pub fn token(&self) -> &str {
        &self.sub_id
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnsubscribeRequest {
    #[serde(rename = "chanId")]
    pub chan_id: i64,
}

/// A signed login request for the authenticated channel.
#[derive(Clone, PartialEq, Serialize)]
pub struct AuthRequest {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    #[serde(rename = "authSig")]
    pub auth_sig: String,
    #[serde(rename = "authPayload")]
    pub auth_payload: String,
    #[serde(rename = "authNonce")]
    pub auth_nonce: u64,
    #[serde(rename = "subId", skip_serializing_if = "Option::is_none")]
    pub sub_id: Option<String>,
    /// Restricts which account streams the server pushes; empty means all.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub filter: Vec<String>,
}

impl AuthRequest {
    /// Signs a login with the current time as nonce.
    pub fn new(api_key: &str, api_secret: &str) -> Self {
        Self::with_nonce(api_key, api_secret, auth_nonce())
    }

    pub fn with_nonce(api_key: &str, api_secret: &str, nonce: u64) -> Self {
        let payload = auth_payload(nonce);
        Self {
            api_key: api_key.to_string(),
            auth_sig: sign_payload(api_secret, &payload),
            auth_payload: payload,
            auth_nonce: nonce,
            sub_id: None,
            filter: Vec::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.sub_id = Some(token.into());
        self
    }

    pub fn with_filter(mut self, filter: Vec<String>) -> Self {
        self.filter = filter;
        self
    }
}

// The signature is a credential; keep it out of logs.
impl std::fmt::Debug for AuthRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthRequest")
            .field("api_key", &self.api_key)
            .field("auth_nonce", &self.auth_nonce)
            .field("sub_id", &self.sub_id)
            .field("filter", &self.filter)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PingRequest {
    pub cid: i64,
}

impl From<SubscribeRequest> for Request {
    fn from(request: SubscribeRequest) -> Self {
        Request::Subscribe(request)
    }
}

impl From<UnsubscribeRequest> for Request {
    fn from(request: UnsubscribeRequest) -> Self {
        Request::Unsubscribe(request)
    }
}

impl From<AuthRequest> for Request {
    fn from(request: AuthRequest) -> Self {
        Request::Auth(request)
    }
}

impl From<PingRequest> for Request {
    fn from(request: PingRequest) -> Self {
        Request::Ping(request)
    }
}
