use events::{CodecError, SubscribedEvent};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed to build the HTTP request: {0}")]
    RequestBuild(#[from] reqwest::Error),

    #[error("The API request returned an error: {0}")]
    ApiError(String),

    #[error("Exchange error {0}: {1}")]
    Exchange(i64, String),

    #[error("Failed to deserialize the API response: {0}")]
    Deserialization(String),

    #[error("Invalid data format from API: {0}")]
    InvalidData(#[from] core_types::CoreError),

    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("WebSocket transport error: {0}")]
    WebSocket(#[from] Box<tokio_tungstenite::tungstenite::Error>),

    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Subscription registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("The connection is closed")]
    ConnectionClosed,
}

impl From<tokio_tungstenite::tungstenite::Error> for ApiError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        ApiError::WebSocket(Box::new(err))
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Subscription token '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("No pending subscription for token '{0}'")]
    NotFound(String),
}

/// Per-frame failure returned by the event router.
///
/// Only [`RouterError::DeliveryClosed`] is fatal; every other variant means
/// "this frame was dropped, keep reading".
#[derive(Error, Debug)]
pub enum RouterError {
    /// `UnknownEvent` or `MalformedEvent` from the codec.
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A `subscribed` ack named a token with no pending registry entry.
    /// The ack is carried here instead of being forwarded.
    #[error("Subscribed ack for token '{}' (channel {}) has no pending subscription", .event.sub_id, .event.chan_id)]
    ActivationNotFound {
        event: Box<SubscribedEvent>,
        #[source]
        source: RegistryError,
    },

    /// The consumer dropped the envelope receiver.
    #[error("Delivery channel closed; the consumer has gone away")]
    DeliveryClosed,
}

impl RouterError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, RouterError::DeliveryClosed)
    }
}
