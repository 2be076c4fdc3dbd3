use serde::{Deserialize, Serialize};
use std::fmt;

/// The `status` value the server uses to acknowledge a successful request.
pub const STATUS_OK: &str = "OK";

/// The closed set of event discriminators this client understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Info,
    Auth,
    Subscribed,
    Unsubscribed,
    Error,
    Conf,
    Pong,
}

impl EventKind {
    pub const ALL: [EventKind; 7] = [
        EventKind::Info,
        EventKind::Auth,
        EventKind::Subscribed,
        EventKind::Unsubscribed,
        EventKind::Error,
        EventKind::Conf,
        EventKind::Pong,
    ];

    /// Maps a wire discriminator to its kind. Matching is exact and case-sensitive.
    pub fn from_discriminator(value: &str) -> Option<Self> {
        match value {
            "info" => Some(EventKind::Info),
            "auth" => Some(EventKind::Auth),
            "subscribed" => Some(EventKind::Subscribed),
            "unsubscribed" => Some(EventKind::Unsubscribed),
            "error" => Some(EventKind::Error),
            "conf" => Some(EventKind::Conf),
            "pong" => Some(EventKind::Pong),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Info => "info",
            EventKind::Auth => "auth",
            EventKind::Subscribed => "subscribed",
            EventKind::Unsubscribed => "unsubscribed",
            EventKind::Error => "error",
            EventKind::Conf => "conf",
            EventKind::Pong => "pong",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Event payloads ---
// Field names follow the wire format; optional fields may be absent from the frame.

/// Sent by the server once the socket is open.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfoEvent {
    pub version: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformStatus>,
}

/// Platform operative flag carried by `info`. `1` means operative, `0` maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformStatus {
    pub status: i32,
}

/// A single read/write permission pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capability {
    pub read: i32,
    pub write: i32,
}

impl Capability {
    pub fn can_read(&self) -> bool {
        self.read != 0
    }

    pub fn can_write(&self) -> bool {
        self.write != 0
    }
}

/// Permissions granted to the authenticated API key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    #[serde(default)]
    pub orders: Capability,
    #[serde(default)]
    pub account: Capability,
    #[serde(default)]
    pub funding: Capability,
    #[serde(default)]
    pub history: Capability,
    #[serde(default)]
    pub wallets: Capability,
    #[serde(default)]
    pub withdraw: Capability,
    #[serde(default)]
    pub positions: Capability,
}

/// Acknowledgment of an authentication request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthEvent {
    pub status: String,
    #[serde(rename = "chanId", default, skip_serializing_if = "Option::is_none")]
    pub chan_id: Option<i64>,
    #[serde(rename = "userId", default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(rename = "subId")]
    pub sub_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_id: Option<String>,
    #[serde(rename = "msg", default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub caps: Capabilities,
}

impl AuthEvent {
    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// Confirmation that a subscribe request was accepted and bound to a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribedEvent {
    #[serde(rename = "subId")]
    pub sub_id: String,
    pub channel: String,
    #[serde(rename = "chanId")]
    pub chan_id: i64,
    pub symbol: String,
    #[serde(rename = "prec", default, skip_serializing_if = "Option::is_none")]
    pub precision: Option<String>,
    #[serde(rename = "freq", default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub len: Option<String>,
    pub pair: String,
}

/// Confirmation that a channel has been torn down.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribedEvent {
    pub status: String,
    #[serde(rename = "chanId")]
    pub chan_id: i64,
}

/// An application-level error reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEvent {
    pub code: i64,
    #[serde(rename = "msg")]
    pub message: String,
}

/// Acknowledgment of a connection configuration request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfEvent {
    pub flags: i64,
}

/// Reply to a ping carrying the caller's correlation id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongEvent {
    pub cid: i64,
    #[serde(rename = "ts")]
    pub timestamp: i64,
}

/// A fully decoded server event.
///
/// Serializes as the bare payload; the discriminator travels separately in
/// the [`Envelope`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Event {
    Info(InfoEvent),
    Auth(AuthEvent),
    Subscribed(SubscribedEvent),
    Unsubscribed(UnsubscribedEvent),
    Error(ErrorEvent),
    Conf(ConfEvent),
    Pong(PongEvent),
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Info(_) => EventKind::Info,
            Event::Auth(_) => EventKind::Auth,
            Event::Subscribed(_) => EventKind::Subscribed,
            Event::Unsubscribed(_) => EventKind::Unsubscribed,
            Event::Error(_) => EventKind::Error,
            Event::Conf(_) => EventKind::Conf,
            Event::Pong(_) => EventKind::Pong,
        }
    }
}

/// What the delivery channel carries: the discriminator plus the typed event.
///
/// Serializes as
/// `{ "kind": "subscribed", "payload": { "subId": "...", "chanId": 5, ... } }`.
/// The kind is derived from the payload, so the two can never disagree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    kind: EventKind,
    payload: Event,
}

impl Envelope {
    pub fn new(payload: Event) -> Self {
        Self {
            kind: payload.kind(),
            payload,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    pub fn payload(&self) -> &Event {
        &self.payload
    }

    pub fn into_payload(self) -> Event {
        self.payload
    }
}

impl From<Event> for Envelope {
    fn from(payload: Event) -> Self {
        Envelope::new(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn discriminators_round_trip_through_as_str() {
        for kind in EventKind::ALL {
            assert_eq!(EventKind::from_discriminator(kind.as_str()), Some(kind));
        }
        assert_eq!(EventKind::from_discriminator("INFO"), None);
        assert_eq!(EventKind::from_discriminator("subscribe"), None);
    }

    #[test]
    fn envelope_serializes_kind_and_bare_payload() {
        let envelope = Envelope::new(Event::Unsubscribed(UnsubscribedEvent {
            status: "OK".into(),
            chan_id: 5,
        }));
        assert_eq!(envelope.kind(), EventKind::Unsubscribed);
        assert_eq!(
            serde_json::to_value(&envelope).unwrap(),
            json!({"kind": "unsubscribed", "payload": {"status": "OK", "chanId": 5}})
        );
    }

    #[test]
    fn auth_is_ok_only_for_exact_marker() {
        let mut auth = AuthEvent {
            status: "OK".into(),
            chan_id: None,
            user_id: None,
            sub_id: "a1".into(),
            auth_id: None,
            message: None,
            caps: Capabilities::default(),
        };
        assert!(auth.is_ok());
        auth.status = "ok".into();
        assert!(!auth.is_ok());
        auth.status = "FAILED".into();
        assert!(!auth.is_ok());
    }
}
