use crate::error::CodecError;
use crate::messages::{Event, EventKind};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Decodes one raw frame into a typed [`Event`].
///
/// Decoding happens in two steps: the `event` discriminator is read first,
/// and only a recognized discriminator proceeds to the full decode of its
/// payload type.
pub fn decode_event(frame: &[u8]) -> Result<Event, CodecError> {
    let value: Value = serde_json::from_slice(frame)
        .map_err(|source| CodecError::MalformedEvent { kind: None, source })?;

    let kind = value
        .get("event")
        .and_then(Value::as_str)
        .and_then(EventKind::from_discriminator)
        .ok_or_else(|| CodecError::UnknownEvent {
            raw: String::from_utf8_lossy(frame).into_owned(),
        })?;

    let event = match kind {
        EventKind::Info => Event::Info(decode_payload(kind, value)?),
        EventKind::Auth => Event::Auth(decode_payload(kind, value)?),
        EventKind::Subscribed => Event::Subscribed(decode_payload(kind, value)?),
        EventKind::Unsubscribed => Event::Unsubscribed(decode_payload(kind, value)?),
        EventKind::Error => Event::Error(decode_payload(kind, value)?),
        EventKind::Conf => Event::Conf(decode_payload(kind, value)?),
        EventKind::Pong => Event::Pong(decode_payload(kind, value)?),
    };
    Ok(event)
}

fn decode_payload<T: DeserializeOwned>(kind: EventKind, value: Value) -> Result<T, CodecError> {
    serde_json::from_value(value).map_err(|source| CodecError::MalformedEvent {
        kind: Some(kind.as_str().to_string()),
        source,
    })
}
