use thiserror::Error;

/// Failure to turn a raw frame into a typed [`Event`](crate::Event).
///
/// Both variants are per-frame problems: the frame is dropped and the
/// stream itself remains usable.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The `event` discriminator is missing, not a string, or not one of the
    /// known kinds. Carries the raw frame so protocol drift can be diagnosed.
    #[error("Unknown event: {raw}")]
    UnknownEvent { raw: String },

    /// The discriminator was recognized (or the frame was not JSON at all,
    /// in which case `kind` is `None`) but the payload failed to decode.
    #[error("Malformed '{}' event: {source}", .kind.as_deref().unwrap_or("<unreadable>"))]
    MalformedEvent {
        kind: Option<String>,
        #[source]
        source: serde_json::Error,
    },
}
