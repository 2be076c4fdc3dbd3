//! # Events
//!
//! This crate defines the server events of the streaming protocol and the
//! codec that turns raw frames into them.
//!
//! As a Layer 0 crate it has no workspace dependencies; it provides the
//! definitive language that the connector and its consumers share.

// Declare the modules that make up this crate.
pub mod codec;
pub mod error;
pub mod messages;

// Re-export the core types to provide a clean public API.
pub use codec::decode_event;
pub use error::CodecError;
pub use messages::{
    AuthEvent, Capabilities, Capability, ConfEvent, Envelope, ErrorEvent, Event, EventKind,
    InfoEvent, PlatformStatus, PongEvent, STATUS_OK, SubscribedEvent, UnsubscribedEvent,
};
