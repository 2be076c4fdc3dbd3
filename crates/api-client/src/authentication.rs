use events::AuthEvent;
use std::sync::atomic::{AtomicU8, Ordering};

/// Outcome of the most recent authentication attempt on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum AuthStatus {
    Unknown = 0,
    Authenticated = 1,
    Rejected = 2,
}

impl AuthStatus {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => AuthStatus::Authenticated,
            2 => AuthStatus::Rejected,
            _ => AuthStatus::Unknown,
        }
    }
}

/// Holds the connection's authentication status.
///
/// Only the event router writes it, once per `auth` ack; every other holder
/// reads. A later ack overwrites the earlier one.
#[derive(Debug)]
pub struct AuthTracker {
    status: AtomicU8,
}

impl Default for AuthTracker {
    fn default() -> Self {
        Self {
            status: AtomicU8::new(AuthStatus::Unknown as u8),
        }
    }
}

impl AuthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> AuthStatus {
        AuthStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn is_authenticated(&self) -> bool {
        self.status() == AuthStatus::Authenticated
    }

    pub(crate) fn record(&self, ack: &AuthEvent) -> AuthStatus {
        let status = if ack.is_ok() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Rejected
        };
        self.status.store(status as u8, Ordering::Release);
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use events::Capabilities;

    fn ack(status: &str) -> AuthEvent {
        AuthEvent {
            status: status.into(),
            chan_id: Some(0),
            user_id: None,
            sub_id: "auth".into(),
            auth_id: None,
            message: None,
            caps: Capabilities::default(),
        }
    }

    #[test]
    fn starts_unknown() {
        let tracker = AuthTracker::new();
        assert_eq!(tracker.status(), AuthStatus::Unknown);
        assert!(!tracker.is_authenticated());
    }

    #[test]
    fn ok_authenticates_anything_else_rejects() {
        let tracker = AuthTracker::new();
        assert_eq!(tracker.record(&ack("OK")), AuthStatus::Authenticated);
        assert!(tracker.is_authenticated());

        let tracker = AuthTracker::new();
        assert_eq!(tracker.record(&ack("FAILED")), AuthStatus::Rejected);
        assert_eq!(tracker.status(), AuthStatus::Rejected);
    }

    #[test]
    fn later_ack_overwrites_earlier_one() {
        let tracker = AuthTracker::new();
        tracker.record(&ack("FAILED"));
        tracker.record(&ack("OK"));
        assert_eq!(tracker.status(), AuthStatus::Authenticated);
        tracker.record(&ack("FAILED"));
        assert_eq!(tracker.status(), AuthStatus::Rejected);
    }
}
