use crate::error::RegistryError;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Lifecycle of a subscription as confirmed by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    /// Requested, waiting for the `subscribed` ack.
    Pending,
    /// Bound to a server channel id.
    Active,
    /// Torn down. Only ever observed on values returned from removal.
    Removed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub token: String,
    /// Unknown until activation.
    pub channel_id: Option<i64>,
    pub state: SubscriptionState,
}

#[derive(Debug, Default)]
struct Entries {
    by_token: HashMap<String, Subscription>,
    by_channel: HashMap<i64, String>,
}

/// Maps caller-chosen subscription tokens to server channel ids.
///
/// Written from two sides: the reader task (activation, removal) and any
/// number of callers issuing or cancelling subscribe requests. A single
/// mutex guards both indexes; every method takes it once, does map work
/// only, and releases it before returning.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: Mutex<Entries>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a pending entry for a subscribe request about to be sent.
    pub fn register(&self, token: impl Into<String>) -> Result<(), RegistryError> {
        let token = token.into();
        let mut entries = self.entries.lock();
        if entries.by_token.contains_key(&token) {
            return Err(RegistryError::AlreadyRegistered(token));
        }
        entries.by_token.insert(
            token.clone(),
            Subscription {
                token,
                channel_id: None,
                state: SubscriptionState::Pending,
            },
        );
        Ok(())
    }

    /// Cancels a subscribe request before the server acknowledged it.
    ///
    /// Returns `false` if there is no pending entry for `token`; active
    /// subscriptions are left alone and must be unsubscribed by channel id.
    pub fn unregister(&self, token: &str) -> bool {
        let mut entries = self.entries.lock();
        match entries.by_token.get(token) {
            Some(sub) if sub.state == SubscriptionState::Pending => {
                entries.by_token.remove(token);
                true
            }
            _ => false,
        }
    }

    /// Binds a pending token to the channel id the server assigned.
    pub fn activate(&self, token: &str, channel_id: i64) -> Result<(), RegistryError> {
        let evicted = {
            let mut entries = self.entries.lock();
            let Entries { by_token, by_channel } = &mut *entries;

            match by_token.get(token) {
                Some(sub) if sub.state == SubscriptionState::Pending => {}
                _ => return Err(RegistryError::NotFound(token.to_string())),
            }

            // A channel id belongs to at most one active subscription.
            let evicted = by_channel.insert(channel_id, token.to_string());
            if let Some(stale) = &evicted {
                by_token.remove(stale);
            }

            if let Some(sub) = by_token.get_mut(token) {
                sub.channel_id = Some(channel_id);
                sub.state = SubscriptionState::Active;
            }
            evicted
        };

        if let Some(stale) = evicted {
            tracing::warn!(channel_id, stale_token = %stale, token, "Channel id rebound; evicted stale subscription.");
        }
        Ok(())
    }

    /// Evicts the active subscription bound to `channel_id`.
    ///
    /// Absent channels are not an error: unsubscribe acks can race other
    /// teardown paths. Returns the removed entry, marked `Removed`.
    pub fn remove_by_channel_id(&self, channel_id: i64) -> Option<Subscription> {
        let mut entries = self.entries.lock();
        let token = entries.by_channel.remove(&channel_id)?;
        let mut sub = entries.by_token.remove(&token)?;
        sub.state = SubscriptionState::Removed;
        Some(sub)
    }

    pub fn get(&self, token: &str) -> Option<Subscription> {
        self.entries.lock().by_token.get(token).cloned()
    }

    pub fn token_for_channel(&self, channel_id: i64) -> Option<String> {
        self.entries.lock().by_channel.get(&channel_id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.entries.lock().by_channel.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().by_token.is_empty()
    }
}
