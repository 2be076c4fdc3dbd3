use crate::authentication::AuthTracker;
use crate::error::RouterError;
use crate::registry::SubscriptionRegistry;
use events::{AuthEvent, Envelope, Event, EventKind, InfoEvent, decode_event};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Turns raw event frames into envelopes on the delivery channel.
///
/// One router serves one connection and is driven by that connection's
/// reader task, one frame at a time: `route_frame` for frame N completes
/// (including the send on the delivery channel) before frame N+1 starts,
/// so registry updates and delivered envelopes follow wire order.
pub struct EventRouter {
    registry: Arc<SubscriptionRegistry>,
    auth: Arc<AuthTracker>,
    delivery: mpsc::Sender<Envelope>,
    ready: watch::Sender<Option<InfoEvent>>,
    auth_ack: watch::Sender<Option<AuthEvent>>,
}

impl EventRouter {
    pub fn new(
        registry: Arc<SubscriptionRegistry>,
        auth: Arc<AuthTracker>,
        delivery: mpsc::Sender<Envelope>,
    ) -> Self {
        let (ready, _) = watch::channel(None);
        let (auth_ack, _) = watch::channel(None);
        Self {
            registry,
            auth,
            delivery,
            ready,
            auth_ack,
        }
    }

    /// Holds the `info` event once the server has announced itself.
    pub fn ready_signal(&self) -> watch::Receiver<Option<InfoEvent>> {
        self.ready.subscribe()
    }

    /// Updated with every `auth` ack, after the auth status has been recorded.
    pub fn auth_ack_signal(&self) -> watch::Receiver<Option<AuthEvent>> {
        self.auth_ack.subscribe()
    }

    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    pub fn auth(&self) -> &Arc<AuthTracker> {
        &self.auth
    }

    /// Decodes one frame, applies its side effects and forwards it.
    ///
    /// Nothing is forwarded when an error is returned. Blocks while the
    /// delivery channel is full.
    pub async fn route_frame(&self, frame: &[u8]) -> Result<EventKind, RouterError> {
        let event = decode_event(frame)?;
        let event = self.apply(event)?;
        let kind = event.kind();

        self.delivery
            .send(Envelope::new(event))
            .await
            .map_err(|_| RouterError::DeliveryClosed)?;
        Ok(kind)
    }

    fn apply(&self, event: Event) -> Result<Event, RouterError> {
        match event {
            Event::Info(info) => {
                tracing::info!(version = info.version, "Server announced protocol version.");
                self.ready.send_replace(Some(info.clone()));
                Ok(Event::Info(info))
            }
            Event::Auth(ack) => {
                let status = self.auth.record(&ack);
                tracing::info!(?status, user_id = ?ack.user_id, "Authentication acknowledged.");
                self.auth_ack.send_replace(Some(ack.clone()));
                Ok(Event::Auth(ack))
            }
            Event::Subscribed(sub) => match self.registry.activate(&sub.sub_id, sub.chan_id) {
                Ok(()) => {
                    tracing::debug!(token = %sub.sub_id, chan_id = sub.chan_id, channel = %sub.channel, "Subscription active.");
                    Ok(Event::Subscribed(sub))
                }
                Err(source) => Err(RouterError::ActivationNotFound {
                    event: Box::new(sub),
                    source,
                }),
            },
            Event::Unsubscribed(unsub) => {
                match self.registry.remove_by_channel_id(unsub.chan_id) {
                    Some(sub) => tracing::debug!(token = %sub.token, chan_id = unsub.chan_id, "Subscription removed."),
                    None => tracing::debug!(chan_id = unsub.chan_id, "Unsubscribed from a channel with no registry entry."),
                }
                Ok(Event::Unsubscribed(unsub))
            }
            Event::Error(err) => {
                tracing::debug!(code = err.code, msg = %err.message, "Server reported an error event.");
                Ok(Event::Error(err))
            }
            event @ (Event::Conf(_) | Event::Pong(_)) => Ok(event),
        }
    }
}
