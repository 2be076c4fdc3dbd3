use crate::authentication::{AuthStatus, AuthTracker};
use crate::error::{ApiError, RegistryError};
use crate::registry::SubscriptionRegistry;
use crate::requests::{AuthRequest, PingRequest, Request, SubscribeRequest, UnsubscribeRequest};
use crate::router::EventRouter;
use configuration::{ConnectionSettings, Settings};
use events::{AuthEvent, Envelope, InfoEvent};
use futures::{Sink, SinkExt, Stream, StreamExt};
use serde_json::Value;
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use url::Url;

/// A data message on an active channel: `[chanId, ...]`.
///
/// These frames carry no `event` field and never pass through the event
/// codec. `data` holds every element after the channel id.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelUpdate {
    pub chan_id: i64,
    /// The subscription token bound to `chan_id`, if the channel is known.
    pub token: Option<String>,
    pub data: Vec<Value>,
}

/// Receiving ends handed to the application. Each is delivered in wire order.
pub struct Inbound {
    pub events: mpsc::Receiver<Envelope>,
    pub updates: mpsc::Receiver<ChannelUpdate>,
}

/// Opens websocket connections to the exchange.
///
/// Reconnection is left to the caller: a dropped connection
/// closes the `Inbound` channels and the caller decides whether to connect again.
pub struct LiveConnector {
    url: Url,
    settings: ConnectionSettings,
}

impl LiveConnector {
    pub fn new(ws_url: &str, settings: ConnectionSettings) -> Result<Self, ApiError> {
        Ok(Self {
            url: Url::parse(ws_url)?,
            settings,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, ApiError> {
        Self::new(&settings.exchange.ws_url, settings.connection.clone())
    }

    pub async fn connect(&self) -> Result<(Connection, Inbound), ApiError> {
        tracing::info!(url = %self.url, "Connecting to WebSocket...");
        let (stream, _) = connect_async(self.url.as_str()).await?;
        tracing::info!("WebSocket connection established.");

        let (sink, source) = stream.split();
        Ok(Connection::spawn(sink, source, &self.settings))
    }
}

/// Handle to one live connection.
///
/// Owns the connection's subscription registry and auth status; the reader
/// task updates both as acks arrive.
pub struct Connection {
    outbound: mpsc::Sender<Message>,
    registry: Arc<SubscriptionRegistry>,
    auth: Arc<AuthTracker>,
    ready: watch::Receiver<Option<InfoEvent>>,
    auth_ack: watch::Receiver<Option<AuthEvent>>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    /// Starts the reader and writer tasks over an already-open socket.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn<Si, St>(sink: Si, source: St, settings: &ConnectionSettings) -> (Connection, Inbound)
    where
        Si: Sink<Message> + Unpin + Send + 'static,
        Si::Error: Display + Send,
        St: Stream<Item = Result<Message, WsError>> + Unpin + Send + 'static,
    {
        let (events_tx, events_rx) = mpsc::channel(settings.delivery_buffer);
        let (updates_tx, updates_rx) = mpsc::channel(settings.update_buffer);
        let (outbound_tx, outbound_rx) = mpsc::channel(settings.outbound_buffer);

        let registry = Arc::new(SubscriptionRegistry::new());
        let auth = Arc::new(AuthTracker::new());
        let router = EventRouter::new(Arc::clone(&registry), Arc::clone(&auth), events_tx);
        let ready = router.ready_signal();
        let auth_ack = router.auth_ack_signal();

        let reader = tokio::spawn(run_reader(source, router, updates_tx));
        let writer = tokio::spawn(run_writer(sink, outbound_rx));

        let connection = Connection {
            outbound: outbound_tx,
            registry,
            auth,
            ready,
            auth_ack,
            reader,
            writer,
        };
        let inbound = Inbound {
            events: events_rx,
            updates: updates_rx,
        };
        (connection, inbound)
    }

    /// Queues a request for the writer task.
    pub async fn send(&self, request: impl Into<Request>) -> Result<(), ApiError> {
        let request = request.into();
        let text = request.to_json()?;
        tracing::debug!(?request, "Sending request.");
        self.outbound
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| ApiError::ConnectionClosed)
    }

    /// Resolves once the server's `info` event has been routed.
    pub async fn wait_ready(&self) -> Result<InfoEvent, ApiError> {
        let mut ready = self.ready.clone();
        let info = ready
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ApiError::ConnectionClosed)?;
        info.clone().ok_or(ApiError::ConnectionClosed)
    }

    /// Sends a signed login and waits for the server's ack.
    ///
    /// One attempt, no retries. The returned status is also what
    /// [`Connection::auth_status`] reports until the next ack.
    pub async fn authenticate(&self, api_key: &str, api_secret: &str) -> Result<AuthStatus, ApiError> {
        let mut acks = self.auth_ack.clone();
        let _ = acks.borrow_and_update();

        self.send(AuthRequest::new(api_key, api_secret)).await?;
        acks.changed().await.map_err(|_| ApiError::ConnectionClosed)?;

        let status = self.auth.status();
        if status != AuthStatus::Authenticated {
            let reason = acks.borrow().as_ref().and_then(|ack| ack.message.clone());
            tracing::warn!(?status, reason = reason.as_deref().unwrap_or(""), "Authentication was not accepted.");
        }
        Ok(status)
    }

    /// Registers the request's token as pending, then sends it.
    ///
    /// Returns the token; the subscription becomes active when the server's
    /// `subscribed` ack is routed. If the request cannot be queued the
    /// pending entry is withdrawn again.
    pub async fn subscribe(&self, request: SubscribeRequest) -> Result<String, ApiError> {
        let token = request.token().to_string();
        self.registry.register(token.as_str())?;

        if let Err(e) = self.send(request).await {
            self.registry.unregister(&token);
            return Err(e);
        }
        Ok(token)
    }

    /// Withdraws a subscribe request that has not been acknowledged yet.
    pub fn cancel(&self, token: &str) -> bool {
        self.registry.unregister(token)
    }

    pub async fn unsubscribe(&self, chan_id: i64) -> Result<(), ApiError> {
        self.send(UnsubscribeRequest { chan_id }).await
    }

    /// Unsubscribes the active channel bound to `token`.
    pub async fn unsubscribe_token(&self, token: &str) -> Result<(), ApiError> {
        let chan_id = self
            .registry
            .get(token)
            .and_then(|sub| sub.channel_id)
            .ok_or_else(|| RegistryError::NotFound(token.to_string()))?;
        self.unsubscribe(chan_id).await
    }

    pub async fn ping(&self, cid: i64) -> Result<(), ApiError> {
        self.send(PingRequest { cid }).await
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    pub fn auth_status(&self) -> AuthStatus {
        self.auth.status()
    }

    /// True once the reader task has stopped.
    pub fn is_closed(&self) -> bool {
        self.reader.is_finished()
    }

    /// Sends a close frame and waits for both tasks to finish.
    ///
    /// The reader finishes when the server completes the close handshake;
    /// bounding that wait is up to the caller.
    pub async fn close(self) {
        let Connection {
            outbound,
            reader,
            writer,
            ..
        } = self;
        let _ = outbound.send(Message::Close(None)).await;
        drop(outbound);
        let _ = writer.await;
        let _ = reader.await;
    }
}

async fn run_reader<St>(mut source: St, router: EventRouter, updates: mpsc::Sender<ChannelUpdate>)
where
    St: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(message) = source.next().await {
        let keep_reading = match message {
            Ok(Message::Text(text)) => dispatch_frame(text.as_bytes(), &router, &updates).await,
            Ok(Message::Binary(data)) => dispatch_frame(&data, &router, &updates).await,
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => true,
            Ok(Message::Close(frame)) => {
                tracing::info!(?frame, "WebSocket connection closed.");
                false
            }
            Err(e) => {
                tracing::error!(error = %e, "WebSocket read error.");
                false
            }
        };
        if !keep_reading {
            break;
        }
    }
    tracing::debug!("Reader task finished.");
}

/// Handles one frame. Returns `false` when the reader must stop.
async fn dispatch_frame(frame: &[u8], router: &EventRouter, updates: &mpsc::Sender<ChannelUpdate>) -> bool {
    if is_channel_data(frame) {
        match parse_channel_update(frame, router.registry()) {
            Ok(Some(update)) => {
                if updates.send(update).await.is_err() {
                    tracing::trace!("Update receiver dropped; discarding channel data.");
                }
            }
            Ok(None) => tracing::trace!("Heartbeat."),
            Err(e) => tracing::warn!(error = %e, "Discarding malformed channel data frame."),
        }
        return true;
    }

    match router.route_frame(frame).await {
        Ok(kind) => {
            tracing::debug!(%kind, "Event routed.");
            true
        }
        Err(e) if e.is_fatal() => {
            tracing::error!(error = %e, "Event consumer is gone; stopping reader.");
            false
        }
        Err(e) => {
            tracing::warn!(error = %e, "Dropped inbound frame.");
            true
        }
    }
}

fn is_channel_data(frame: &[u8]) -> bool {
    frame.iter().find(|b| !b.is_ascii_whitespace()) == Some(&b'[')
}

/// Splits `[chanId, ...]` into a [`ChannelUpdate`]. Heartbeats yield `None`.
fn parse_channel_update(
    frame: &[u8],
    registry: &SubscriptionRegistry,
) -> Result<Option<ChannelUpdate>, ApiError> {
    let mut items: Vec<Value> =
        serde_json::from_slice(frame).map_err(|e| ApiError::Deserialization(e.to_string()))?;
    let chan_id = items
        .first()
        .and_then(Value::as_i64)
        .ok_or_else(|| ApiError::Deserialization("channel data without a channel id".to_string()))?;

    if items.get(1).and_then(Value::as_str) == Some("hb") {
        return Ok(None);
    }

    let data = items.split_off(1);
    Ok(Some(ChannelUpdate {
        chan_id,
        token: registry.token_for_channel(chan_id),
        data,
    }))
}

async fn run_writer<Si>(mut sink: Si, mut outbound: mpsc::Receiver<Message>)
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    while let Some(message) = outbound.recv().await {
        if let Err(e) = sink.send(message).await {
            tracing::error!(error = %e, "WebSocket write error.");
            break;
        }
    }
    let _ = sink.close().await;
    tracing::debug!("Writer task finished.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SubscriptionState;
    use assert_matches::assert_matches;
    use events::{Event, EventKind};
    use futures::channel::mpsc::{UnboundedReceiver, UnboundedSender, unbounded};
    use serde_json::json;

    struct FakeServer {
        to_client: UnboundedSender<Result<Message, WsError>>,
        from_client: UnboundedReceiver<Message>,
    }

    impl FakeServer {
        fn push(&self, frame: &str) {
            self.to_client.unbounded_send(Ok(Message::text(frame.to_string()))).unwrap();
        }

        async fn next_request(&mut self) -> Value {
            match self.from_client.next().await.unwrap() {
                Message::Text(text) => serde_json::from_str(text.as_str()).unwrap(),
                other => panic!("unexpected outbound message: {:?}", other),
            }
        }
    }

    fn connect() -> (Connection, Inbound, FakeServer) {
        let (client_sink, from_client) = unbounded::<Message>();
        let (to_client, client_source) = unbounded::<Result<Message, WsError>>();
        let settings = ConnectionSettings {
            delivery_buffer: 16,
            update_buffer: 16,
            outbound_buffer: 16,
        };
        let (connection, inbound) = Connection::spawn(client_sink, client_source, &settings);
        (connection, inbound, FakeServer { to_client, from_client })
    }

    #[test]
    fn classifies_channel_data_by_leading_bracket() {
        assert!(is_channel_data(b"[5,\"hb\"]"));
        assert!(is_channel_data(b"  \n[5,[1,2]]"));
        assert!(!is_channel_data(b"{\"event\":\"info\"}"));
        assert!(!is_channel_data(b""));
    }

    #[test]
    fn parses_channel_updates_and_heartbeats() {
        let registry = SubscriptionRegistry::new();
        registry.register("t1").unwrap();
        registry.activate("t1", 5).unwrap();

        assert_eq!(parse_channel_update(br#"[5,"hb"]"#, &registry).unwrap(), None);

        let update = parse_channel_update(br#"[5,[10645,73.9]]"#, &registry).unwrap().unwrap();
        assert_eq!(update.chan_id, 5);
        assert_eq!(update.token.as_deref(), Some("t1"));
        assert_eq!(update.data, vec![json!([10645, 73.9])]);

        let update = parse_channel_update(br#"[9,"te",[1,2]]"#, &registry).unwrap().unwrap();
        assert_eq!(update.token, None);
        assert_eq!(update.data, vec![json!("te"), json!([1, 2])]);

        assert!(parse_channel_update(br#"["x"]"#, &registry).is_err());
    }

    #[tokio::test]
    async fn ready_subscribe_and_data_flow() {
        let (connection, mut inbound, mut server) = connect();

        server.push(r#"{"event":"info","version":2,"platform":{"status":1}}"#);
        let info = connection.wait_ready().await.unwrap();
        assert_eq!(info.version, 2.0);

        let token = connection
            .subscribe(SubscribeRequest::ticker("tBTCUSD").with_token("t1"))
            .await
            .unwrap();
        assert_eq!(token, "t1");
        assert_eq!(connection.registry().get("t1").unwrap().state, SubscriptionState::Pending);
        assert_eq!(
            server.next_request().await,
            json!({"event": "subscribe", "channel": "ticker", "symbol": "tBTCUSD", "subId": "t1"})
        );

        server.push(r#"{"event":"subscribed","subId":"t1","channel":"ticker","chanId":5,"symbol":"tBTCUSD","pair":"BTCUSD"}"#);
        server.push(r#"[5,"hb"]"#);
        server.push(r#"[5,[10645,73.9,10646,17.3,-91,-0.0085,10646,11653.4,10911,10446]]"#);

        assert_eq!(inbound.events.recv().await.unwrap().kind(), EventKind::Info);
        assert_eq!(inbound.events.recv().await.unwrap().kind(), EventKind::Subscribed);
        let update = inbound.updates.recv().await.unwrap();
        assert_eq!(update.chan_id, 5);
        assert_eq!(update.token.as_deref(), Some("t1"));
        assert_eq!(connection.registry().active_count(), 1);

        connection.unsubscribe_token("t1").await.unwrap();
        assert_eq!(server.next_request().await, json!({"event": "unsubscribe", "chanId": 5}));
        server.push(r#"{"event":"unsubscribed","status":"OK","chanId":5}"#);
        assert_eq!(inbound.events.recv().await.unwrap().kind(), EventKind::Unsubscribed);
        assert!(connection.registry().is_empty());
    }

    #[tokio::test]
    async fn bad_frames_do_not_stop_the_reader() {
        let (connection, mut inbound, server) = connect();

        server.push(r#"{"event":"bogus"}"#);
        server.push(r#"{"event":"subscribed","subId":"nobody","channel":"ticker","chanId":1,"symbol":"tX","pair":"X"}"#);
        server.push(r#"{"event":"pong","cid":"x","ts":1}"#);
        server.push(r#"{"event":"pong","cid":7,"ts":1}"#);

        let envelope = inbound.events.recv().await.unwrap();
        assert_matches!(envelope.into_payload(), Event::Pong(p) if p.cid == 7);
        assert!(!connection.is_closed());
    }

    #[tokio::test]
    async fn authenticate_waits_for_ack() {
        let (connection, mut inbound, mut server) = connect();

        let (status, ()) = tokio::join!(connection.authenticate("key", "secret"), async {
            let request = server.next_request().await;
            assert_eq!(request["event"], "auth");
            assert_eq!(request["apiKey"], "key");
            server.push(r#"{"event":"auth","status":"OK","chanId":0,"userId":1,"subId":"a"}"#);
        });
        assert_eq!(status.unwrap(), AuthStatus::Authenticated);
        assert_eq!(connection.auth_status(), AuthStatus::Authenticated);
        assert_eq!(inbound.events.recv().await.unwrap().kind(), EventKind::Auth);

        let (status, ()) = tokio::join!(connection.authenticate("key", "wrong"), async {
            server.next_request().await;
            server.push(r#"{"event":"auth","status":"FAILED","subId":"a","msg":"apikey: digest invalid"}"#);
        });
        assert_eq!(status.unwrap(), AuthStatus::Rejected);
    }

    #[tokio::test]
    async fn ping_is_answered_with_pong_event() {
        let (connection, mut inbound, mut server) = connect();
        connection.ping(1234).await.unwrap();
        assert_eq!(server.next_request().await, json!({"event": "ping", "cid": 1234}));

        server.push(r#"{"event":"pong","cid":1234,"ts":1511545528111}"#);
        assert_matches!(inbound.events.recv().await.unwrap().into_payload(), Event::Pong(p) if p.cid == 1234);
    }

    #[tokio::test]
    async fn server_close_ends_the_stream() {
        let (connection, mut inbound, server) = connect();
        server.push(r#"{"event":"conf","flags":0}"#);
        server.to_client.unbounded_send(Ok(Message::Close(None))).unwrap();

        assert_eq!(inbound.events.recv().await.unwrap().kind(), EventKind::Conf);
        assert!(inbound.events.recv().await.is_none());
        assert!(inbound.updates.recv().await.is_none());
        assert_matches!(connection.wait_ready().await, Err(ApiError::ConnectionClosed));
    }

    #[tokio::test]
    async fn duplicate_token_is_rejected_before_sending() {
        let (connection, _inbound, mut server) = connect();
        connection.subscribe(SubscribeRequest::trades("tBTCUSD").with_token("dup")).await.unwrap();
        server.next_request().await;

        let err = connection
            .subscribe(SubscribeRequest::trades("tETHUSD").with_token("dup"))
            .await
            .unwrap_err();
        assert_matches!(err, ApiError::Registry(RegistryError::AlreadyRegistered(_)));
        assert!(connection.cancel("dup"));
        assert!(connection.registry().is_empty());
    }

    #[tokio::test]
    async fn ping_fails_once_the_writer_is_gone_and_close_still_completes() {
        let (connection, _inbound, server) = connect();
        let FakeServer { to_client, from_client } = server;
        drop(from_client);

        // The first send may still be queued before the writer notices the dead sink.
        let failed = tokio::time::timeout(std::time::Duration::from_secs(1), async {
            let mut cid = 1;
            loop {
                if let Err(e) = connection.ping(cid).await {
                    break e;
                }
                cid += 1;
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert_matches!(failed, ApiError::ConnectionClosed);

        drop(to_client);
        tokio::time::timeout(std::time::Duration::from_secs(1), connection.close())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn close_sends_close_frame() {
        let (connection, _inbound, mut server) = connect();
        let FakeServer { to_client, from_client } = &mut server;
        let closing = connection.close();
        let observe = async {
            let message = from_client.next().await.unwrap();
            assert_matches!(message, Message::Close(None));
            to_client.unbounded_send(Ok(Message::Close(None))).unwrap();
        };
        let ((), ()) = tokio::join!(closing, observe);
    }
}
