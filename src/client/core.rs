use super::{
    AuthState, ClientState, ConnectionManager, ConnectionSnapshot, ConnectionState,
    RealtimeClientBuilder, RealtimeClientOptions,
};
use crate::infrastructure::{Clock, HeartbeatManager, TaskKind, realtime_endpoint};
use crate::messaging::{MessageRouter, MessageType, RealtimeEvent};
use crate::notify::NotificationSink;
use crate::session::{SessionUser, TokenProvider, is_valid_token};
use crate::types::{
    AUTH_FAILED_MESSAGE, AUTH_REQUIRED_REASON, CONNECTION_FAILED_MESSAGE, RealtimeMessage,
    Result, WS_CLOSE_ABNORMAL, WS_CLOSE_AUTH_FAILED, WS_CLOSE_AUTH_REQUIRED, WS_CLOSE_NO_STATUS,
    WS_CLOSE_NORMAL,
};
use crate::websocket::{Frame, FrameStream, Transport, TransportFactory};
use futures::stream::StreamExt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast, watch};

/// The realtime connection manager for one user session.
///
/// `RealtimeClient` owns the WebSocket transport to the storefront's realtime endpoint,
/// authenticates the session, keeps it alive with heartbeats, reconnects after transient
/// failures and re-broadcasts order, driver and notification pushes as typed
/// [`RealtimeEvent`]s.
///
/// Cloning is cheap; all clones drive the same connection.
///
/// # Example
///
/// ```no_run
/// use storefront_realtime_rs::{RealtimeClient, RealtimeClientOptions};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RealtimeClient::new(
///     "https://shop.example.com",
///     RealtimeClientOptions::default(),
/// )?;
///
/// client.connect().await?;
/// client.subscribe_to_order_updates("ord-1001").await;
/// // Use the client...
/// client.disconnect().await;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RealtimeClient {
    pub(crate) origin: String,
    pub(crate) options: RealtimeClientOptions,

    // Connection manager
    pub(crate) connection: Arc<ConnectionManager>,

    // Consolidated mutable state
    pub(crate) state: Arc<RwLock<ClientState>>,

    // Injected collaborators
    pub(crate) transport: Arc<dyn TransportFactory>,
    pub(crate) tokens: Arc<dyn TokenProvider>,
    pub(crate) notifications: Arc<dyn NotificationSink>,
    pub(crate) clock: Arc<dyn Clock>,

    // Typed event bus
    pub(crate) events: broadcast::Sender<RealtimeEvent>,
}

impl RealtimeClient {
    /// Creates a new RealtimeClient with the default collaborators.
    ///
    /// This initializes the client but does not establish a connection. You must call
    /// [`connect()`](Self::connect) to open the transport. Use [`RealtimeClient::builder`]
    /// to plug in a token provider, notification sink or custom transport.
    ///
    /// # Arguments
    ///
    /// * `origin` - Origin of the hosting page (e.g. `https://shop.example.com`); the
    ///   realtime URL is derived from its scheme and host
    /// * `options` - Configuration options
    ///
    /// # Errors
    ///
    /// Returns [`RealtimeError::Config`](crate::types::RealtimeError::Config) if the origin
    /// is empty or the path is not absolute.
    pub fn new(origin: impl Into<String>, options: RealtimeClientOptions) -> Result<Self> {
        RealtimeClientBuilder::new(origin, options).map(|builder| builder.build())
    }

    /// Starts a builder for a client with injected collaborators.
    pub fn builder(
        origin: impl Into<String>,
        options: RealtimeClientOptions,
    ) -> Result<RealtimeClientBuilder> {
        RealtimeClientBuilder::new(origin, options)
    }

    /// Set connection state and notify watchers
    async fn set_state(&self, new_state: ConnectionState) {
        self.connection.set_state(new_state).await;

        let state = self.state.read().await;
        state.notify_state_change(new_state);
    }

    /// Opens the realtime connection.
    ///
    /// If a transport is already connecting or open, this method returns immediately.
    /// Otherwise it opens a transport, asks for notification permission, authenticates the
    /// configured user and starts the heartbeat and the inbound reader.
    ///
    /// When a user is configured but no valid token is available, the transport is closed
    /// with code 4001 without sending `authenticate`, and [`error()`](Self::error) reports
    /// that a new login is required.
    ///
    /// Network failures do not surface here: they are logged, reflected in
    /// [`error()`](Self::error) and retried by the reconnect policy.
    ///
    /// A [`disconnect()`](Self::disconnect) while this call is still connecting wins: the
    /// transport opened by this call is closed again and nothing is started.
    ///
    /// # Errors
    ///
    /// Returns an error if the realtime URL cannot be derived from the page origin. No
    /// retry is scheduled in that case.
    pub async fn connect(&self) -> Result<()> {
        let epoch = {
            let mut state = self.state.write().await;
            state.was_manual_disconnect = false;
            state.connect_epoch
        };
        self.open(epoch).await
    }

    /// Boxed `open()` so the reconnect task can call it without a recursive future type
    fn open_boxed(&self, epoch: u64) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.open(epoch))
    }

    /// Whether no `disconnect()` happened since the attempt tagged `epoch` started
    async fn is_current(&self, epoch: u64) -> bool {
        self.state.read().await.connect_epoch == epoch
    }

    async fn open(&self, epoch: u64) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if state.connect_epoch != epoch {
                tracing::debug!("Connect attempt cancelled by disconnect()");
                return Ok(());
            }
            if !self.connection.try_begin_connect().await {
                tracing::debug!("Already connected or connecting, ignoring connect()");
                return Ok(());
            }
            state.auth = AuthState::Unauthenticated;
            state.connection_id = None;
            state.notify_state_change(ConnectionState::Connecting);
        }

        let url = match realtime_endpoint(&self.origin, &self.options.path) {
            Ok(url) => url,
            Err(e) => {
                tracing::error!("Cannot build realtime endpoint from {}: {}", self.origin, e);
                self.state.write().await.last_error = Some(CONNECTION_FAILED_MESSAGE.to_string());
                self.set_state(ConnectionState::Closed).await;
                return Err(e);
            }
        };

        tracing::info!("Connecting to {}", url);
        let Transport { sink, stream } = match self.transport.open(url.as_str()).await {
            Ok(transport) => transport,
            Err(e) => {
                if !self.is_current(epoch).await {
                    tracing::debug!("Connect failed after disconnect(): {}", e);
                    return Ok(());
                }
                tracing::error!("Realtime connection failed: {}", e);
                self.state.write().await.last_error = Some(CONNECTION_FAILED_MESSAGE.to_string());
                self.handle_close(WS_CLOSE_ABNORMAL, "").await;
                return Ok(());
            }
        };

        {
            let mut state = self.state.write().await;
            if state.connect_epoch != epoch {
                drop(state);
                tracing::info!("Disconnected while connecting, closing new transport");
                if let Err(e) =
                    ConnectionManager::close_sink(sink, WS_CLOSE_NORMAL, "Client disconnect").await
                {
                    tracing::debug!("Closing abandoned transport failed: {}", e);
                }
                return Ok(());
            }

            self.connection.set_writer(sink).await;
            self.connection.set_state(ConnectionState::Open).await;
            state.reconnect_timer.reset();
            state.last_error = None;
            state.notify_state_change(ConnectionState::Open);
        }
        self.notifications.request_permission();
        tracing::info!("Connected to realtime server");

        if let Some(user) = &self.options.user
            && !self.authenticate(user, epoch).await
        {
            return Ok(());
        }

        let router = MessageRouter::new(
            Arc::clone(&self.state),
            Arc::clone(&self.connection),
            self.events.clone(),
            Arc::clone(&self.notifications),
            Arc::clone(&self.clock),
        );
        let heartbeat =
            HeartbeatManager::new(Arc::downgrade(&self.connection), Arc::clone(&self.clock))
                .with_interval(self.options.heartbeat_interval());

        let reader = self.clone();
        let mut state = self.state.write().await;
        if state.connect_epoch != epoch {
            tracing::debug!("Disconnected before the reader started");
            return Ok(());
        }
        state.tasks.spawn(TaskKind::Reader, async move {
            reader.read_loop(stream, router).await;
        });
        state.tasks.spawn(TaskKind::Heartbeat, heartbeat.run());

        Ok(())
    }

    /// Sends `authenticate` for `user`, or closes the transport with 4001 when no valid
    /// token exists. Returns whether the connect attempt should go on.
    async fn authenticate(&self, user: &SessionUser, epoch: u64) -> bool {
        {
            let mut state = self.state.write().await;
            if state.connect_epoch != epoch {
                return false;
            }
            state.auth = AuthState::Authenticating;
            state.notify_state_change(ConnectionState::Open);
        }

        let token = self.tokens.token().await.filter(|token| is_valid_token(token));
        if !self.is_current(epoch).await {
            tracing::debug!("Disconnected while looking up the session token");
            return false;
        }

        let Some(token) = token else {
            tracing::warn!(
                "No valid session token for {} {}, closing realtime connection",
                user.user_type,
                user.id
            );
            if let Err(e) = self
                .connection
                .close(WS_CLOSE_AUTH_REQUIRED, AUTH_REQUIRED_REASON)
                .await
            {
                tracing::debug!("Closing unauthenticated transport failed: {}", e);
            }
            self.handle_close(WS_CLOSE_AUTH_REQUIRED, AUTH_REQUIRED_REASON)
                .await;
            return false;
        };

        let mut message = RealtimeMessage::new(MessageType::Authenticate);
        message.user_id = Some(user.id.clone());
        message.user_type = Some(user.user_type.as_str().to_string());
        message.token = Some(token);

        if self.send_message(message).await {
            tracing::info!("Sent authentication for {} {}", user.user_type, user.id);
        }
        true
    }

    async fn read_loop(&self, mut stream: FrameStream, router: MessageRouter) {
        tracing::info!("Starting read task");

        let (code, reason) = loop {
            match stream.next().await {
                Some(Ok(Frame::Text(text))) => {
                    tracing::debug!("Received text message: {}", text);
                    match serde_json::from_str::<RealtimeMessage>(&text) {
                        Ok(message) => router.route(message).await,
                        Err(e) => {
                            tracing::error!("Failed to parse message: {} - Raw: {}", e, text);
                        }
                    }
                }
                Some(Ok(Frame::Close(Some(frame)))) => {
                    tracing::info!(
                        "Server closed connection: code={}, reason='{}'",
                        frame.code,
                        frame.reason
                    );
                    break (frame.code, frame.reason);
                }
                Some(Ok(Frame::Close(None))) => {
                    tracing::warn!("Server closed connection without close frame");
                    break (WS_CLOSE_NO_STATUS, String::new());
                }
                Some(Err(e)) => {
                    tracing::error!("WebSocket read error: {}", e);
                    self.state.write().await.last_error =
                        Some(CONNECTION_FAILED_MESSAGE.to_string());
                    break (WS_CLOSE_ABNORMAL, String::new());
                }
                None => {
                    tracing::warn!("Transport stream ended");
                    break (WS_CLOSE_ABNORMAL, String::new());
                }
            }
        };

        self.handle_close(code, &reason).await;
        tracing::info!("Read task finished");
    }

    /// Applies the closure policy after the transport closed with `code`/`reason`.
    pub(crate) async fn handle_close(&self, code: u16, reason: &str) {
        self.connection.clear_writer().await;
        self.connection.set_state(ConnectionState::Closed).await;

        let mut state = self.state.write().await;
        state.tasks.abort(TaskKind::Heartbeat);
        // The reader may be the caller; let it finish on its own.
        state.tasks.detach(TaskKind::Reader);

        if code == WS_CLOSE_NORMAL {
            tracing::info!("Realtime connection closed normally");
            state.auth = AuthState::Unauthenticated;
            state.notify_state_change(ConnectionState::Closed);
            return;
        }

        if is_auth_failure(code, reason) {
            tracing::warn!(
                "Realtime authentication failed (code {}), not reconnecting",
                code
            );
            state.tasks.abort(TaskKind::Reconnect);
            state.auth = AuthState::Failed;
            state.last_error = Some(AUTH_FAILED_MESSAGE.to_string());
            state.notify_state_change(ConnectionState::Closed);
            return;
        }

        let delay = state.reconnect_timer.next_delay();
        tracing::info!(
            "Realtime connection lost (code {}), reconnecting in {:?}",
            code,
            delay
        );
        state.auth = AuthState::Unauthenticated;

        let client = self.clone();
        state.tasks.spawn(TaskKind::Reconnect, async move {
            tokio::time::sleep(delay).await;
            let epoch = {
                let mut state = client.state.write().await;
                state.tasks.detach(TaskKind::Reconnect);
                if state.was_manual_disconnect {
                    tracing::info!("Manual disconnect detected, will not attempt to reconnect");
                    return;
                }
                state.connect_epoch
            };

            tracing::info!("Attempting to reconnect...");
            if let Err(e) = client.open_boxed(epoch).await {
                tracing::error!("Reconnection attempt failed: {}", e);
            }
        });
        state.notify_state_change(ConnectionState::Closed);
    }

    /// Closes the connection and stops all background work.
    ///
    /// Cancels any pending reconnect, stops the heartbeat and the reader, closes the
    /// transport with the normal closure code (1000) and resets the session state. The
    /// client will not reconnect on its own afterwards. Safe to call repeatedly.
    ///
    /// To reconnect after a manual disconnect, call [`connect()`](Self::connect) again.
    pub async fn disconnect(&self) {
        {
            let mut state = self.state.write().await;
            state.was_manual_disconnect = true;
            state.teardown();
            state.connection_id = None;
            state.auth = AuthState::Unauthenticated;
            state.last_error = None;
        }

        tracing::info!("Disconnecting from realtime server");
        if let Err(e) = self
            .connection
            .close(WS_CLOSE_NORMAL, "Client disconnect")
            .await
        {
            tracing::debug!("Close handshake failed during disconnect: {}", e);
        }

        self.state
            .read()
            .await
            .notify_state_change(ConnectionState::Closed);
    }

    /// Disconnects, waits the manual reconnect delay and connects again.
    pub async fn reconnect(&self) -> Result<()> {
        self.disconnect().await;
        tokio::time::sleep(self.options.manual_reconnect_delay()).await;
        self.connect().await
    }

    /// Sends a message if the transport is open.
    ///
    /// Messages are never queued: when the transport is not open the message is dropped
    /// with a warning. Returns whether the message was written.
    pub async fn send_message(&self, message: RealtimeMessage) -> bool {
        if !self.connection.is_connected().await {
            tracing::warn!(
                "Realtime connection not open, dropping {} message",
                message.kind
            );
            return false;
        }

        match self.connection.send_message(&message).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to send {} message: {}", message.kind, e);
                false
            }
        }
    }

    /// Asks the server to push status changes for `order_id`.
    pub async fn subscribe_to_order_updates(&self, order_id: impl Into<String>) -> bool {
        let message =
            RealtimeMessage::new(MessageType::SubscribeOrderUpdates).with_order_id(order_id);
        self.send_message(message).await
    }

    /// Reports the driver's position, optionally tied to the order being delivered.
    pub async fn update_driver_location(
        &self,
        lat: f64,
        lng: f64,
        order_id: Option<String>,
    ) -> bool {
        let mut data = serde_json::json!({ "lat": lat, "lng": lng });
        if let Some(order_id) = order_id {
            data["orderId"] = serde_json::Value::String(order_id);
        }

        let message = RealtimeMessage::new(MessageType::DriverLocationUpdate)
            .with_data(data)
            .with_timestamp(self.clock.now_millis());
        self.send_message(message).await
    }

    /// Announces an order status change; `extra` fields are merged into the payload.
    pub async fn broadcast_order_status_update(
        &self,
        order_id: impl Into<String>,
        status: impl Into<String>,
        status_text: impl Into<String>,
        extra: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> bool {
        let mut data = serde_json::Map::new();
        data.insert("orderId".to_string(), order_id.into().into());
        data.insert("status".to_string(), status.into().into());
        data.insert("statusText".to_string(), status_text.into().into());
        if let Some(extra) = extra {
            data.extend(extra);
        }

        let message = RealtimeMessage::new(MessageType::OrderStatusUpdate)
            .with_data(serde_json::Value::Object(data))
            .with_timestamp(self.clock.now_millis());
        self.send_message(message).await
    }

    /// Receives typed events pushed by the server.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use storefront_realtime_rs::{RealtimeClient, RealtimeClientOptions, RealtimeEvent};
    ///
    /// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let client = RealtimeClient::new("https://shop.example.com", Default::default())?;
    /// let mut events = client.subscribe();
    /// client.connect().await?;
    ///
    /// tokio::spawn(async move {
    ///     while let Ok(event) = events.recv().await {
    ///         if let RealtimeEvent::OrderStatusUpdate(payload) = event {
    ///             println!("Order changed: {}", payload);
    ///         }
    ///     }
    /// });
    /// # Ok(())
    /// # }
    /// ```
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.events.subscribe()
    }

    /// Watches connection and authentication state changes.
    pub async fn watch_state(&self) -> watch::Receiver<ConnectionSnapshot> {
        self.state.read().await.state_change_tx.subscribe()
    }

    /// Checks whether the transport is currently open.
    pub async fn is_connected(&self) -> bool {
        self.connection.is_connected().await
    }

    pub async fn state(&self) -> ConnectionState {
        self.connection.state().await
    }

    pub async fn auth_state(&self) -> AuthState {
        self.state.read().await.auth
    }

    /// Server-assigned id from the last `welcome` message
    pub async fn connection_id(&self) -> Option<String> {
        self.state.read().await.connection_id.clone()
    }

    /// When the last heartbeat `pong` arrived (ms since epoch)
    pub async fn last_pong_at(&self) -> Option<i64> {
        self.state.read().await.last_pong_at
    }

    /// User-facing error text, if the connection is in an error state
    pub async fn error(&self) -> Option<String> {
        self.state.read().await.last_error.clone()
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }
}

/// Close codes 4000/4001, or a reason saying authentication is required
fn is_auth_failure(code: u16, reason: &str) -> bool {
    code == WS_CLOSE_AUTH_FAILED
        || code == WS_CLOSE_AUTH_REQUIRED
        || reason
            .to_ascii_lowercase()
            .contains(&AUTH_REQUIRED_REASON.to_ascii_lowercase())
}
