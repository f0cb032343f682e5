use super::{ClientState, ConnectionManager, RealtimeClient};
use crate::infrastructure::{Clock, ReconnectTimer, SystemClock};
use crate::notify::{LogNotificationSink, NotificationSink};
use crate::session::{SessionUser, StoredTokenProvider, TokenProvider, UserType};
use crate::types::{
    EVENT_BUS_CAPACITY, HEARTBEAT_INTERVAL, MANUAL_RECONNECT_DELAY, REALTIME_PATH,
    RECONNECT_BASE_DELAY, RealtimeError, Result,
};
use crate::websocket::{TransportFactory, WebSocketFactory};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, broadcast};

#[derive(Debug, Clone)]
pub struct RealtimeClientOptions {
    /// Path of the realtime endpoint on the page's host
    pub path: String,
    /// User to authenticate as; `None` skips the handshake
    pub user: Option<SessionUser>,
    /// Heartbeat interval in milliseconds
    pub heartbeat_interval: Option<u64>,
    /// Delay before an automatic reconnect in milliseconds
    pub reconnect_delay: Option<u64>,
    /// Pause used by `reconnect()` in milliseconds
    pub manual_reconnect_delay: Option<u64>,
    /// Capacity of the typed event bus
    pub event_capacity: Option<usize>,
}

impl Default for RealtimeClientOptions {
    fn default() -> Self {
        Self {
            path: REALTIME_PATH.to_string(),
            user: None,
            heartbeat_interval: None,
            reconnect_delay: None,
            manual_reconnect_delay: None,
            event_capacity: None,
        }
    }
}

impl RealtimeClientOptions {
    /// Reads options from `REALTIME_*` environment variables, falling back to defaults
    pub fn from_env() -> Result<Self> {
        let mut options = Self::default();

        if let Ok(path) = std::env::var("REALTIME_PATH") {
            options.path = path;
        }
        options.heartbeat_interval = env_millis("REALTIME_HEARTBEAT_MS")?;
        options.reconnect_delay = env_millis("REALTIME_RECONNECT_MS")?;

        if let Ok(id) = std::env::var("REALTIME_USER_ID") {
            let user_type = match std::env::var("REALTIME_USER_TYPE") {
                Ok(raw) => raw.parse::<UserType>()?,
                Err(_) => UserType::Customer,
            };
            options.user = Some(SessionUser::new(id, user_type));
        }

        Ok(options)
    }

    pub(crate) fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval.unwrap_or(HEARTBEAT_INTERVAL))
    }

    pub(crate) fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay.unwrap_or(RECONNECT_BASE_DELAY))
    }

    pub(crate) fn manual_reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.manual_reconnect_delay.unwrap_or(MANUAL_RECONNECT_DELAY))
    }
}

fn env_millis(key: &str) -> Result<Option<u64>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| RealtimeError::Config(format!("{} must be milliseconds: {}", key, e))),
        Err(_) => Ok(None),
    }
}

/// Builder for RealtimeClient that wires in its collaborators
pub struct RealtimeClientBuilder {
    origin: String,
    options: RealtimeClientOptions,
    transport: Arc<dyn TransportFactory>,
    tokens: Arc<dyn TokenProvider>,
    notifications: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl RealtimeClientBuilder {
    /// Create a new builder for the page at `origin` (e.g. `https://shop.example.com`)
    pub fn new(origin: impl Into<String>, options: RealtimeClientOptions) -> Result<Self> {
        let origin = origin.into();

        if origin.trim().is_empty() {
            return Err(RealtimeError::Config("Page origin is required".to_string()));
        }
        if !options.path.starts_with('/') {
            return Err(RealtimeError::Config(format!(
                "Realtime path must start with '/': {}",
                options.path
            )));
        }

        Ok(Self {
            origin,
            options,
            transport: Arc::new(WebSocketFactory),
            tokens: Arc::new(StoredTokenProvider::default()),
            notifications: Arc::new(LogNotificationSink),
            clock: Arc::new(SystemClock),
        })
    }

    /// Builder configured from `REALTIME_ORIGIN` and the other `REALTIME_*` variables
    pub fn from_env() -> Result<Self> {
        let origin = std::env::var("REALTIME_ORIGIN")
            .map_err(|_| RealtimeError::Config("REALTIME_ORIGIN must be set".to_string()))?;
        Self::new(origin, RealtimeClientOptions::from_env()?)
    }

    pub fn transport(mut self, transport: Arc<dyn TransportFactory>) -> Self {
        self.transport = transport;
        self
    }

    pub fn token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = tokens;
        self
    }

    pub fn notification_sink(mut self, notifications: Arc<dyn NotificationSink>) -> Self {
        self.notifications = notifications;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build the client. Nothing is spawned until `connect()`.
    pub fn build(self) -> RealtimeClient {
        let reconnect_timer = ReconnectTimer::new(self.options.reconnect_delay());
        let capacity = self.options.event_capacity.unwrap_or(EVENT_BUS_CAPACITY).max(1);
        let (events, _) = broadcast::channel(capacity);

        RealtimeClient {
            origin: self.origin,
            options: self.options,
            connection: Arc::new(ConnectionManager::new()),
            state: Arc::new(RwLock::new(ClientState::new(reconnect_timer))),
            transport: self.transport,
            tokens: self.tokens,
            notifications: self.notifications,
            clock: self.clock,
            events,
        }
    }
}
