/// Wire `type` tags (magic strings layer)
pub mod message_types {
    pub const AUTHENTICATE: &str = "authenticate";
    pub const AUTHENTICATED: &str = "authenticated";
    pub const WELCOME: &str = "welcome";
    pub const PING: &str = "ping";
    pub const PONG: &str = "pong";
    pub const NOTIFICATION: &str = "notification";
    pub const ORDER_STATUS_UPDATE: &str = "order_status_update";
    pub const DRIVER_LOCATION_UPDATE: &str = "driver_location_update";
    pub const SUBSCRIBE_ORDER_UPDATES: &str = "subscribe_order_updates";
}

/// Path of the realtime endpoint on the page's host
pub const REALTIME_PATH: &str = "/ws";

/// Default heartbeat interval (milliseconds)
pub const HEARTBEAT_INTERVAL: u64 = 30_000;

/// Base delay before an automatic reconnect (milliseconds)
pub const RECONNECT_BASE_DELAY: u64 = 5_000;

/// Backoff exponent applied to the base delay. Fixed at zero, so the delay never grows.
pub const RECONNECT_BACKOFF_EXPONENT: u32 = 0;

/// Pause between `disconnect()` and `connect()` on a manual reconnect (milliseconds)
pub const MANUAL_RECONNECT_DELAY: u64 = 1_000;

/// Capacity of the typed event bus
pub const EVENT_BUS_CAPACITY: usize = 256;

/// WebSocket close codes
pub const WS_CLOSE_NORMAL: u16 = 1000;
pub const WS_CLOSE_NO_STATUS: u16 = 1005;
pub const WS_CLOSE_ABNORMAL: u16 = 1006;
pub const WS_CLOSE_AUTH_FAILED: u16 = 4000;
pub const WS_CLOSE_AUTH_REQUIRED: u16 = 4001;

/// Close reason sent when no usable token exists at open time
pub const AUTH_REQUIRED_REASON: &str = "Authentication required";

/// User-facing error after an authentication failure
pub const AUTH_FAILED_MESSAGE: &str = "Authentication required - please log in again";

/// User-facing error for transport failures
pub const CONNECTION_FAILED_MESSAGE: &str = "Connection error";
