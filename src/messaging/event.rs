use crate::types::constants::message_types;
use serde::{Deserialize, Serialize};

/// Type-safe message tags carried in the `type` field
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MessageType {
    /// Client → server login handshake
    Authenticate,

    /// Server acknowledged the handshake
    Authenticated,

    /// Server greeting carrying the connection id
    Welcome,

    /// Heartbeat request
    Ping,

    /// Heartbeat acknowledgment
    Pong,

    /// User-facing notification
    Notification,

    /// Order moved to a new status
    OrderStatusUpdate,

    /// Courier position changed
    DriverLocationUpdate,

    /// Ask the server for updates about one order
    SubscribeOrderUpdates,

    /// Any tag this client does not understand
    Other(String),
}

impl MessageType {
    /// Parse a wire tag into a MessageType
    pub fn from_str(s: &str) -> Self {
        match s {
            message_types::AUTHENTICATE => Self::Authenticate,
            message_types::AUTHENTICATED => Self::Authenticated,
            message_types::WELCOME => Self::Welcome,
            message_types::PING => Self::Ping,
            message_types::PONG => Self::Pong,
            message_types::NOTIFICATION => Self::Notification,
            message_types::ORDER_STATUS_UPDATE => Self::OrderStatusUpdate,
            message_types::DRIVER_LOCATION_UPDATE => Self::DriverLocationUpdate,
            message_types::SUBSCRIBE_ORDER_UPDATES => Self::SubscribeOrderUpdates,
            _ => Self::Other(s.to_string()),
        }
    }

    /// Convert the tag to its wire representation
    pub fn as_str(&self) -> &str {
        match self {
            Self::Authenticate => message_types::AUTHENTICATE,
            Self::Authenticated => message_types::AUTHENTICATED,
            Self::Welcome => message_types::WELCOME,
            Self::Ping => message_types::PING,
            Self::Pong => message_types::PONG,
            Self::Notification => message_types::NOTIFICATION,
            Self::OrderStatusUpdate => message_types::ORDER_STATUS_UPDATE,
            Self::DriverLocationUpdate => message_types::DRIVER_LOCATION_UPDATE,
            Self::SubscribeOrderUpdates => message_types::SUBSCRIBE_ORDER_UPDATES,
            Self::Other(s) => s,
        }
    }
}

impl From<&str> for MessageType {
    fn from(s: &str) -> Self {
        Self::from_str(s)
    }
}

impl From<String> for MessageType {
    fn from(s: String) -> Self {
        Self::from_str(&s)
    }
}

impl From<MessageType> for String {
    fn from(kind: MessageType) -> Self {
        match kind {
            MessageType::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl std::fmt::Display for MessageType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Notification urgency as sent by the server
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationPriority {
    Low,
    High,
    Urgent,
    /// Also used for priorities this client does not know
    #[default]
    #[serde(other)]
    Normal,
}

impl NotificationPriority {
    /// High and urgent notifications get an in-app alert
    pub fn is_alerting(&self) -> bool {
        matches!(self, Self::High | Self::Urgent)
    }
}

/// Payload of a `notification` message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default)]
    pub priority: NotificationPriority,
    /// Fields this client does not interpret (order ids, links, ...)
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NotificationPayload {
    /// Title shown to the user, falling back to a generic label
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Notification")
    }
}

/// Typed events re-broadcast to the hosting application
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// A notification arrived; cached notification lists are stale
    Notification(NotificationPayload),
    /// An order changed status
    OrderStatusUpdate(serde_json::Value),
    /// A driver reported a new position
    DriverLocationUpdate(serde_json::Value),
}
