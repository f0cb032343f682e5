// Messaging module - Message tags, typed payloads and inbound routing
pub mod event;
pub mod router;

pub use event::{MessageType, NotificationPayload, NotificationPriority, RealtimeEvent};
pub use router::MessageRouter;
