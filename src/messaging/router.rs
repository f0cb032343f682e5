use super::{MessageType, NotificationPayload, NotificationPriority, RealtimeEvent};
use crate::client::{AuthState, ClientState, ConnectionManager};
use crate::infrastructure::Clock;
use crate::notify::{NotificationPermission, NotificationSink};
use crate::types::message::RealtimeMessage;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

/// Routes incoming messages to appropriate handlers
pub struct MessageRouter {
    state: Arc<RwLock<ClientState>>,
    connection: Arc<ConnectionManager>,
    events: broadcast::Sender<RealtimeEvent>,
    notifications: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
}

impl MessageRouter {
    pub fn new(
        state: Arc<RwLock<ClientState>>,
        connection: Arc<ConnectionManager>,
        events: broadcast::Sender<RealtimeEvent>,
        notifications: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            state,
            connection,
            events,
            notifications,
            clock,
        }
    }

    /// Routes a message to the appropriate handler
    pub async fn route(&self, message: RealtimeMessage) {
        match &message.kind {
            MessageType::Notification => self.handle_notification(&message),
            MessageType::Welcome => self.handle_welcome(&message).await,
            MessageType::Authenticated => self.handle_authenticated().await,
            MessageType::Pong => self.handle_pong().await,
            MessageType::OrderStatusUpdate => {
                self.publish(RealtimeEvent::OrderStatusUpdate(message.payload()));
            }
            MessageType::DriverLocationUpdate => {
                self.publish(RealtimeEvent::DriverLocationUpdate(message.payload()));
            }
            other => {
                tracing::debug!("Ignoring message with unhandled type: {}", other);
            }
        }
    }

    fn handle_notification(&self, message: &RealtimeMessage) {
        let notification = notification_from(message);

        tracing::debug!(
            "Notification received: {} ({:?})",
            notification.display_title(),
            notification.priority
        );

        if notification.priority.is_alerting() {
            self.notifications.toast(&notification);
        }

        if self.notifications.permission() == NotificationPermission::Granted {
            let require_interaction = notification.priority == NotificationPriority::Urgent;
            self.notifications.native(&notification, require_interaction);
        }

        self.publish(RealtimeEvent::Notification(notification));
    }

    async fn handle_welcome(&self, message: &RealtimeMessage) {
        let connection_id = message.connection_id.clone().or_else(|| {
            message
                .data
                .as_ref()
                .and_then(|data| data.get("connectionId"))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        });

        match connection_id {
            Some(id) => {
                tracing::info!("Realtime connection established with id {}", id);
                self.state.write().await.connection_id = Some(id);
            }
            None => tracing::warn!("Welcome message carried no connection id"),
        }
    }

    async fn handle_authenticated(&self) {
        tracing::info!("Realtime session authenticated");
        let connection_state = self.connection.state().await;

        let mut state = self.state.write().await;
        state.auth = AuthState::Authenticated;
        state.last_error = None;
        state.notify_state_change(connection_state);
    }

    async fn handle_pong(&self) {
        let now = self.clock.now_millis();
        self.state.write().await.last_pong_at = Some(now);
        tracing::debug!("Received heartbeat pong at {}", now);
    }

    fn publish(&self, event: RealtimeEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("No subscribers for realtime event");
        }
    }
}

/// Builds the notification from `data`, falling back to the envelope's `message`
fn notification_from(message: &RealtimeMessage) -> NotificationPayload {
    let mut notification = match message.data.clone() {
        Some(data) => serde_json::from_value::<NotificationPayload>(data).unwrap_or_else(|e| {
            tracing::warn!("Malformed notification payload: {}", e);
            NotificationPayload::default()
        }),
        None => NotificationPayload::default(),
    };

    if notification.message.is_none() {
        notification.message = message.message.clone();
    }
    notification
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ConnectionState;
    use crate::infrastructure::clock::testing::ManualClock;
    use crate::notify::testing::RecordingSink;
    use serde_json::json;

    struct Fixture {
        router: MessageRouter,
        state: Arc<RwLock<ClientState>>,
        sink: Arc<RecordingSink>,
        events: broadcast::Receiver<RealtimeEvent>,
    }

    fn fixture(sink: RecordingSink) -> Fixture {
        let state = Arc::new(RwLock::new(ClientState::default()));
        let sink = Arc::new(sink);
        let (tx, events) = broadcast::channel(16);
        let router = MessageRouter::new(
            Arc::clone(&state),
            Arc::new(ConnectionManager::new()),
            tx,
            sink.clone(),
            Arc::new(ManualClock::at(42_000)),
        );
        Fixture {
            router,
            state,
            sink,
            events,
        }
    }

    fn parse(raw: serde_json::Value) -> RealtimeMessage {
        serde_json::from_value(raw).unwrap()
    }

    #[tokio::test]
    async fn test_welcome_records_connection_id() {
        let f = fixture(RecordingSink::default());
        f.router
            .route(parse(json!({ "type": "welcome", "connectionId": "abc123" })))
            .await;

        assert_eq!(f.state.read().await.connection_id.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_authenticated_sets_durable_flag() {
        let f = fixture(RecordingSink::default());
        let watcher = f.state.read().await.state_change_tx.subscribe();

        f.router.route(parse(json!({ "type": "authenticated" }))).await;

        assert_eq!(f.state.read().await.auth, AuthState::Authenticated);
        assert_eq!(watcher.borrow().auth, AuthState::Authenticated);
        assert_eq!(watcher.borrow().state, ConnectionState::Closed);
    }

    #[tokio::test]
    async fn test_pong_records_clock_time() {
        let f = fixture(RecordingSink::default());
        f.router.route(parse(json!({ "type": "pong" }))).await;

        assert_eq!(f.state.read().await.last_pong_at, Some(42_000));
    }

    #[tokio::test]
    async fn test_order_status_update_is_rebroadcast_once() {
        let mut f = fixture(RecordingSink::default());
        f.router
            .route(parse(json!({
                "type": "order_status_update",
                "data": { "orderId": "ord-9", "status": "printing" }
            })))
            .await;

        assert_eq!(
            f.events.try_recv().unwrap(),
            RealtimeEvent::OrderStatusUpdate(json!({ "orderId": "ord-9", "status": "printing" }))
        );
        assert!(f.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_driver_location_update_is_rebroadcast_once() {
        let mut f = fixture(RecordingSink::default());
        f.router
            .route(parse(json!({
                "type": "driver_location_update",
                "data": { "lat": 52.52, "lng": 13.40 }
            })))
            .await;

        assert_eq!(
            f.events.try_recv().unwrap(),
            RealtimeEvent::DriverLocationUpdate(json!({ "lat": 52.52, "lng": 13.40 }))
        );
        assert!(f.events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_normal_notification_only_invalidates() {
        let mut f = fixture(RecordingSink::default());
        f.router
            .route(parse(json!({
                "type": "notification",
                "data": { "title": "Proof ready", "priority": "normal" }
            })))
            .await;

        assert!(matches!(
            f.events.try_recv().unwrap(),
            RealtimeEvent::Notification(_)
        ));
        assert!(f.events.try_recv().is_err());
        assert_eq!(f.sink.toast_count(), 0);
        assert_eq!(f.sink.native_count(), 0);
    }

    #[tokio::test]
    async fn test_high_notification_raises_toast() {
        let f = fixture(RecordingSink::default());
        f.router
            .route(parse(json!({
                "type": "notification",
                "data": { "title": "Payment failed", "priority": "high" }
            })))
            .await;

        assert_eq!(f.sink.toast_count(), 1);
        assert_eq!(f.sink.native_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_priority_is_treated_as_normal() {
        let mut f = fixture(RecordingSink::default());
        f.router
            .route(parse(json!({
                "type": "notification",
                "data": { "title": "Coupon expires", "priority": "critical" }
            })))
            .await;

        match f.events.try_recv().unwrap() {
            RealtimeEvent::Notification(payload) => {
                assert_eq!(payload.priority, NotificationPriority::Normal);
            }
            other => panic!("expected notification, got {:?}", other),
        }
        assert_eq!(f.sink.toast_count(), 0);
    }

    #[tokio::test]
    async fn test_urgent_notification_with_permission_requires_interaction() {
        let f = fixture(RecordingSink::granted());
        f.router
            .route(parse(json!({
                "type": "notification",
                "message": "Driver is waiting outside",
                "data": { "priority": "urgent" }
            })))
            .await;

        assert_eq!(f.sink.toast_count(), 1);
        let natives = f.sink.natives.lock().unwrap();
        assert_eq!(natives.len(), 1);
        assert!(natives[0].1, "urgent notifications must require interaction");
        assert_eq!(
            natives[0].0.message.as_deref(),
            Some("Driver is waiting outside")
        );
    }

    #[tokio::test]
    async fn test_granted_normal_notification_does_not_require_interaction() {
        let f = fixture(RecordingSink::granted());
        f.router
            .route(parse(json!({
                "type": "notification",
                "data": { "title": "Order shipped" }
            })))
            .await;

        let natives = f.sink.natives.lock().unwrap();
        assert_eq!(natives.len(), 1);
        assert!(!natives[0].1);
    }

    #[tokio::test]
    async fn test_unknown_type_has_no_side_effects() {
        let mut f = fixture(RecordingSink::granted());
        f.router
            .route(parse(json!({ "type": "coupon_created", "data": { "code": "SAVE10" } })))
            .await;

        assert!(f.events.try_recv().is_err());
        assert_eq!(f.sink.toast_count(), 0);
        assert_eq!(f.sink.native_count(), 0);

        let state = f.state.read().await;
        assert_eq!(state.connection_id, None);
        assert_eq!(state.auth, AuthState::Unauthenticated);
        assert_eq!(state.last_pong_at, None);
    }
}
