use super::Clock;
use crate::client::ConnectionManager;
use crate::messaging::MessageType;
use crate::types::message::RealtimeMessage;
use crate::types::HEARTBEAT_INTERVAL;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::time;

pub struct HeartbeatManager {
    interval: Duration,
    connection: Weak<ConnectionManager>,
    clock: Arc<dyn Clock>,
}

impl HeartbeatManager {
    pub fn new(connection: Weak<ConnectionManager>, clock: Arc<dyn Clock>) -> Self {
        Self {
            interval: Duration::from_millis(HEARTBEAT_INTERVAL),
            connection,
            clock,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sends a `ping` every interval until the transport stops being open.
    ///
    /// The first ping goes out one full interval after the task starts.
    pub async fn run(self) {
        let start = time::Instant::now() + self.interval;
        let mut interval_timer = time::interval_at(start, self.interval);
        interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            interval_timer.tick().await;

            // Client dropped, exit heartbeat task
            let Some(connection) = self.connection.upgrade() else {
                break;
            };

            if !connection.is_connected().await {
                tracing::debug!("Transport no longer open, stopping heartbeat");
                break;
            }

            let ping =
                RealtimeMessage::new(MessageType::Ping).with_timestamp(self.clock.now_millis());

            match connection.send_message(&ping).await {
                Ok(_) => tracing::debug!("Sent heartbeat ping"),
                Err(e) => tracing::error!("[Heartbeat] Failed to send: {}", e),
            }
        }
    }
}
