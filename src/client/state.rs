use super::connection::ConnectionState;
use crate::infrastructure::{ReconnectTimer, TaskManager};
use tokio::sync::watch;

/// Progress of the authentication handshake on the current connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthState {
    #[default]
    Unauthenticated,
    /// `authenticate` is being prepared or awaiting the server's answer
    Authenticating,
    Authenticated,
    /// No usable token, or the server refused it. Terminal until the user logs in again.
    Failed,
}

/// What consumers render: transport liveness plus authentication progress
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionSnapshot {
    pub state: ConnectionState,
    pub auth: AuthState,
}

/// Consolidated mutable state for RealtimeClient
/// Using a single struct reduces lock contention
pub struct ClientState {
    /// Server-assigned id from the `welcome` message
    pub connection_id: Option<String>,

    pub auth: AuthState,

    /// When the last `pong` arrived (ms since epoch)
    pub last_pong_at: Option<i64>,

    /// Text consumers may show, e.g. after an authentication failure
    pub last_error: Option<String>,

    /// Reader, heartbeat and reconnect tasks
    pub tasks: TaskManager,

    pub reconnect_timer: ReconnectTimer,

    /// Whether the disconnect was manual (prevents auto-reconnect)
    pub was_manual_disconnect: bool,

    /// Bumped by every `disconnect()`; a connect attempt started under an older value
    /// must abandon whatever it opened
    pub connect_epoch: u64,

    /// Sender for state change notifications
    pub state_change_tx: watch::Sender<ConnectionSnapshot>,
}

impl ClientState {
    pub fn new(reconnect_timer: ReconnectTimer) -> Self {
        let (state_change_tx, _) = watch::channel(ConnectionSnapshot::default());
        Self {
            connection_id: None,
            auth: AuthState::Unauthenticated,
            last_pong_at: None,
            last_error: None,
            tasks: TaskManager::new(),
            reconnect_timer,
            was_manual_disconnect: false,
            connect_epoch: 0,
            state_change_tx,
        }
    }

    /// Stops every background task: reader, heartbeat and any pending reconnect.
    /// Connect attempts still in flight see the new epoch and give up.
    pub fn teardown(&mut self) {
        self.connect_epoch = self.connect_epoch.wrapping_add(1);
        self.tasks.abort_all();
    }

    /// Notify state change watchers
    pub fn notify_state_change(&self, state: ConnectionState) {
        let snapshot = ConnectionSnapshot {
            state,
            auth: self.auth,
        };
        let previous = self.state_change_tx.send_replace(snapshot);
        if previous != snapshot {
            tracing::debug!("Connection state changed: {:?} -> {:?}", previous, snapshot);
        }
    }
}

impl Default for ClientState {
    fn default() -> Self {
        Self::new(ReconnectTimer::default())
    }
}
