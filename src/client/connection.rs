use crate::types::{RealtimeError, error::Result, message::RealtimeMessage};
use crate::websocket::{CloseInfo, Frame, FrameSink};
use futures::SinkExt;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport; the idle state
    #[default]
    Closed,
    Connecting,
    Open,
    Closing,
}

/// Owns the single transport writer and the liveness state
pub struct ConnectionManager {
    ws_write: Mutex<Option<FrameSink>>,
    state: RwLock<ConnectionState>,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            ws_write: Mutex::new(None),
            state: RwLock::new(ConnectionState::Closed),
        }
    }

    /// Moves to `Connecting` unless a transport is already connecting or open.
    ///
    /// Returns whether the caller won the right to open a transport.
    pub async fn try_begin_connect(&self) -> bool {
        let mut state = self.state.write().await;
        match *state {
            ConnectionState::Connecting | ConnectionState::Open => false,
            ConnectionState::Closed | ConnectionState::Closing => {
                *state = ConnectionState::Connecting;
                true
            }
        }
    }

    /// Sets the transport write half (called after a successful open)
    pub async fn set_writer(&self, writer: FrameSink) {
        let mut ws = self.ws_write.lock().await;
        if ws.replace(writer).is_some() {
            tracing::warn!("Replaced a transport writer that was still set");
        }
    }

    /// Gets the current connection state
    pub async fn state(&self) -> ConnectionState {
        *self.state.read().await
    }

    /// Sets the connection state
    pub async fn set_state(&self, new_state: ConnectionState) {
        let mut state = self.state.write().await;
        *state = new_state;
    }

    /// Checks if currently connected
    pub async fn is_connected(&self) -> bool {
        *self.state.read().await == ConnectionState::Open
    }

    /// Serializes and writes one message
    pub async fn send_message(&self, msg: &RealtimeMessage) -> Result<()> {
        let json = serde_json::to_string(msg)?;

        let mut ws_guard = self.ws_write.lock().await;
        let ws = ws_guard.as_mut().ok_or(RealtimeError::NotConnected)?;
        ws.send(Frame::Text(json)).await
    }

    /// Sends a close frame with `code`/`reason` and drops the writer.
    ///
    /// The state ends up `Closed` even when the close handshake fails.
    pub async fn close(&self, code: u16, reason: &str) -> Result<()> {
        self.set_state(ConnectionState::Closing).await;

        let writer = self.ws_write.lock().await.take();
        let result = match writer {
            Some(ws) => Self::close_sink(ws, code, reason).await,
            None => Ok(()),
        };

        self.set_state(ConnectionState::Closed).await;
        result
    }

    /// Sends a close frame on `ws` and shuts it down
    pub async fn close_sink(mut ws: FrameSink, code: u16, reason: &str) -> Result<()> {
        let sent = ws.send(Frame::Close(Some(CloseInfo::new(code, reason)))).await;
        if let Err(e) = ws.close().await {
            tracing::debug!("Transport close after close frame failed: {}", e);
        }
        sent
    }

    /// Clears the writer (used once the peer has closed)
    pub async fn clear_writer(&self) {
        let mut ws = self.ws_write.lock().await;
        *ws = None;
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
