// WebSocket module - transport abstraction and the tokio-tungstenite implementation
pub mod factory;
#[cfg(test)]
pub(crate) mod mock;

pub use factory::{
    CloseInfo, Frame, FrameSink, FrameStream, Transport, TransportFactory, WebSocketFactory,
};
