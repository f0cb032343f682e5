//! # Storefront Realtime
//!
//! Client-side connection manager for the storefront's realtime order-update WebSocket.
//!
//! A [`RealtimeClient`] keeps one authenticated connection per user session, sends
//! heartbeats, reconnects after transient failures and re-broadcasts order status,
//! driver location and notification pushes as typed [`RealtimeEvent`]s.
//!
//! ## Example
//!
//! ```no_run
//! use storefront_realtime_rs::{
//!     RealtimeClient, RealtimeClientOptions, RealtimeEvent, SessionUser, StoredTokenProvider,
//!     UserType,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = RealtimeClient::builder(
//!         "https://shop.example.com",
//!         RealtimeClientOptions {
//!             user: Some(SessionUser::new("cus-42", UserType::Customer)),
//!             ..Default::default()
//!         },
//!     )?
//!     .token_provider(Arc::new(StoredTokenProvider::new(Some("session-token".to_string()))))
//!     .build();
//!
//!     let mut events = client.subscribe();
//!     client.connect().await?;
//!     client.subscribe_to_order_updates("ord-1001").await;
//!
//!     while let Ok(event) = events.recv().await {
//!         if let RealtimeEvent::OrderStatusUpdate(update) = event {
//!             println!("order update: {}", update);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod infrastructure;
pub mod messaging;
pub mod notify;
pub mod session;
pub mod types;
pub mod websocket;

pub use client::{
    AuthState, ConnectionSnapshot, ConnectionState, RealtimeClient, RealtimeClientBuilder,
    RealtimeClientOptions,
};
pub use messaging::{MessageType, NotificationPayload, NotificationPriority, RealtimeEvent};
pub use notify::{LogNotificationSink, NotificationPermission, NotificationSink};
pub use session::{
    FallbackTokenProvider, SessionServiceTokenProvider, SessionUser, StoredTokenProvider,
    TokenProvider, UserType,
};
pub use types::{RealtimeError, RealtimeMessage, Result};
pub use websocket::{TransportFactory, WebSocketFactory};
