use std::sync::Arc;
use std::time::Duration;
use storefront_realtime_rs::{
    FallbackTokenProvider, RealtimeClientBuilder, RealtimeEvent, SessionServiceTokenProvider,
    StoredTokenProvider,
};
use tracing_subscriber::EnvFilter;

/// Follow one order's status and driver updates against a running storefront
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing, RUST_LOG overrides the default filter
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("storefront_realtime_rs=debug")),
        )
        .init();

    let order_id = std::env::var("REALTIME_ORDER_ID").unwrap_or_else(|_| "ord-1001".to_string());

    // Token from REALTIME_TOKEN, else from the session service
    let stored = Arc::new(StoredTokenProvider::new(std::env::var("REALTIME_TOKEN").ok()));
    let builder = RealtimeClientBuilder::from_env()?;
    let builder = match std::env::var("REALTIME_SESSION_URL") {
        Ok(session_url) => builder.token_provider(Arc::new(FallbackTokenProvider::new(
            stored,
            Arc::new(SessionServiceTokenProvider::new(session_url)),
        ))),
        Err(_) => builder.token_provider(stored),
    };
    let client = builder.build();

    println!("📡 Connecting to {}\n", client.origin());

    let mut events = client.subscribe();
    let mut watcher = client.watch_state().await;

    client.connect().await?;
    if let Some(error) = client.error().await {
        println!("⚠️  {}", error);
    }

    if client.subscribe_to_order_updates(order_id.as_str()).await {
        println!("✅ Subscribed to updates for {}\n", order_id);
    }

    let deadline = tokio::time::sleep(Duration::from_secs(120));
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(RealtimeEvent::OrderStatusUpdate(update)) => {
                    println!(
                        "[{}] 📦 Order update: {}",
                        chrono::Local::now().format("%H:%M:%S%.3f"),
                        update
                    );
                }
                Ok(RealtimeEvent::DriverLocationUpdate(location)) => {
                    println!(
                        "[{}] 🚚 Driver at: {}",
                        chrono::Local::now().format("%H:%M:%S%.3f"),
                        location
                    );
                }
                Ok(RealtimeEvent::Notification(notification)) => {
                    println!("🔔 {} ({:?})", notification.display_title(), notification.priority);
                }
                Err(e) => {
                    println!("Event stream interrupted: {}", e);
                }
            },
            changed = watcher.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = *watcher.borrow();
                println!("🔌 {:?} / {:?}", snapshot.state, snapshot.auth);
            }
            _ = &mut deadline => break,
        }
    }

    client.disconnect().await;
    println!("\n👋 Disconnected");
    Ok(())
}
