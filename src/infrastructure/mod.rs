// Infrastructure module - Core background services and utilities
pub mod clock;
pub mod heartbeat;
pub mod http;
pub mod task_manager;
pub mod timer;

pub use clock::{Clock, SystemClock};
pub use heartbeat::HeartbeatManager;
pub use http::{SessionClient, extract_session_token, realtime_endpoint};
pub use task_manager::{TaskKind, TaskManager};
pub use timer::ReconnectTimer;
