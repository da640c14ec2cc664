pub mod config;
pub mod errors;
pub mod events;
pub mod state;

pub use config::BridgeConfig;
pub use errors::BridgeError;
pub use events::{DfAction, DfNotice, MonitorEvent};
pub use state::{AgentRecord, StatusView};

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
