use std::sync::Arc;

use tokio::sync::broadcast;

use swarmlink_core::MonitorEvent;

use crate::client::ClientRegistry;

/// Drains the coordinator's event channel and fans serialized envelopes
/// out to every connected subscriber. Delivery is best-effort; ordering
/// follows the single publish order of the coordinator.
pub fn create_bridge(
    registry: Arc<ClientRegistry>,
    mut rx: broadcast::Receiver<MonitorEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => {
                    if let Some(json) = serialize_event(&event) {
                        registry.broadcast_all(&json);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event bridge lagged, dropped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!("Event bridge channel closed");
                    break;
                }
            }
        }
    })
}

/// Serialize a monitor event to its wire envelope.
pub fn serialize_event(event: &MonitorEvent) -> Option<String> {
    serde_json::to_string(event).ok()
}
