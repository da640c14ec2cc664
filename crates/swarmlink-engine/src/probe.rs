use std::time::Duration;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::coordinator::CoordinatorHandle;

/// Single reachability check against `host:port`: a raw connect attempt
/// under a timeout. No bytes are written or read — the platform's HTTP
/// transport logs malformed requests, so this probes TCP reachability
/// only.
pub async fn probe_once(host: &str, port: u16, timeout: Duration) -> bool {
    let addr = format!("{host}:{port}");
    matches!(
        tokio::time::timeout(timeout, TcpStream::connect(&addr)).await,
        Ok(Ok(_))
    )
}

/// Spawn the periodic liveness probe. Every outcome is reported to the
/// coordinator, which owns the edge-trigger (an event is published only
/// on an up/down transition).
pub fn spawn_probe_task(
    coordinator: CoordinatorHandle,
    host: String,
    port: u16,
    cadence: Duration,
    timeout: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cadence);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let alive = probe_once(&host, port, timeout).await;
                    tracing::trace!(host = %host, port = port, alive = alive, "Probe tick");
                    if !coordinator.report_probe(alive).await {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
    })
}
