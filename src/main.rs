use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use swarmlink_core::{BridgeConfig, MonitorEvent};
use swarmlink_engine::{coordinator, probe, relay, RelayConfig};
use swarmlink_telemetry::TelemetryConfig;

/// Bridge between an externally-running agent platform and its
/// dashboard/relay clients. Every flag overrides the matching
/// environment variable (MONITOR_PORT, PUBLIC_HOST, QUERY_HOST, ...).
#[derive(Parser, Debug)]
#[command(name = "swarmlink", version)]
struct Cli {
    /// HTTP/WebSocket port for the dashboard and relay surface
    #[arg(long)]
    port: Option<u16>,
    /// Hostname of the platform's main container
    #[arg(long)]
    main_host: Option<String>,
    /// Platform RMI port (reported, not probed)
    #[arg(long)]
    rmi_port: Option<u16>,
    /// Platform HTTP transport port (liveness probe target)
    #[arg(long)]
    platform_http_port: Option<u16>,
    /// Downstream host for fact submissions
    #[arg(long)]
    fact_host: Option<String>,
    /// Downstream port for fact submissions
    #[arg(long)]
    fact_port: Option<u16>,
    /// Downstream host for query submissions
    #[arg(long)]
    query_host: Option<String>,
    /// Downstream port for query submissions
    #[arg(long)]
    query_port: Option<u16>,
    /// Port of the standing answer listener
    #[arg(long)]
    answer_port: Option<u16>,
    /// Answer deadline in milliseconds
    #[arg(long)]
    result_timeout_ms: Option<u64>,
    /// Agent eviction TTL in milliseconds
    #[arg(long)]
    stale_ttl_ms: Option<u64>,
    /// Liveness probe cadence in milliseconds
    #[arg(long)]
    probe_interval_ms: Option<u64>,
    /// GC sweep cadence in milliseconds
    #[arg(long)]
    sweep_interval_ms: Option<u64>,
    /// Emit JSON log lines
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    fn apply(self, mut config: BridgeConfig) -> BridgeConfig {
        if let Some(port) = self.port {
            config.http_port = port;
        }
        if let Some(host) = self.main_host {
            config.main_host = host;
        }
        if let Some(port) = self.rmi_port {
            config.rmi_port = port;
        }
        if let Some(port) = self.platform_http_port {
            config.platform_http_port = port;
        }
        if let Some(host) = self.fact_host {
            config.fact_host = host;
        }
        if let Some(port) = self.fact_port {
            config.fact_port = port;
        }
        if let Some(host) = self.query_host {
            config.query_host = host;
        }
        if let Some(port) = self.query_port {
            config.query_port = port;
        }
        if let Some(port) = self.answer_port {
            config.answer_port = port;
        }
        if let Some(ms) = self.result_timeout_ms {
            config.answer_deadline = Duration::from_millis(ms);
        }
        if let Some(ms) = self.stale_ttl_ms {
            config.gc_ttl = Duration::from_millis(ms);
        }
        if let Some(ms) = self.probe_interval_ms {
            config.probe_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.sweep_interval_ms {
            config.sweep_interval = Duration::from_millis(ms);
        }
        config
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let json_logs = cli.json_logs;
    swarmlink_telemetry::init_telemetry(TelemetryConfig {
        json_output: json_logs,
        ..TelemetryConfig::default()
    });

    let config = cli.apply(BridgeConfig::from_env());
    tracing::info!(
        main_host = %config.main_host,
        rmi_port = config.rmi_port,
        probe_port = config.platform_http_port,
        "Starting swarmlink bridge"
    );

    let cancel = CancellationToken::new();
    let (events, _) = broadcast::channel::<MonitorEvent>(1024);

    let (coordinator, _coordinator_task) =
        coordinator::spawn(&config, events.clone(), cancel.clone());

    let _probe_task = probe::spawn_probe_task(
        coordinator.clone(),
        config.main_host.clone(),
        config.platform_http_port,
        config.probe_interval,
        config.probe_timeout,
        cancel.clone(),
    );

    let (relay, _relay_task) = relay::spawn(RelayConfig::from_bridge(&config), cancel.clone());
    let (answer_port, _answer_task) =
        relay::spawn_answer_listener(config.answer_port, relay.clone(), cancel.clone())
            .await
            .context("cannot bind the answer listener")?;
    tracing::info!(port = answer_port, "Listening for platform answers");

    let server = swarmlink_server::start(
        swarmlink_server::ServerConfig {
            port: config.http_port,
            ..swarmlink_server::ServerConfig::default()
        },
        coordinator,
        relay,
        events,
        cancel.clone(),
    )
    .await
    .context("cannot bind the HTTP port")?;
    tracing::info!(port = server.port, "Bridge ready");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl+c")?;

    tracing::info!("Shutting down");
    cancel.cancel();
    Ok(())
}
