use std::time::Duration;

/// Runtime configuration for the bridge. Every field has an environment
/// override; the CLI in the root binary layers on top of `from_env`.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Port the HTTP/WebSocket surface listens on.
    pub http_port: u16,
    /// Reported hostname of this bridge.
    pub hostname: String,
    /// Hostname of the platform's main container.
    pub main_host: String,
    /// Platform RMI port (reported in status, not probed).
    pub rmi_port: u16,
    /// Platform HTTP transport port; target of the liveness probe.
    pub platform_http_port: u16,
    /// Downstream endpoint for fact submissions.
    pub fact_host: String,
    pub fact_port: u16,
    /// Downstream endpoint for query submissions.
    pub query_host: String,
    pub query_port: u16,
    /// Port of the standing listener for answers from the platform.
    pub answer_port: u16,
    /// How long a submitted fact/query waits for a correlated answer.
    pub answer_deadline: Duration,
    /// Silence interval after which an agent is evicted. Must stay well
    /// above the platform's keep-alive cadence (~10s), around 4-5x, or
    /// transient delay evicts live agents.
    pub gc_ttl: Duration,
    /// Cadence of the eviction sweep.
    pub sweep_interval: Duration,
    /// Cadence of the liveness probe; must stay below `gc_ttl`.
    pub probe_interval: Duration,
    /// Per-attempt probe connect timeout.
    pub probe_timeout: Duration,
    /// Connect timeout for outbound fact/query submissions.
    pub connect_timeout: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            http_port: 4100,
            hostname: default_hostname(),
            main_host: "jade-main".into(),
            rmi_port: 1099,
            platform_http_port: 7778,
            fact_host: "127.0.0.1".into(),
            fact_port: 5000,
            query_host: "127.0.0.1".into(),
            query_port: 5001,
            answer_port: 5002,
            answer_deadline: Duration::from_millis(10_000),
            gc_ttl: Duration::from_millis(45_000),
            sweep_interval: Duration::from_millis(5_000),
            probe_interval: Duration::from_millis(1_500),
            probe_timeout: Duration::from_millis(1_200),
            connect_timeout: Duration::from_millis(1_200),
        }
    }
}

impl BridgeConfig {
    /// Defaults overridden by environment variables where present.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            http_port: env_u16("MONITOR_PORT", d.http_port),
            hostname: env_str("MONITOR_HOSTNAME", d.hostname),
            main_host: env_str("PUBLIC_HOST", d.main_host),
            rmi_port: env_u16("RMI_PORT", d.rmi_port),
            platform_http_port: env_u16("HTTP_PORT", d.platform_http_port),
            fact_host: env_str("FACT_HOST", d.fact_host),
            fact_port: env_u16("FACT_PORT", d.fact_port),
            query_host: env_str("QUERY_HOST", d.query_host),
            query_port: env_u16("QUERY_PORT", d.query_port),
            answer_port: env_u16("ANSWER_PORT", d.answer_port),
            answer_deadline: env_ms("RESULT_TIMEOUT_MS", d.answer_deadline),
            gc_ttl: env_ms("STALE_TTL_MS", d.gc_ttl),
            sweep_interval: env_ms("GC_SWEEP_MS", d.sweep_interval),
            probe_interval: env_ms("PROBE_INTERVAL_MS", d.probe_interval),
            probe_timeout: env_ms("PROBE_TIMEOUT_MS", d.probe_timeout),
            connect_timeout: env_ms("CONNECT_TIMEOUT_MS", d.connect_timeout),
        }
    }
}

fn default_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "localhost".into())
}

fn env_str(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

fn env_u16(key: &str, default: u16) -> u16 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_ms(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
        .unwrap_or(default)
}
