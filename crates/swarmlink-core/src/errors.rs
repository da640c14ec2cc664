use std::time::Duration;

/// Error taxonomy for the bridge. Errors local to one connection or one
/// submission are absorbed at that boundary; only startup bind failures
/// are allowed to take down the process.
#[derive(Clone, Debug, thiserror::Error)]
pub enum BridgeError {
    /// Malformed inbound event; state is left unchanged.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An outbound connection (submission or probe) could not be opened.
    #[error("downstream unreachable at {host}:{port}: {detail}")]
    DownstreamUnreachable {
        host: String,
        port: u16,
        detail: String,
    },

    /// No correlated answer arrived within the deadline. Not fatal; a
    /// synthetic answer is recorded instead.
    #[error("no answer within {0:?}")]
    Timeout(Duration),

    /// Inbound listener or subscriber socket error, isolated per
    /// connection.
    #[error("transport error: {0}")]
    Transport(String),
}

impl BridgeError {
    /// Short classification string for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::DownstreamUnreachable { .. } => "downstream_unreachable",
            Self::Timeout(_) => "timeout",
            Self::Transport(_) => "transport",
        }
    }

    pub fn unreachable(host: &str, port: u16, detail: impl std::fmt::Display) -> Self {
        Self::DownstreamUnreachable {
            host: host.to_string(),
            port,
            detail: detail.to_string(),
        }
    }
}
