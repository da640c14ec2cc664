use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use swarmlink_core::{BridgeConfig, BridgeError};

const WAITING_FACT: &str = "Waiting for confirmation...";
const WAITING_QUERY: &str = "Waiting for a response...";
const TIMEOUT_FACT: &str = "Error: no confirmation from the platform (timeout).";
const TIMEOUT_QUERY: &str = "Error: no response from the platform (timeout).";

/// Which downstream endpoint a submission goes to. Both share the one
/// answer slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RelayTarget {
    Fact,
    Query,
}

impl RelayTarget {
    fn waiting_text(self) -> &'static str {
        match self {
            Self::Fact => WAITING_FACT,
            Self::Query => WAITING_QUERY,
        }
    }

    fn timeout_text(self) -> &'static str {
        match self {
            Self::Fact => TIMEOUT_FACT,
            Self::Query => TIMEOUT_QUERY,
        }
    }
}

/// Relay endpoints and timing knobs.
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub fact_host: String,
    pub fact_port: u16,
    pub query_host: String,
    pub query_port: u16,
    pub deadline: Duration,
    pub connect_timeout: Duration,
}

impl RelayConfig {
    pub fn from_bridge(config: &BridgeConfig) -> Self {
        Self {
            fact_host: config.fact_host.clone(),
            fact_port: config.fact_port,
            query_host: config.query_host.clone(),
            query_port: config.query_port,
            deadline: config.answer_deadline,
            connect_timeout: config.connect_timeout,
        }
    }

    fn endpoint(&self, target: RelayTarget) -> (&str, u16) {
        match target {
            RelayTarget::Fact => (&self.fact_host, self.fact_port),
            RelayTarget::Query => (&self.query_host, self.query_port),
        }
    }
}

enum RelayCommand {
    Submit {
        target: RelayTarget,
        message: String,
        reply: oneshot::Sender<Result<(), BridgeError>>,
    },
    Deliver(String),
    Latest {
        reply: oneshot::Sender<String>,
    },
}

/// Cheap cloneable handle to the relay task.
#[derive(Clone)]
pub struct RelayHandle {
    tx: mpsc::Sender<RelayCommand>,
}

impl RelayHandle {
    /// Forward `message` downstream and arm the answer deadline. Acks
    /// as soon as the message is written; the answer arrives later on
    /// the inbound listener. A prior pending request is abandoned, not
    /// queued.
    pub async fn submit(&self, target: RelayTarget, message: String) -> Result<(), BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RelayCommand::Submit {
                target,
                message,
                reply,
            })
            .await
            .map_err(|_| relay_gone())?;
        rx.await.map_err(|_| relay_gone())?
    }

    /// Record an inbound answer. Attributed to whatever is pending; an
    /// unsolicited answer is recorded all the same (the platform side
    /// carries no correlation token).
    pub async fn deliver(&self, raw: String) {
        let _ = self.tx.send(RelayCommand::Deliver(raw)).await;
    }

    /// The most recently stored answer, initially a waiting placeholder.
    pub async fn latest(&self) -> Result<String, BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(RelayCommand::Latest { reply })
            .await
            .map_err(|_| relay_gone())?;
        rx.await.map_err(|_| relay_gone())
    }
}

fn relay_gone() -> BridgeError {
    BridgeError::Transport("relay unavailable".into())
}

fn far_future() -> Instant {
    Instant::now() + Duration::from_secs(86_400)
}

/// Spawn the single-slot relay task.
pub fn spawn(
    config: RelayConfig,
    cancel: CancellationToken,
) -> (RelayHandle, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<RelayCommand>(64);

    let handle = tokio::spawn(async move {
        let mut latest: String = WAITING_QUERY.to_string();
        // Armed deadline plus the synthetic text to store if it fires.
        let mut pending: Option<(Instant, &'static str)> = None;

        loop {
            // select! evaluates disabled branches' expressions, so the
            // sleep needs a live Instant even when nothing is armed.
            let deadline = pending.map(|(at, _)| at).unwrap_or_else(far_future);
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(RelayCommand::Submit { target, message, reply }) => {
                        // Last request wins: any armed deadline is dropped
                        // before the new submission is attempted.
                        pending = None;
                        match forward(&config, target, &message).await {
                            Ok(()) => {
                                latest = target.waiting_text().to_string();
                                pending = Some((
                                    Instant::now() + config.deadline,
                                    target.timeout_text(),
                                ));
                                tracing::info!(target = ?target, "Submission forwarded");
                                let _ = reply.send(Ok(()));
                            }
                            Err(err) => {
                                tracing::warn!(target = ?target, kind = err.kind(), error = %err, "Submission failed");
                                let _ = reply.send(Err(err));
                            }
                        }
                    }
                    Some(RelayCommand::Deliver(raw)) => {
                        let answer = raw.trim().to_string();
                        tracing::info!(len = answer.len(), "Answer received");
                        latest = answer;
                        pending = None;
                    }
                    Some(RelayCommand::Latest { reply }) => {
                        let _ = reply.send(latest.clone());
                    }
                    None => break,
                },
                _ = tokio::time::sleep_until(deadline), if pending.is_some() => {
                    if let Some((_, timeout_text)) = pending.take() {
                        tracing::warn!("Answer deadline elapsed");
                        latest = timeout_text.to_string();
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }

        tracing::info!("Relay stopped");
    });

    (RelayHandle { tx }, handle)
}

/// One ephemeral outbound connection: write the newline-terminated
/// message, close the write side, done. The socket never outlives the
/// call on any path.
async fn forward(
    config: &RelayConfig,
    target: RelayTarget,
    message: &str,
) -> Result<(), BridgeError> {
    let (host, port) = config.endpoint(target);
    let addr = format!("{host}:{port}");

    let mut stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(&addr))
        .await
        .map_err(|_| BridgeError::unreachable(host, port, "connect timed out"))?
        .map_err(|e| BridgeError::unreachable(host, port, e))?;

    stream
        .write_all(format!("{message}\n").as_bytes())
        .await
        .map_err(|e| BridgeError::Transport(e.to_string()))?;
    stream.shutdown().await.ok();
    Ok(())
}

/// Bind the standing answer listener and spawn its accept loop. Each
/// accepted connection is read line by line; every line is delivered to
/// the relay slot. Per-connection errors are logged and isolated.
pub async fn spawn_answer_listener(
    port: u16,
    relay: RelayHandle,
    cancel: CancellationToken,
) -> std::io::Result<(u16, tokio::task::JoinHandle<()>)> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    let local_port = listener.local_addr()?.port();
    tracing::info!(port = local_port, "Answer listener bound");

    let handle = tokio::spawn(async move {
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(peer = %peer, "Answer connection");
                        let relay = relay.clone();
                        tokio::spawn(read_answers(stream, relay));
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Answer accept failed");
                    }
                },
                _ = cancel.cancelled() => break,
            }
        }
    });

    Ok((local_port, handle))
}

async fn read_answers(stream: TcpStream, relay: RelayHandle) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if !line.trim().is_empty() {
                    relay.deliver(line).await;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::warn!(error = %e, "Answer connection error");
                break;
            }
        }
    }
}
