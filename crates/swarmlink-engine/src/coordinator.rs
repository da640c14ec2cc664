use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use swarmlink_core::{
    now_ms, BridgeConfig, BridgeError, DfAction, DfNotice, MonitorEvent, StatusView,
};

use crate::registry::{AgentRegistry, RegisterResult};

/// Process-wide platform state. Lives inside the coordinator task and
/// is mutated nowhere else; one command is processed to completion
/// before the next is taken, so no transition is ever observed
/// half-applied.
struct PlatformState {
    hostname: String,
    main_host: String,
    rmi_port: u16,
    http_port: u16,
    up: bool,
    last_update: Option<i64>,
    registry: AgentRegistry,
}

impl PlatformState {
    fn snapshot(&self) -> StatusView {
        StatusView {
            hostname: self.hostname.clone(),
            main_host: self.main_host.clone(),
            rmi_port: self.rmi_port,
            http_port: self.http_port,
            up: self.up,
            last_update: self.last_update,
            agents: self.registry.sorted_records(),
        }
    }
}

enum Command {
    Register {
        name: String,
        class: Option<String>,
        when: Option<i64>,
        reply: oneshot::Sender<RegisterResult>,
    },
    Deregister {
        name: String,
        reply: oneshot::Sender<bool>,
    },
    ProbeResult(bool),
    Snapshot {
        reply: oneshot::Sender<StatusView>,
    },
}

/// Cheap cloneable handle to the coordinator task.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    pub async fn register(
        &self,
        name: String,
        class: Option<String>,
        when: Option<i64>,
    ) -> Result<RegisterResult, BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Register {
                name,
                class,
                when,
                reply,
            })
            .await
            .map_err(|_| coordinator_gone())?;
        rx.await.map_err(|_| coordinator_gone())
    }

    pub async fn deregister(&self, name: String) -> Result<bool, BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Deregister { name, reply })
            .await
            .map_err(|_| coordinator_gone())?;
        rx.await.map_err(|_| coordinator_gone())
    }

    pub async fn snapshot(&self) -> Result<StatusView, BridgeError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Snapshot { reply })
            .await
            .map_err(|_| coordinator_gone())?;
        rx.await.map_err(|_| coordinator_gone())
    }

    /// Report one probe outcome. Returns false once the coordinator has
    /// shut down, so the probe loop can stop.
    pub async fn report_probe(&self, alive: bool) -> bool {
        self.tx.send(Command::ProbeResult(alive)).await.is_ok()
    }
}

fn coordinator_gone() -> BridgeError {
    BridgeError::Transport("coordinator unavailable".into())
}

/// Spawn the coordinator task. Registry mutations, probe transitions
/// and the GC sweep all interleave on this one task; state-change
/// events go out on the returned broadcast channel's sender (passed in
/// so the server can subscribe before startup ordering matters).
pub fn spawn(
    config: &BridgeConfig,
    events: broadcast::Sender<MonitorEvent>,
    cancel: CancellationToken,
) -> (CoordinatorHandle, tokio::task::JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<Command>(256);

    let mut state = PlatformState {
        hostname: config.hostname.clone(),
        main_host: config.main_host.clone(),
        rmi_port: config.rmi_port,
        http_port: config.platform_http_port,
        up: false,
        last_update: None,
        registry: AgentRegistry::new(),
    };
    let ttl_ms = config.gc_ttl.as_millis() as i64;
    let sweep_interval = config.sweep_interval;

    let handle = tokio::spawn(async move {
        let mut sweep = tokio::time::interval(sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                cmd = rx.recv() => match cmd {
                    Some(cmd) => apply(&mut state, cmd, &events),
                    None => break,
                },
                _ = sweep.tick() => run_sweep(&mut state, ttl_ms, &events),
                _ = cancel.cancelled() => break,
            }
        }

        tracing::info!("Coordinator stopped");
    });

    (CoordinatorHandle { tx }, handle)
}

fn apply(state: &mut PlatformState, cmd: Command, events: &broadcast::Sender<MonitorEvent>) {
    match cmd {
        Command::Register {
            name,
            class,
            when,
            reply,
        } => {
            let now = now_ms();
            let result = state
                .registry
                .register(&name, class.as_deref(), when, now);
            state.last_update = Some(now);

            let action = match result {
                RegisterResult::Registered => DfAction::Register,
                RegisterResult::Renewed => DfAction::Renewed,
            };
            let class = state.registry.get(&name).map(|r| r.class.clone());
            tracing::info!(name = %name, action = ?action, "Agent registration");
            publish(
                events,
                MonitorEvent::Df(DfNotice {
                    action,
                    name,
                    class,
                    when: now,
                }),
            );
            let _ = reply.send(result);
        }
        Command::Deregister { name, reply } => {
            let existed = state.registry.deregister(&name);
            if existed {
                let now = now_ms();
                state.last_update = Some(now);
                tracing::info!(name = %name, "Agent deregistered");
                publish(
                    events,
                    MonitorEvent::Df(DfNotice {
                        action: DfAction::Deregister,
                        name,
                        class: None,
                        when: now,
                    }),
                );
            }
            let _ = reply.send(existed);
        }
        Command::ProbeResult(alive) => {
            // Edge-triggered: steady-state confirmations stay silent.
            if alive != state.up {
                let now = now_ms();
                state.up = alive;
                state.last_update = Some(now);
                tracing::info!(
                    main_host = %state.main_host,
                    up = alive,
                    "Main platform liveness transition"
                );
                publish(events, MonitorEvent::Heartbeat { up: alive, ts: now });
            }
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(state.snapshot());
        }
    }
}

fn run_sweep(state: &mut PlatformState, ttl_ms: i64, events: &broadcast::Sender<MonitorEvent>) {
    let now = now_ms();
    let evicted = state.registry.sweep(now, ttl_ms);
    if evicted.is_empty() {
        return;
    }
    state.last_update = Some(now);
    tracing::info!(count = evicted.len(), "Evicted stale agents");
    // On the wire a GC eviction looks exactly like a deregistration.
    for name in evicted {
        publish(
            events,
            MonitorEvent::Df(DfNotice {
                action: DfAction::Deregister,
                name,
                class: None,
                when: now,
            }),
        );
    }
}

fn publish(events: &broadcast::Sender<MonitorEvent>, event: MonitorEvent) {
    // Best-effort: a send with no subscribers is not an error.
    let _ = events.send(event);
}
