use std::sync::Arc;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use swarmlink_core::MonitorEvent;
use swarmlink_engine::{CoordinatorHandle, RelayHandle};

use crate::client::{self, ClientRegistry};
use crate::event_bridge;
use crate::handlers;

/// Server configuration.
pub struct ServerConfig {
    pub port: u16,
    pub max_send_queue: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 4100,
            max_send_queue: 256,
        }
    }
}

/// Shared application state passed to Axum handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: CoordinatorHandle,
    pub relay: RelayHandle,
    pub clients: Arc<ClientRegistry>,
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/df-event", post(handlers::df_event))
        .route("/api/status", get(handlers::status))
        .route("/send-fact", post(handlers::send_fact))
        .route("/send-query", post(handlers::send_query))
        .route("/get-query-result", get(handlers::query_result))
        .route("/ws", get(ws_handler))
        .with_state(state)
        .layer(CorsLayer::permissive())
}

/// Create and start the HTTP/WebSocket surface. Returns a handle that
/// keeps the background tasks alive.
pub async fn start(
    config: ServerConfig,
    coordinator: CoordinatorHandle,
    relay: RelayHandle,
    events: broadcast::Sender<MonitorEvent>,
    cancel: CancellationToken,
) -> Result<ServerHandle, std::io::Error> {
    let clients = Arc::new(ClientRegistry::new(config.max_send_queue));

    let bridge_handle = event_bridge::create_bridge(Arc::clone(&clients), events.subscribe());
    let cleanup_handle =
        client::start_cleanup_task(Arc::clone(&clients), std::time::Duration::from_secs(60));

    let state = AppState {
        coordinator,
        relay,
        clients,
    };

    let router = build_router(state);
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let local_addr = listener.local_addr()?;

    tracing::info!(port = local_addr.port(), "Bridge server started");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
            .ok();
    });

    Ok(ServerHandle {
        port: local_addr.port(),
        _server: server_handle,
        _bridge: bridge_handle,
        _cleanup: cleanup_handle,
    })
}

/// Handle returned by `start()` — keeps background tasks alive.
pub struct ServerHandle {
    pub port: u16,
    _server: tokio::task::JoinHandle<()>,
    _bridge: tokio::task::JoinHandle<()>,
    _cleanup: tokio::task::JoinHandle<()>,
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// New subscriber: one snapshot envelope first, then the event stream.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let snapshot = match state.coordinator.snapshot().await {
        Ok(view) => view,
        Err(err) => {
            tracing::error!(error = %err, "Snapshot for new subscriber failed");
            let _ = socket.send(WsMessage::Close(None)).await;
            return;
        }
    };
    let greeting = match event_bridge::serialize_event(&MonitorEvent::Snapshot(snapshot)) {
        Some(json) => json,
        None => return,
    };

    let (client_id, rx) = state.clients.register(greeting);
    tracing::info!(client_id = %client_id, "Subscriber connected");

    client::handle_ws_connection(socket, client_id, rx, state.clients).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    use swarmlink_core::BridgeConfig;
    use swarmlink_engine::{coordinator, relay, RelayConfig};

    /// Everything a test needs to talk to a running bridge. Holding the
    /// struct keeps all tasks alive.
    struct TestStack {
        http_port: u16,
        answer_port: u16,
        _server: ServerHandle,
        _cancel: CancellationToken,
    }

    async fn spawn_stack(fact_port: u16, query_port: u16) -> TestStack {
        let config = BridgeConfig {
            fact_port,
            query_port,
            fact_host: "127.0.0.1".into(),
            query_host: "127.0.0.1".into(),
            // Keep the timers out of the way unless a test wants them.
            gc_ttl: Duration::from_secs(60),
            sweep_interval: Duration::from_secs(60),
            ..BridgeConfig::default()
        };
        let cancel = CancellationToken::new();
        let (events, _) = broadcast::channel(64);

        let (coordinator, _coord_task) = coordinator::spawn(&config, events.clone(), cancel.clone());
        let (relay, _relay_task) = relay::spawn(RelayConfig::from_bridge(&config), cancel.clone());
        let (answer_port, _listener_task) =
            relay::spawn_answer_listener(0, relay.clone(), cancel.clone())
                .await
                .unwrap();

        let server = start(
            ServerConfig {
                port: 0,
                max_send_queue: 64,
            },
            coordinator,
            relay,
            events,
            cancel.clone(),
        )
        .await
        .unwrap();

        TestStack {
            http_port: server.port,
            answer_port,
            _server: server,
            _cancel: cancel,
        }
    }

    fn url(stack: &TestStack, path: &str) -> String {
        format!("http://127.0.0.1:{}{}", stack.http_port, path)
    }

    async fn bind_downstream() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        (listener, port)
    }

    #[tokio::test]
    async fn status_endpoint_serves_platform_state() {
        let stack = spawn_stack(1, 1).await;

        let resp = reqwest::get(url(&stack, "/api/status")).await.unwrap();
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["up"], false);
        assert_eq!(body["rmiPort"], 1099);
        assert_eq!(body["httpPort"], 7778);
        assert!(body["agents"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn df_event_registers_then_renews() {
        let stack = spawn_stack(1, 1).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(url(&stack, "/df-event"))
            .json(&serde_json::json!({
                "type": "REGISTER", "name": "dummy", "clazz": "agents.Dummy", "when": 123
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], true);

        // Same name again: a renewal, never a duplicate.
        client
            .post(url(&stack, "/df-event"))
            .json(&serde_json::json!({"type": "REGISTER", "name": "dummy"}))
            .send()
            .await
            .unwrap();

        let status: serde_json::Value = reqwest::get(url(&stack, "/api/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let agents = status["agents"].as_array().unwrap();
        assert_eq!(agents.len(), 1);
        assert_eq!(agents[0]["name"], "dummy");
        assert_eq!(agents[0]["class"], "agents.Dummy");
        assert_eq!(agents[0]["since"], 123);
    }

    #[tokio::test]
    async fn malformed_df_event_is_rejected() {
        let stack = spawn_stack(1, 1).await;
        let client = reqwest::Client::new();

        let resp = client
            .post(url(&stack, "/df-event"))
            .json(&serde_json::json!({"type": "REGISTER"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 400);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["ok"], false);
        assert_eq!(body["error"], "bad payload");

        // Registry untouched.
        let status: serde_json::Value = reqwest::get(url(&stack, "/api/status"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert!(status["agents"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_fact_writes_downstream_and_acks_first() {
        let (listener, fact_port) = bind_downstream().await;
        let stack = spawn_stack(fact_port, 1).await;

        let downstream = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = String::new();
            stream.read_to_string(&mut buf).await.unwrap();
            buf
        });

        let resp = reqwest::Client::new()
            .post(url(&stack, "/send-fact"))
            .json(&serde_json::json!({"fact": "John is a doctor."}))
            .send()
            .await
            .unwrap();
        // Acked before any answer exists.
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.text().await.unwrap(), "Done");

        assert_eq!(downstream.await.unwrap(), "John is a doctor.\n");

        // No answer yet: the result query shows the waiting placeholder.
        let result: serde_json::Value = reqwest::get(url(&stack, "/get-query-result"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(result["answer"], "Waiting for confirmation...");
    }

    #[tokio::test]
    async fn query_roundtrip_via_answer_listener() {
        let (listener, query_port) = bind_downstream().await;
        let stack = spawn_stack(1, query_port).await;

        let downstream = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = String::new();
            stream.read_to_string(&mut buf).await.unwrap();
            buf
        });

        let resp = reqwest::Client::new()
            .post(url(&stack, "/send-query"))
            .json(&serde_json::json!({"message": "Who is a doctor?"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        assert_eq!(downstream.await.unwrap(), "Who is a doctor?\n");

        // The platform answers on the standing inbound channel.
        let mut answer = TcpStream::connect(("127.0.0.1", stack.answer_port))
            .await
            .unwrap();
        answer
            .write_all(b"John and Luca are doctors.\n")
            .await
            .unwrap();
        answer.shutdown().await.ok();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let result: serde_json::Value = reqwest::get(url(&stack, "/get-query-result"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(result["answer"], "John and Luca are doctors.");
    }

    #[tokio::test]
    async fn unreachable_downstream_yields_server_error() {
        // Port 1: nothing listens there.
        let stack = spawn_stack(1, 1).await;

        let resp = reqwest::Client::new()
            .post(url(&stack, "/send-fact"))
            .json(&serde_json::json!({"fact": "lost"}))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 500);
        assert_eq!(
            resp.text().await.unwrap(),
            "Error communicating with the platform."
        );
    }
}
