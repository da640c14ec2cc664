use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use swarmlink_core::BridgeError;
use swarmlink_engine::RelayTarget;

use crate::server::AppState;

/// Inbound registration event from the platform side-channel. The
/// platform's callback sends `clazz`; dashboard tooling sends `class`.
#[derive(Debug, Deserialize)]
pub(crate) struct DfEventBody {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub name: Option<String>,
    #[serde(alias = "clazz")]
    pub class: Option<String>,
    pub when: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FactBody {
    pub fact: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryBody {
    pub message: String,
}

fn bad_payload(detail: &str) -> (StatusCode, Json<Value>) {
    let err = BridgeError::BadRequest(detail.to_string());
    tracing::warn!(kind = err.kind(), error = %err, "Rejected df-event");
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"ok": false, "error": "bad payload"})),
    )
}

/// POST /df-event — registration side-channel from the platform.
pub async fn df_event(
    State(state): State<AppState>,
    Json(body): Json<DfEventBody>,
) -> (StatusCode, Json<Value>) {
    let kind = body.kind.filter(|s| !s.is_empty());
    let name = body.name.filter(|s| !s.is_empty());
    let (kind, name) = match (kind, name) {
        (Some(kind), Some(name)) => (kind, name),
        _ => return bad_payload("missing type or name"),
    };

    let result = match kind.as_str() {
        "REGISTER" => state
            .coordinator
            .register(name, body.class, body.when)
            .await
            .map(|_| ()),
        "DEREGISTER" | "DE-REGISTER" => state.coordinator.deregister(name).await.map(|_| ()),
        other => return bad_payload(&format!("unknown type {other}")),
    };

    match result {
        Ok(()) => (StatusCode::OK, Json(json!({"ok": true}))),
        Err(err) => {
            tracing::error!(kind = err.kind(), error = %err, "df-event failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"ok": false, "error": "coordinator unavailable"})),
            )
        }
    }
}

/// GET /api/status — current platform state.
pub async fn status(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.coordinator.snapshot().await {
        Ok(view) => (
            StatusCode::OK,
            Json(serde_json::to_value(view).unwrap_or_default()),
        ),
        Err(err) => {
            tracing::error!(error = %err, "status query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "coordinator unavailable"})),
            )
        }
    }
}

/// POST /send-fact — relay a fact to the platform's input endpoint.
pub async fn send_fact(
    State(state): State<AppState>,
    Json(body): Json<FactBody>,
) -> (StatusCode, &'static str) {
    submit(&state, RelayTarget::Fact, body.fact).await
}

/// POST /send-query — relay a query to the platform's query endpoint.
pub async fn send_query(
    State(state): State<AppState>,
    Json(body): Json<QueryBody>,
) -> (StatusCode, &'static str) {
    submit(&state, RelayTarget::Query, body.message).await
}

async fn submit(
    state: &AppState,
    target: RelayTarget,
    message: String,
) -> (StatusCode, &'static str) {
    match state.relay.submit(target, message).await {
        Ok(()) => (
            StatusCode::OK,
            match target {
                RelayTarget::Fact => "Done",
                RelayTarget::Query => "Query sent to the multi-agent system.",
            },
        ),
        Err(err) => {
            tracing::warn!(target = ?target, kind = err.kind(), error = %err, "Submission failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Error communicating with the platform.",
            )
        }
    }
}

/// GET /get-query-result — the single current answer string.
pub async fn query_result(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.relay.latest().await {
        Ok(answer) => (StatusCode::OK, Json(json!({"answer": answer}))),
        Err(err) => {
            tracing::error!(error = %err, "result query failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "relay unavailable"})),
            )
        }
    }
}
