//! ---
//! ops_section: "04-runtime"
//! ops_subsection: "binary"
//! ops_type: "source"
//! ops_scope: "code"
//! ops_description: "HTTP surface for triggering failover invocations."
//! ops_version: "v0.0.0-prealpha"
//! ops_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use r_ops_failover::DisasterRecoveryOrchestrator;
use r_ops_metrics::ServedRouter;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;
use tracing::warn;

type SharedOrchestrator = Arc<DisasterRecoveryOrchestrator>;

pub fn router(orchestrator: SharedOrchestrator) -> Router {
    Router::new()
        .route("/v1/failover", post(post_failover))
        .route("/healthz", get(get_health))
        .with_state(orchestrator)
        .layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve the failover API until shut down.
pub fn spawn_failover_server(
    orchestrator: SharedOrchestrator,
    addr: SocketAddr,
) -> Result<ServedRouter> {
    ServedRouter::spawn("failover-api", router(orchestrator), addr)
}

/// Runs one invocation; the HTTP status mirrors the envelope's `statusCode`.
async fn post_failover(State(orchestrator): State<SharedOrchestrator>, body: Bytes) -> Response {
    let event = if body.iter().all(u8::is_ascii_whitespace) {
        json!({})
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(event) => event,
            Err(err) => {
                warn!(error = %err, "rejecting failover request with malformed body");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(json!({ "error": format!("request body is not valid JSON: {err}") })),
                )
                    .into_response();
            }
        }
    };

    let envelope = orchestrator.handle_json(event).await;
    let status =
        StatusCode::from_u16(envelope.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(envelope)).into_response()
}

async fn get_health(State(orchestrator): State<SharedOrchestrator>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "environment": orchestrator.config().environment,
    }))
}
