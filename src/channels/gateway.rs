use crate::artifacts::ArtifactStore;
use crate::channels::events::WebhookBatch;
use crate::intake::{BatchReport, Intake};
use crate::roster::RosterStore;
use crate::scheduler::StatusHandle;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::future::Future;
use std::sync::Arc;

/// Shared state behind the HTTP routes.
#[derive(Clone)]
pub struct GatewayState {
    pub intake: Arc<Intake>,
    pub store: Arc<RosterStore>,
    pub artifacts: ArtifactStore,
    pub scheduler: StatusHandle,
}

/// Routes: `POST /webhook`, `GET /download/{name}`, `GET /health`.
pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(gateway_health))
        .route("/webhook", post(line_webhook))
        .route("/download/{name}", get(download_artifact))
        .with_state(state)
}

/// Serve until `shutdown` resolves, then finish in-flight requests.
pub async fn run_gateway(
    listener: tokio::net::TcpListener,
    state: GatewayState,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let local_addr = listener.local_addr()?;
    let app = router(state);

    tracing::info!("webhook gateway listening on http://{local_addr}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn gateway_health(State(state): State<GatewayState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "dates": state.store.len(),
        "participants": state.store.participant_count(),
        "scheduler": state.scheduler.snapshot(),
    }))
}

async fn line_webhook(
    State(state): State<GatewayState>,
    Json(batch): Json<WebhookBatch>,
) -> Json<BatchReport> {
    if batch.events.is_empty() {
        tracing::debug!("webhook verification ping");
    }
    let report = state.intake.handle_batch(&batch.events).await;
    tracing::debug!(
        received = report.received,
        registered = report.registered,
        malformed = report.malformed,
        "webhook batch handled"
    );
    Json(report)
}

async fn download_artifact(
    State(state): State<GatewayState>,
    Path(name): Path<String>,
) -> Response {
    if !ArtifactStore::is_valid_name(&name) {
        return StatusCode::NOT_FOUND.into_response();
    }

    match state.artifacts.load(&name).await {
        Ok(Some(content)) => {
            let disposition = format!("attachment; filename=\"{}\"", name.replace('"', "_"));
            (
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_owned()),
                    (header::CONTENT_DISPOSITION, disposition),
                ],
                content,
            )
                .into_response()
        }
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => {
            tracing::warn!("cannot load artifact {name}: {err}");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
