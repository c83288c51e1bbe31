//! Local health/status server, separate from the coordinator-facing
//! traffic — a small per-service health router scoped to what an operator
//! or kubelet probe needs.

use axum::Router;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use crate::app::App;

pub fn router(app: App) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .with_state(app)
}

async fn healthz() -> impl IntoResponse {
    axum::Json(json!({"status": "ok"}))
}

async fn readyz(State(app): State<App>) -> impl IntoResponse {
    let whitelist = app.whitelist.snapshot();
    axum::Json(json!({
        "status": "ok",
        "cluster_id": app.args.cluster_id,
        "mode": whitelist.mode,
    }))
}

pub async fn run(app: App, port: u16, cancel: CancellationToken) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, router(app))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}
