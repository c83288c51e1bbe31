//! HTTP surface (§4.5). Thin: every handler here delegates to
//! `auth`/`session`/`queue`/`push`. Client, executor, admin, and discovery
//! roles all share one port — each route's extractor picks the auth
//! strategy that role needs.

pub mod admin;
pub mod agent;
pub mod client;
pub mod discovery;

use anyhow::{Context, Result};
use axum::{Router, middleware, routing::get};
use kubently_common::{access_log, cors, request_context};
use owo_colors::OwoColorize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::app::App;

pub async fn run_server(cancel: CancellationToken, host: &str, port: u16, app: App) -> Result<()> {
    let router = Router::new()
        .route("/health", get(discovery::health))
        .route(
            "/.well-known/kubently-auth",
            get(discovery::auth_discovery),
        )
        .route(
            "/debug/session",
            axum::routing::post(client::create_session),
        )
        .route(
            "/debug/session/{id}",
            get(client::get_session).delete(client::end_session),
        )
        .route(
            "/debug/execute",
            axum::routing::post(client::execute_sync),
        )
        .route(
            "/debug/execute/async",
            axum::routing::post(client::execute_async),
        )
        .route("/debug/operations/{id}", get(client::get_operation))
        .route("/debug/clusters", get(client::list_clusters))
        .route(
            "/admin/agents/{cluster_id}/token",
            axum::routing::post(admin::issue_token).delete(admin::revoke_token),
        )
        .route("/agent/status", get(agent::status))
        .route("/agent/commands", get(agent::poll_commands))
        .route("/executor/stream", get(agent::stream))
        .route(
            "/agent/results",
            axum::routing::post(agent::post_result),
        )
        .route(
            "/executor/results",
            axum::routing::post(agent::post_result),
        )
        .with_state(app)
        .layer(middleware::from_fn(access_log::public))
        .layer(middleware::from_fn(request_context::middleware::create_context))
        .layer(cors::dev());

    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| {
            eprintln!(
                "{}",
                format!("❌ Failed to bind coordinator server to {addr}: {e}").red()
            );
            e
        })
        .context("Failed to bind coordinator server")?;
    println!(
        "{}{}",
        "🚀 Starting kubently-coordinator • port=".green(),
        format!("{port}").green().dimmed()
    );
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        cancel.cancelled().await;
    })
    .await
    .context("coordinator server failed")?;
    println!("{}", "🛑 Coordinator server stopped gracefully.".red());
    Ok(())
}
