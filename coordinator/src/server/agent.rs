//! Executor-role endpoints (§4.3, §4.5): stream, long-poll fallback, result
//! submission, status. All routes authenticate via [`ExecutorIdentity`]
//! (`Authorization: Bearer <cluster-token>` + `X-Cluster-ID`).

use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures_util::{Stream, StreamExt};
use kubently_common::types::{AgentStatus, CommandResult, SecurityMode, StreamEvent};
use serde::Deserialize;
use serde_json::json;

use crate::app::App;
use crate::auth::ExecutorIdentity;
use crate::error::{ApiError, ApiResult};
use crate::{agent_meta, queue, session};

static HEARTBEAT: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub mode: Option<SecurityMode>,
    pub version: Option<String>,
}

/// `GET /agent/status` — the executor's own poll cadence decision point,
/// doubling as its status-report channel: when it carries `mode`/`version`
/// query params, those are recorded as the latest capability advertisement.
pub async fn status(
    State(app): State<App>,
    ExecutorIdentity(cluster_id): ExecutorIdentity,
    Query(q): Query<StatusQuery>,
) -> ApiResult<impl IntoResponse> {
    if let Some(mode) = q.mode {
        let version = q.version.clone().unwrap_or_else(|| "unknown".to_string());
        agent_meta::report(&app.pool, &cluster_id, mode, &version).await?;
    }
    let is_active = session::is_cluster_active(&app.pool, &cluster_id).await?;
    let queue_depth = queue::queue_depth(&app.pool, &cluster_id).await?;
    let (mode, version) = agent_meta::get(&app.pool, &cluster_id).await?;
    Ok(Json(AgentStatus {
        cluster_id,
        is_active,
        queue_depth,
        mode,
        version,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    #[serde(default)]
    pub wait: f64,
}

/// `GET /agent/commands?wait=<seconds>` — long-poll fallback, shares the
/// same atomic pop as the SSE stream so a command is delivered at most once
/// regardless of which path the executor is using.
pub async fn poll_commands(
    State(app): State<App>,
    ExecutorIdentity(cluster_id): ExecutorIdentity,
    Query(q): Query<PollQuery>,
) -> ApiResult<impl IntoResponse> {
    let wait = q.wait.clamp(0.0, f64::from(app.args.long_poll_timeout_seconds));
    let commands = queue::pull(&app.pool, &cluster_id, wait, app.args.max_commands_per_fetch).await?;
    if commands.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }
    Ok(Json(json!({"commands": commands})).into_response())
}

/// `GET /executor/stream` — the primary delivery path (§4.3). On open:
/// subscribe, drain anything already queued (closes the push/subscribe
/// race), send `connected`, then emit one `command` event per notified pop
/// and a `ping` every `ping_interval_seconds`.
pub async fn stream(
    State(app): State<App>,
    ExecutorIdentity(cluster_id): ExecutorIdentity,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let mut notifications = app.push.subscribe(&cluster_id).await;
    let (tx, rx) = tokio::sync::mpsc::channel::<StreamEvent>(32);
    let ping_interval = Duration::from_secs(app.args.ping_interval_seconds);

    let pool = app.pool.clone();
    let cluster = cluster_id.clone();
    tokio::spawn(async move {
        let heartbeat_id = HEARTBEAT.fetch_add(1, Ordering::Relaxed);

        // Drain anything already queued before announcing connected, so a
        // command pushed just before this stream opened isn't stranded
        // until the first notification.
        if let Ok(drained) = queue::pull(&pool, &cluster, 0.0, i64::MAX).await {
            for command in drained {
                if tx.send(StreamEvent::Command(command)).await.is_err() {
                    return;
                }
            }
        }
        if tx.send(StreamEvent::Connected { heartbeat_id }).await.is_err() {
            return;
        }

        let mut ticker = tokio::time::interval(ping_interval);
        ticker.tick().await; // first tick fires immediately; skip it
        loop {
            tokio::select! {
                notified = notifications.recv() => {
                    if notified.is_err() {
                        // Sender dropped or we lagged; either way fall back
                        // to a drain so we don't stall forever.
                    }
                    match queue::pull(&pool, &cluster, 1.0, i64::MAX).await {
                        Ok(commands) => {
                            for command in commands {
                                let send = tokio::time::timeout(
                                    ping_interval,
                                    tx.send(StreamEvent::Command(command)),
                                )
                                .await;
                                match send {
                                    Ok(Ok(())) => {}
                                    _ => return, // stalled writer or closed receiver
                                }
                            }
                        }
                        Err(_) => return,
                    }
                }
                _ = ticker.tick() => {
                    let send = tokio::time::timeout(
                        ping_interval,
                        tx.send(StreamEvent::Ping { heartbeat_id }),
                    )
                    .await;
                    if !matches!(send, Ok(Ok(()))) {
                        return;
                    }
                }
            }
        }
    });

    let stream = tokio_stream::wrappers::ReceiverStream::new(rx).map(|event| {
        let kind = event.kind();
        let built = match &event {
            StreamEvent::Connected { heartbeat_id } | StreamEvent::Ping { heartbeat_id } => {
                Event::default().event(kind).json_data(json!({"heartbeat_id": heartbeat_id}))
            }
            StreamEvent::Command(command) => Event::default().event(kind).json_data(command),
            StreamEvent::Error { message } => {
                Event::default().event(kind).json_data(json!({"message": message}))
            }
        };
        Ok(built.unwrap_or_else(|_| Event::default().event("error").data("serialization error")))
    });
    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

#[derive(Debug, Deserialize)]
pub struct SubmitResultRequest {
    pub command_id: String,
    pub result: CommandResult,
}

/// `POST /agent/results` (aliased `/executor/results`). 404 if the
/// command's tracking record has already expired — the client's
/// `wait_for_result` has moved on and there is nothing left to notify.
pub async fn post_result(
    State(app): State<App>,
    ExecutorIdentity(_cluster_id): ExecutorIdentity,
    Json(req): Json<SubmitResultRequest>,
) -> ApiResult<impl IntoResponse> {
    if !queue::tracking_exists(&app.pool, &req.command_id).await? {
        return Err(ApiError::NotFound(format!(
            "no tracking record for command {} (expired or unknown)",
            req.command_id
        )));
    }
    queue::store_result(
        &app.pool,
        &req.command_id,
        req.result,
        app.args.result_ttl_seconds as u64,
    )
    .await?;
    Ok(StatusCode::OK)
}
