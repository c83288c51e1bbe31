use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use kubently_common::types::{
    AuditRecord, AuditVerdict, Command, OperationResponse, OperationStatus,
    OperationStatusResponse, SessionResponse, new_command_id,
};
use serde::Deserialize;
use serde_json::json;

use crate::app::App;
use crate::auth::{Caller, audit};
use crate::error::{ApiError, ApiResult};
use crate::{clusters, queue, session, validation};

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub cluster_id: String,
    pub user_id: Option<String>,
    pub correlation_id: Option<String>,
    pub service_identity: Option<String>,
    pub ttl_seconds: Option<u32>,
}

pub async fn create_session(
    State(app): State<App>,
    Caller(_identity): Caller,
    Json(req): Json<CreateSessionRequest>,
) -> ApiResult<impl IntoResponse> {
    validation::cluster_id(&req.cluster_id)?;
    let ttl = validation::session_ttl(req.ttl_seconds)?;
    let session = session::create(
        &app.pool,
        &req.cluster_id,
        req.user_id,
        req.service_identity,
        req.correlation_id,
        ttl,
    )
    .await?;
    Ok((StatusCode::CREATED, Json(SessionResponse::from(session))))
}

pub async fn get_session(
    State(app): State<App>,
    Caller(_identity): Caller,
    Path(session_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let session = session::get(&app.pool, &session_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("no such session {session_id}")))?;
    Ok(Json(SessionResponse::from(session)))
}

pub async fn end_session(
    State(app): State<App>,
    Caller(identity): Caller,
    Path(session_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let ended = session::end(&app.pool, &session_id).await?;
    if !ended {
        return Err(ApiError::NotFound(format!("no such session {session_id}")));
    }
    audit::record(
        &app.pool,
        &AuditRecord {
            timestamp: chrono::Utc::now(),
            method: Some(identity.method),
            identity: Some(identity.identity),
            verdict: AuditVerdict::Accepted,
            correlation_id: None,
            detail: Some(format!("session_ended session_id={session_id}")),
        },
    )
    .await;
    Ok(Json(json!({"message": "session ended", "session_id": session_id})))
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub cluster_id: String,
    pub session_id: Option<String>,
    pub correlation_id: Option<String>,
    pub command_type: String,
    pub args: Vec<String>,
    pub namespace: Option<String>,
    pub timeout_seconds: Option<u32>,
}

impl ExecuteRequest {
    fn into_command(self, default_timeout: u32) -> Result<(Command, u32), ApiError> {
        validation::cluster_id(&self.cluster_id)?;
        let mut full_args = Vec::with_capacity(self.args.len() + 1);
        full_args.push(self.command_type);
        full_args.extend(self.args);
        validation::args(&full_args)?;
        let timeout = validation::command_timeout(self.timeout_seconds, default_timeout)?;
        let command = Command {
            id: new_command_id(),
            cluster_id: self.cluster_id,
            args: full_args,
            namespace: self.namespace,
            timeout_seconds: timeout,
            queued_at: chrono::Utc::now(),
            session_id: self.session_id,
            correlation_id: self.correlation_id,
            priority: None,
        };
        Ok((command, timeout))
    }
}

/// `POST /debug/execute` — synchronous: pushes the command and blocks on its
/// result (or a 408 timeout) within the caller's timeout budget.
pub async fn execute_sync(
    State(app): State<App>,
    Caller(_identity): Caller,
    Json(req): Json<ExecuteRequest>,
) -> ApiResult<impl IntoResponse> {
    let (command, timeout) = req.into_command(app.args.command_timeout_seconds)?;
    let session_id = command.session_id.clone();
    let command_id = queue::push(&app.pool, command).await?;
    keep_session_alive(&app, session_id.as_deref()).await;
    let result = queue::wait_for_result(&app.pool, &app.redis_url, &command_id, timeout).await?;
    match result {
        Some(result) => Ok((StatusCode::OK, Json(json!({
            "operation_id": command_id,
            "status": if result.success { "success" } else { "failure" },
            "output": result.output,
            "error": result.error,
            "exit_code": result.exit_code,
            "execution_time_ms": result.execution_time_ms,
        }))).into_response()),
        None => {
            if let Err(e) = queue::record_timeout(&app.pool, &command_id).await {
                kubently_common::response::print_warning(anyhow::anyhow!(
                    "failed to record timeout metric for {command_id}: {e}"
                ));
            }
            Err(ApiError::Timeout)
        }
    }
}

/// Refreshes the session tied to this command, if any (spec §3 Session
/// invariant: extended by activity). Best-effort — a missing or already
/// expired session must never fail the command itself.
async fn keep_session_alive(app: &App, session_id: Option<&str>) {
    let Some(session_id) = session_id else { return };
    if let Err(e) = session::keep_alive(&app.pool, session_id).await {
        kubently_common::response::print_warning(anyhow::anyhow!(
            "keep_alive failed for session {session_id}: {e}"
        ));
    }
}

/// `POST /debug/execute/async` — returns an opaque operation id immediately;
/// the result (if any) remains pollable via `/debug/operations/{id}` until
/// the result's TTL expires.
pub async fn execute_async(
    State(app): State<App>,
    Caller(_identity): Caller,
    Json(req): Json<ExecuteRequest>,
) -> ApiResult<impl IntoResponse> {
    let (command, _timeout) = req.into_command(app.args.command_timeout_seconds)?;
    let session_id = command.session_id.clone();
    let command_id = queue::push(&app.pool, command).await?;
    keep_session_alive(&app, session_id.as_deref()).await;
    Ok((
        StatusCode::ACCEPTED,
        Json(OperationResponse {
            poll_url: format!("/debug/operations/{command_id}"),
            operation_id: command_id,
            status: OperationStatus::Pending,
        }),
    ))
}

pub async fn get_operation(
    State(app): State<App>,
    Caller(_identity): Caller,
    Path(operation_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let result = queue::get_result(&app.pool, &operation_id).await?;
    let status = match &result {
        None => OperationStatus::Pending,
        Some(r) if r.success => OperationStatus::Success,
        Some(r) if r.error.as_deref().is_some_and(|e| e.starts_with("Command timed out")) => {
            OperationStatus::Timeout
        }
        Some(_) => OperationStatus::Failure,
    };
    Ok(Json(OperationStatusResponse {
        operation_id,
        status,
        result,
    }))
}

pub async fn list_clusters(
    State(app): State<App>,
    Caller(_identity): Caller,
) -> ApiResult<impl IntoResponse> {
    let clusters = clusters::list(&app.pool).await?;
    Ok(Json(json!({"clusters": clusters})))
}
