//! Admin endpoints (§4.1, §4.5): issue/revoke the per-cluster executor
//! token. Authenticated the same way as the rest of the client role — the
//! data model doesn't carry a separate admin-permission bit, so any valid
//! caller (API key or JWT) may call these (see DESIGN.md Open Questions).

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use kubently_common::types::{AuditRecord, AuditVerdict};
use serde::Deserialize;
use serde_json::json;

use crate::app::App;
use crate::auth::tokens;
use crate::auth::{Caller, audit};
use crate::error::{ApiError, ApiResult};
use crate::validation;

#[derive(Debug, Deserialize, Default)]
pub struct IssueTokenRequest {
    pub custom_token: Option<String>,
}

pub async fn issue_token(
    State(app): State<App>,
    Caller(caller): Caller,
    Path(cluster_id): Path<String>,
    body: Option<Json<IssueTokenRequest>>,
) -> ApiResult<impl IntoResponse> {
    validation::cluster_id(&cluster_id)?;
    let custom_token = body.and_then(|Json(b)| b.custom_token);
    let replacing = custom_token.is_some();
    let (token, created_at) = tokens::issue(&app.pool, &cluster_id, custom_token).await?;

    audit::record(
        &app.pool,
        &AuditRecord {
            timestamp: chrono::Utc::now(),
            method: None,
            identity: Some(caller.identity.clone()),
            verdict: AuditVerdict::Accepted,
            correlation_id: None,
            detail: Some(format!("agent_token_created cluster_id={cluster_id}")),
        },
    )
    .await;

    let status = if replacing { StatusCode::OK } else { StatusCode::CREATED };
    Ok((
        status,
        Json(json!({"cluster_id": cluster_id, "token": token, "created_at": created_at})),
    ))
}

pub async fn revoke_token(
    State(app): State<App>,
    Caller(caller): Caller,
    Path(cluster_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    validation::cluster_id(&cluster_id)?;
    let revoked = tokens::revoke(&app.pool, &cluster_id).await?;
    if !revoked {
        return Err(ApiError::NotFound(format!(
            "no executor token exists for cluster {cluster_id}"
        )));
    }
    audit::record(
        &app.pool,
        &AuditRecord {
            timestamp: chrono::Utc::now(),
            method: None,
            identity: Some(caller.identity.clone()),
            verdict: AuditVerdict::Accepted,
            correlation_id: None,
            detail: Some(format!("agent_token_revoked cluster_id={cluster_id}")),
        },
    )
    .await;
    Ok(Json(json!({"message": "executor token revoked", "cluster_id": cluster_id})))
}
