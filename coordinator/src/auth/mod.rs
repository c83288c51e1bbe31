pub mod api_key;
pub mod audit;
pub mod jwt;
pub mod tokens;

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use kubently_common::types::{AuditRecord, AuditVerdict, AuthMethod, CallerIdentity, Permissions};

use crate::app::App;
use crate::error::ApiError;

/// Verify caller: JWT-first, then API-key fallback (§4.1). Every decision is
/// audited regardless of outcome. Any internal error fails closed.
pub async fn verify_caller(app: &App, headers: &axum::http::HeaderMap) -> Result<CallerIdentity, ApiError> {
    let correlation_id = headers
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    if let Some(bearer) = bearer_token(headers)
        && let Some(validator) = &app.jwt
    {
        match validator.verify(&bearer).await {
            Ok(identity) => {
                let rec = AuditRecord {
                    timestamp: chrono::Utc::now(),
                    method: Some(AuthMethod::Jwt),
                    identity: Some(identity.clone()),
                    verdict: AuditVerdict::Accepted,
                    correlation_id: correlation_id.clone(),
                    detail: None,
                };
                audit::record(&app.pool, &rec).await;
                return Ok(CallerIdentity {
                    identity,
                    method: AuthMethod::Jwt,
                    permissions: Permissions::HumanUser,
                });
            }
            Err(e) => {
                let rec = AuditRecord {
                    timestamp: chrono::Utc::now(),
                    method: Some(AuthMethod::Jwt),
                    identity: None,
                    verdict: AuditVerdict::Rejected,
                    correlation_id: correlation_id.clone(),
                    detail: Some(format!("jwt: {e}")),
                };
                audit::record(&app.pool, &rec).await;
                // fall through to API-key check
            }
        }
    }

    if let Some(key) = api_key_candidate(headers) {
        if let Some(identity) = api_key::check(&app.api_keys, &key) {
            let resolved = identity.unwrap_or_else(|| "api-key-user".to_string());
            let rec = AuditRecord {
                timestamp: chrono::Utc::now(),
                method: Some(AuthMethod::ApiKey),
                identity: Some(resolved.clone()),
                verdict: AuditVerdict::Accepted,
                correlation_id: correlation_id.clone(),
                detail: None,
            };
            audit::record(&app.pool, &rec).await;
            return Ok(CallerIdentity {
                identity: resolved,
                method: AuthMethod::ApiKey,
                permissions: Permissions::ServiceAccount,
            });
        }
        let rec = AuditRecord {
            timestamp: chrono::Utc::now(),
            method: Some(AuthMethod::ApiKey),
            identity: None,
            verdict: AuditVerdict::Rejected,
            correlation_id: correlation_id.clone(),
            detail: Some("no matching api key".into()),
        };
        audit::record(&app.pool, &rec).await;
    }

    let rec = AuditRecord {
        timestamp: chrono::Utc::now(),
        method: None,
        identity: None,
        verdict: AuditVerdict::Rejected,
        correlation_id,
        detail: Some("no credential presented".into()),
    };
    audit::record(&app.pool, &rec).await;
    Err(ApiError::Authentication("missing or invalid credentials".into()))
}

fn bearer_token(headers: &axum::http::HeaderMap) -> Option<String> {
    let value = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    value.strip_prefix("Bearer ").map(|s| s.to_string())
}

fn api_key_candidate(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(v) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        return Some(v.to_string());
    }
    bearer_token(headers)
}

/// Extractor used on client-role routes: `Caller(identity): Caller`.
pub struct Caller(pub CallerIdentity);

impl FromRequestParts<App> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let identity = verify_caller(state, &parts.headers).await?;
        Ok(Caller(identity))
    }
}

/// Extractor used on executor-role routes: validates `Authorization: Bearer
/// <cluster-token>` + `X-Cluster-ID: <id>` against the executor token
/// registry. Exposes the authenticated cluster id.
pub struct ExecutorIdentity(pub String);

impl FromRequestParts<App> for ExecutorIdentity {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &App) -> Result<Self, Self::Rejection> {
        let cluster_id = parts
            .headers
            .get("x-cluster-id")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Authentication("missing X-Cluster-ID".into()))?
            .to_string();
        let token = bearer_token(&parts.headers)
            .ok_or_else(|| ApiError::Authentication("missing bearer token".into()))?;
        let ok = tokens::verify(&state.pool, &cluster_id, &token).await?;
        if !ok {
            return Err(ApiError::Authentication("invalid executor token".into()));
        }
        Ok(ExecutorIdentity(cluster_id))
    }
}
