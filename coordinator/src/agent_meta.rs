//! Small side-channel for the executor's "report status" capability
//! advertisement (§4.5, executor role: mode, feature flags, version),
//! folded into the same `GET /agent/status` round-trip the executor already
//! makes every poll cycle rather than a separate endpoint.

use deadpool_redis::Pool;
use kubently_common::types::SecurityMode;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

const META_TTL_SECONDS: u64 = 90;

fn meta_key(cluster_id: &str) -> String {
    format!("executor:meta:{cluster_id}")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AgentMeta {
    mode: SecurityMode,
    version: String,
}

/// Records the executor's self-reported mode/version with a short TTL —
/// a stale value simply falls back to the default once the advertising
/// executor stops polling.
pub async fn report(
    pool: &Pool,
    cluster_id: &str,
    mode: SecurityMode,
    version: &str,
) -> Result<(), ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let serialized = serde_json::to_string(&AgentMeta {
        mode,
        version: version.to_string(),
    })
    .map_err(|e| ApiError::Internal(e.into()))?;
    let _: () = conn
        .set_ex(meta_key(cluster_id), serialized, META_TTL_SECONDS)
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    Ok(())
}

pub async fn get(pool: &Pool, cluster_id: &str) -> Result<(SecurityMode, String), ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let raw: Option<String> = conn
        .get(meta_key(cluster_id))
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    Ok(raw
        .and_then(|s| serde_json::from_str::<AgentMeta>(&s).ok())
        .map(|m| (m.mode, m.version))
        .unwrap_or((SecurityMode::ReadOnly, "unknown".to_string())))
}
