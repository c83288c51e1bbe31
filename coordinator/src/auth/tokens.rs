use chrono::Utc;
use deadpool_redis::Pool;
use rand::RngCore;
use redis::AsyncCommands;
use subtle::ConstantTimeEq;

use crate::error::ApiError;

fn token_key(cluster_id: &str) -> String {
    format!("executor:token:{cluster_id}")
}

/// Generates a >=256-bit URL-safe random executor token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut bytes);
    base64_url(&bytes)
}

fn base64_url(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// Issues a token for `cluster_id`. Fails with `Conflict` if one already
/// exists, unless `custom_token` is supplied (explicit override).
pub async fn issue(
    pool: &Pool,
    cluster_id: &str,
    custom_token: Option<String>,
) -> Result<(String, chrono::DateTime<Utc>), ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let key = token_key(cluster_id);
    let existing: Option<String> = conn
        .get(&key)
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    if existing.is_some() && custom_token.is_none() {
        return Err(ApiError::Conflict(format!(
            "executor token already exists for cluster {cluster_id}; revoke first or pass custom_token"
        )));
    }
    let token = custom_token.unwrap_or_else(generate_token);
    let _: () = conn
        .set(&key, &token)
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    Ok((token, Utc::now()))
}

/// Deletes the stored token for `cluster_id`. Returns `false` if none existed.
pub async fn revoke(pool: &Pool, cluster_id: &str) -> Result<bool, ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let deleted: i64 = conn
        .del(token_key(cluster_id))
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    Ok(deleted > 0)
}

/// Verifies a bearer token presented by an executor for `cluster_id`,
/// constant-time against the stored dynamic token, falling back to the
/// static `AGENT_TOKEN_<CLUSTER>` environment variable only when no dynamic
/// token has been issued yet.
pub async fn verify(pool: &Pool, cluster_id: &str, presented: &str) -> Result<bool, ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let stored: Option<String> = conn
        .get(token_key(cluster_id))
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let expected = match stored {
        Some(t) => t,
        None => {
            let env_key = format!(
                "AGENT_TOKEN_{}",
                cluster_id.to_uppercase().replace('-', "_")
            );
            match std::env::var(&env_key) {
                Ok(t) => t,
                Err(_) => return Ok(false),
            }
        }
    };
    Ok(constant_time_eq(&expected, presented))
}

pub fn constant_time_eq(a: &str, b: &str) -> bool {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    if a.len() != b.len() {
        return false;
    }
    bool::from(a.ct_eq(b))
}
