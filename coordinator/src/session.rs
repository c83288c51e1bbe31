use chrono::Utc;
use deadpool_redis::Pool;
use kubently_common::types::{new_session_id, Session};
use redis::AsyncCommands;

use crate::error::ApiError;

const SESSIONS_ACTIVE_SET: &str = "sessions:active";

fn session_key(id: &str) -> String {
    format!("session:{id}")
}

fn cluster_active_key(cluster_id: &str) -> String {
    format!("cluster:active:{cluster_id}")
}

fn cluster_session_key(cluster_id: &str) -> String {
    format!("cluster:session:{cluster_id}")
}

/// Creates a session and its two companion markers in a single pipelined
/// write so all three share one TTL — see the cyclic-ownership design note.
pub async fn create(
    pool: &Pool,
    cluster_id: &str,
    user_id: Option<String>,
    service_identity: Option<String>,
    correlation_id: Option<String>,
    ttl_seconds: u32,
) -> Result<Session, ApiError> {
    let now = Utc::now();
    let session = Session {
        session_id: new_session_id(),
        cluster_id: cluster_id.to_string(),
        user_id,
        service_identity,
        correlation_id,
        created_at: now,
        last_activity: now,
        command_count: 0,
        ttl_seconds,
    };
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let serialized = serde_json::to_string(&session).map_err(|e| ApiError::Internal(e.into()))?;

    redis::pipe()
        .atomic()
        .set_ex(session_key(&session.session_id), &serialized, ttl_seconds as u64)
        .set_ex(cluster_active_key(cluster_id), &session.session_id, ttl_seconds as u64)
        .set_ex(cluster_session_key(cluster_id), &session.session_id, ttl_seconds as u64)
        .sadd(SESSIONS_ACTIVE_SET, &session.session_id)
        .query_async::<()>(&mut conn)
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;

    Ok(session)
}

pub async fn get(pool: &Pool, session_id: &str) -> Result<Option<Session>, ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let raw: Option<String> = conn
        .get(session_key(session_id))
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| ApiError::Internal(e.into())))
        .transpose()
}

/// Hot path: executors may call this tens of times a minute. Single
/// round-trip existence check.
pub async fn is_cluster_active(pool: &Pool, cluster_id: &str) -> Result<bool, ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let exists: bool = conn
        .exists(cluster_active_key(cluster_id))
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    Ok(exists)
}

/// Bumps `last_activity`/`command_count` and re-applies a fresh TTL to the
/// session and both markers. A crash between the read and the pipelined
/// write can leave a stale marker up to one TTL period; this is accepted
/// per the design notes.
pub async fn keep_alive(pool: &Pool, session_id: &str) -> Result<Option<Session>, ApiError> {
    let Some(mut session) = get(pool, session_id).await? else {
        return Ok(None);
    };
    session.last_activity = Utc::now();
    session.command_count += 1;

    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let serialized = serde_json::to_string(&session).map_err(|e| ApiError::Internal(e.into()))?;
    redis::pipe()
        .atomic()
        .set_ex(session_key(session_id), &serialized, session.ttl_seconds as u64)
        .set_ex(
            cluster_active_key(&session.cluster_id),
            session_id,
            session.ttl_seconds as u64,
        )
        .set_ex(
            cluster_session_key(&session.cluster_id),
            session_id,
            session.ttl_seconds as u64,
        )
        .query_async::<()>(&mut conn)
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;

    Ok(Some(session))
}

pub async fn end(pool: &Pool, session_id: &str) -> Result<bool, ApiError> {
    let Some(session) = get(pool, session_id).await? else {
        return Ok(false);
    };
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    redis::pipe()
        .atomic()
        .del(session_key(session_id))
        .del(cluster_active_key(&session.cluster_id))
        .del(cluster_session_key(&session.cluster_id))
        .srem(SESSIONS_ACTIVE_SET, session_id)
        .query_async::<()>(&mut conn)
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    Ok(true)
}

/// Periodic sweep: drops ids from `sessions:active` whose session record
/// has already expired (TTL'd out without an explicit `end`).
pub async fn cleanup_expired(pool: &Pool) -> Result<u64, ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let ids: Vec<String> = conn
        .smembers(SESSIONS_ACTIVE_SET)
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let mut removed = 0u64;
    for id in ids {
        let exists: bool = conn
            .exists(session_key(&id))
            .await
            .map_err(|e| ApiError::Transient(e.to_string()))?;
        if !exists {
            let _: i64 = conn
                .srem(SESSIONS_ACTIVE_SET, &id)
                .await
                .map_err(|e| ApiError::Transient(e.to_string()))?;
            removed += 1;
        }
    }
    Ok(removed)
}

pub async fn active_session_count(pool: &Pool) -> Result<u64, ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let count: u64 = conn
        .scard(SESSIONS_ACTIVE_SET)
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    Ok(count)
}
