use std::time::{Duration, Instant};

use chrono::Utc;
use deadpool_redis::Pool;
use futures_util::StreamExt;
use kubently_common::types::{new_command_id, Command, CommandResult, CommandTracking};
use metrics::counter;
use redis::AsyncCommands;

use crate::error::ApiError;

const QUEUE_IDLE_TTL_SECONDS: u64 = 300;
const TRACKING_TTL_SECONDS: u64 = 60;
const LATENCY_SAMPLE_MAX: isize = 1000;

fn queue_key(cluster_id: &str) -> String {
    format!("queue:commands:{cluster_id}")
}

fn tracking_key(command_id: &str) -> String {
    format!("command:tracking:{command_id}")
}

fn result_key(command_id: &str) -> String {
    format!("result:{command_id}")
}

fn result_channel(command_id: &str) -> String {
    format!("result:ready:{command_id}")
}

fn commands_channel(cluster_id: &str) -> String {
    format!("executor:commands:{cluster_id}")
}

fn metric_key(name: &str, cluster_id: &str) -> String {
    format!("metrics:{name}:{cluster_id}")
}

/// Assigns an id if absent, stamps `queued_at`, left-pushes onto the
/// cluster's queue, refreshes the queue's idle TTL, writes a short-lived
/// tracking record, and publishes a wake-up notification for any open
/// executor stream.
pub async fn push(pool: &Pool, mut command: Command) -> Result<String, ApiError> {
    if command.id.is_empty() {
        command.id = new_command_id();
    }
    command.queued_at = Utc::now();

    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let serialized = serde_json::to_string(&command).map_err(|e| ApiError::Internal(e.into()))?;
    let tracking = CommandTracking {
        cluster_id: command.cluster_id.clone(),
        queued_at: command.queued_at,
    };
    let tracking_serialized =
        serde_json::to_string(&tracking).map_err(|e| ApiError::Internal(e.into()))?;

    redis::pipe()
        .atomic()
        .lpush(queue_key(&command.cluster_id), &serialized)
        .expire(queue_key(&command.cluster_id), QUEUE_IDLE_TTL_SECONDS as i64)
        .set_ex(tracking_key(&command.id), &tracking_serialized, TRACKING_TTL_SECONDS)
        .query_async::<()>(&mut conn)
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;

    let _: redis::RedisResult<i64> = conn.publish(commands_channel(&command.cluster_id), 1).await;

    counter!("commands_queued_total", "cluster_id" => command.cluster_id.clone()).increment(1);
    bump_metric(&mut conn, "commands_queued", &command.cluster_id).await;

    Ok(command.id)
}

/// Left-push + right-pop gives FIFO. Blocking when `wait_seconds > 0`,
/// otherwise a bounded non-blocking batch of up to `max_batch`.
pub async fn pull(
    pool: &Pool,
    cluster_id: &str,
    wait_seconds: f64,
    max_batch: i64,
) -> Result<Vec<Command>, ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;

    if wait_seconds > 0.0 {
        let popped: Option<(String, String)> = conn
            .brpop(queue_key(cluster_id), wait_seconds)
            .await
            .map_err(|e| ApiError::Transient(e.to_string()))?;
        let Some((_key, raw)) = popped else {
            return Ok(Vec::new());
        };
        let command: Command = serde_json::from_str(&raw).map_err(|e| ApiError::Internal(e.into()))?;
        counter!("commands_delivered_total", "cluster_id" => cluster_id.to_string()).increment(1);
        bump_metric(&mut conn, "commands_delivered", cluster_id).await;
        return Ok(vec![command]);
    }

    let mut out = Vec::new();
    for _ in 0..max_batch.max(1) {
        let raw: Option<String> = conn
            .rpop(queue_key(cluster_id), None)
            .await
            .map_err(|e| ApiError::Transient(e.to_string()))?;
        let Some(raw) = raw else { break };
        let command: Command = serde_json::from_str(&raw).map_err(|e| ApiError::Internal(e.into()))?;
        out.push(command);
    }
    if !out.is_empty() {
        counter!("commands_delivered_total", "cluster_id" => cluster_id.to_string())
            .increment(out.len() as u64);
        bump_metric(&mut conn, "commands_delivered", cluster_id).await;
    }
    Ok(out)
}

pub async fn queue_depth(pool: &Pool, cluster_id: &str) -> Result<i64, ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let len: i64 = conn
        .llen(queue_key(cluster_id))
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    Ok(len)
}

/// Writes a result once and publishes its ready notification. Updates the
/// success/failure counters keyed by the command's tracking record, which
/// still exists (tracking TTL >= typical command execution time).
pub async fn store_result(
    pool: &Pool,
    command_id: &str,
    result: CommandResult,
    result_ttl_seconds: u64,
) -> Result<(), ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let serialized = serde_json::to_string(&result).map_err(|e| ApiError::Internal(e.into()))?;

    let _: () = conn
        .set_ex(result_key(command_id), &serialized, result_ttl_seconds)
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let _: redis::RedisResult<i64> = conn.publish(result_channel(command_id), 1).await;

    let tracking: Option<String> = conn
        .get(tracking_key(command_id))
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    if let Some(raw) = tracking
        && let Ok(tracking) = serde_json::from_str::<CommandTracking>(&raw)
    {
        let name = if result.success {
            "commands_succeeded"
        } else {
            "commands_failed"
        };
        counter!(format!("{name}_total"), "cluster_id" => tracking.cluster_id.clone()).increment(1);
        bump_metric(&mut conn, name, &tracking.cluster_id).await;

        // End-to-end delivery latency: queued -> result stored. Distinct
        // from `result.execution_time_ms`, which is just the executor's
        // subprocess wall-clock.
        let delivery_latency_ms = (result.stored_at - tracking.queued_at)
            .num_milliseconds()
            .max(0);
        let _: redis::RedisResult<()> = conn
            .lpush(
                format!("metrics:delivery_latency_ms:{}", tracking.cluster_id),
                delivery_latency_ms,
            )
            .await;
        let _: redis::RedisResult<()> = conn
            .ltrim(
                format!("metrics:delivery_latency_ms:{}", tracking.cluster_id),
                0,
                LATENCY_SAMPLE_MAX - 1,
            )
            .await;
    }

    Ok(())
}

/// Records a client-side synchronous-execute timeout against the command's
/// tracking record's cluster (spec §4.2 `commands_timeout` counter). Called
/// when `wait_for_result` returns `None` within its budget; best-effort, as
/// the tracking record may have already expired by then.
pub async fn record_timeout(pool: &Pool, command_id: &str) -> Result<(), ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let Some(cluster_id) = tracking_cluster_conn(&mut conn, command_id).await? else {
        return Ok(());
    };
    counter!("commands_timeout_total", "cluster_id" => cluster_id.clone()).increment(1);
    bump_metric(&mut conn, "commands_timeout", &cluster_id).await;
    Ok(())
}

async fn tracking_cluster_conn(
    conn: &mut deadpool_redis::Connection,
    command_id: &str,
) -> Result<Option<String>, ApiError> {
    let raw: Option<String> = conn
        .get(tracking_key(command_id))
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    Ok(raw.and_then(|s| serde_json::from_str::<CommandTracking>(&s).ok().map(|t| t.cluster_id)))
}

/// Whether the command's tracking record is still present. Used by the
/// result-submission endpoint to reject results for ids whose tracking TTL
/// has already expired.
pub async fn tracking_exists(pool: &Pool, command_id: &str) -> Result<bool, ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let exists: bool = conn
        .exists(tracking_key(command_id))
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    Ok(exists)
}

/// Resolves which cluster a command id was dispatched to, via its tracking
/// record. `None` once the tracking TTL has expired.
pub async fn tracking_cluster(pool: &Pool, command_id: &str) -> Result<Option<String>, ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    tracking_cluster_conn(&mut conn, command_id).await
}

pub async fn get_result(pool: &Pool, command_id: &str) -> Result<Option<CommandResult>, ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let raw: Option<String> = conn
        .get(result_key(command_id))
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    raw.map(|s| serde_json::from_str(&s).map_err(|e| ApiError::Internal(e.into())))
        .transpose()
}

/// Checks for immediate availability; if absent, subscribes to the per-id
/// channel *before* a final re-check (closing the push/subscribe race), then
/// waits for the notification or for `timeout_seconds` to elapse, whichever
/// comes first.
pub async fn wait_for_result(
    pool: &Pool,
    redis_url: &str,
    command_id: &str,
    timeout_seconds: u32,
) -> Result<Option<CommandResult>, ApiError> {
    if let Some(result) = get_result(pool, command_id).await? {
        return Ok(Some(result));
    }

    let client = redis::Client::open(redis_url).map_err(|e| ApiError::Internal(e.into()))?;
    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    pubsub
        .subscribe(result_channel(command_id))
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;

    // Re-check after subscribing: a result stored between the first check
    // and this subscribe would otherwise be missed forever.
    if let Some(result) = get_result(pool, command_id).await? {
        return Ok(Some(result));
    }

    let deadline = Instant::now() + Duration::from_secs(timeout_seconds as u64);
    let mut stream = pubsub.on_message();
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Ok(None);
        }
        match tokio::time::timeout(remaining, stream.next()).await {
            Ok(Some(_msg)) => {
                if let Some(result) = get_result(pool, command_id).await? {
                    return Ok(Some(result));
                }
            }
            Ok(None) | Err(_) => return Ok(None),
        }
    }
}

async fn bump_metric(conn: &mut deadpool_redis::Connection, name: &str, cluster_id: &str) {
    let key = metric_key(name, cluster_id);
    let _: redis::RedisResult<i64> = conn.incr(&key, 1).await;
    let _: redis::RedisResult<bool> = conn.expire(&key, 86_400).await;
}
