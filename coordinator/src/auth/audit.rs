use deadpool_redis::Pool;
use kubently_common::types::AuditRecord;
use redis::AsyncCommands;

const AUDIT_KEY: &str = "api:audit";
const AUDIT_MAX_LEN: isize = 10_000;

/// Appends a structured audit record to the bounded ring buffer. Best-effort:
/// a failure here must never block the caller's own auth decision, so errors
/// are logged and swallowed.
pub async fn record(pool: &Pool, record: &AuditRecord) {
    let Ok(serialized) = serde_json::to_string(record) else {
        return;
    };
    let Ok(mut conn) = pool.get().await else {
        kubently_common::response::print_warning(anyhow::anyhow!(
            "audit log: could not reach state store"
        ));
        return;
    };
    let pushed: redis::RedisResult<i64> = conn.lpush(AUDIT_KEY, serialized).await;
    if pushed.is_ok() {
        let _: redis::RedisResult<()> = conn.ltrim(AUDIT_KEY, 0, AUDIT_MAX_LEN - 1).await;
    }
}
