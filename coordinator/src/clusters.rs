use deadpool_redis::Pool;

use crate::error::ApiError;

/// Lists clusters known to this coordinator: any cluster that has ever had
/// an executor token issued. `SCAN` rather than `KEYS` to avoid blocking the
/// store on large key spaces.
pub async fn list(pool: &Pool) -> Result<Vec<String>, ApiError> {
    let mut conn = pool
        .get()
        .await
        .map_err(|e| ApiError::Transient(e.to_string()))?;
    let mut cursor = 0u64;
    let mut clusters = Vec::new();
    loop {
        let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg("executor:token:*")
            .arg("COUNT")
            .arg(200)
            .query_async(&mut conn)
            .await
            .map_err(|e| ApiError::Transient(e.to_string()))?;
        clusters.extend(
            keys.into_iter()
                .filter_map(|k| k.strip_prefix("executor:token:").map(str::to_string)),
        );
        cursor = next;
        if cursor == 0 {
            break;
        }
    }
    clusters.sort();
    clusters.dedup();
    Ok(clusters)
}
