//! Persistent sync state: which sources are indexed, under which content
//! hash.
//!
//! The ingestion diff compares each scanned source's current hash against
//! this map. A state row is only ever written *after* the source's chunks
//! landed in the index, so a crash between the two leaves the entry
//! pending and the next run redoes it (idempotently — chunk ids are
//! deterministic).

use std::collections::HashMap;

use anyhow::Result;
use sqlx::SqlitePool;
use tracing::warn;

/// Load the full `source_id → content_hash` map.
///
/// A corrupt or unreadable table is not fatal: it logs a warning and
/// returns an empty map, which makes the next sync a full resync.
pub async fn load(pool: &SqlitePool) -> HashMap<String, String> {
    let rows: Result<Vec<(String, String)>, sqlx::Error> =
        sqlx::query_as("SELECT source_id, content_hash FROM sync_state")
            .fetch_all(pool)
            .await;

    match rows {
        Ok(rows) => rows.into_iter().collect(),
        Err(e) => {
            warn!(error = %e, "sync state unreadable; falling back to full resync");
            HashMap::new()
        }
    }
}

/// Record that `source_id` is synced at `content_hash`.
///
/// Callers must only invoke this after the index upsert for the source
/// has succeeded.
pub async fn record(pool: &SqlitePool, source_id: &str, content_hash: &str) -> Result<()> {
    let now = chrono::Utc::now().timestamp();
    sqlx::query(
        r#"
        INSERT INTO sync_state (source_id, content_hash, last_synced_at) VALUES (?, ?, ?)
        ON CONFLICT(source_id) DO UPDATE SET
            content_hash = excluded.content_hash,
            last_synced_at = excluded.last_synced_at
        "#,
    )
    .bind(source_id)
    .bind(content_hash)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Number of synced entries, optionally filtered by source id prefix
/// (`"note:"` / `"bookmark:"`).
pub async fn count(pool: &SqlitePool, prefix: Option<&str>) -> Result<i64> {
    let count = match prefix {
        Some(prefix) => {
            sqlx::query_scalar("SELECT COUNT(*) FROM sync_state WHERE source_id LIKE ? || '%'")
                .bind(prefix)
                .fetch_one(pool)
                .await?
        }
        None => {
            sqlx::query_scalar("SELECT COUNT(*) FROM sync_state")
                .fetch_one(pool)
                .await?
        }
    };
    Ok(count)
}
