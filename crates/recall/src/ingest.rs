//! Incremental ingestion engine.
//!
//! Drives one sync run: scan connectors, diff against the persisted sync
//! state, then for each pending entry fetch (bookmarks only), extract,
//! chunk, embed, upsert into the vector index, and finally record the
//! entry as synced. State is recorded strictly after the index write:
//! chunk ids are deterministic, so a crash between the two steps is
//! retried idempotently on the next run.
//!
//! Failures are isolated per entry — a dead URL or an embedding outage
//! logs a warning, leaves that entry pending, and the run continues.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use sqlx::SqlitePool;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use recall_core::chunk::chunk_text;
use recall_core::embedding::Embedder;
use recall_core::index::VectorIndex;
use recall_core::models::{chunk_id, DocumentChunk, SourceType};

use crate::config::Config;
use crate::extract::html_to_text;
use crate::fetch::PageFetcher;
use crate::sync_state;

/// How an entry's text is obtained.
#[derive(Debug, Clone)]
pub enum Payload {
    /// The connector already has the text (notes).
    Inline(String),
    /// The text lives behind a URL (bookmarks).
    Remote(String),
}

/// One source as produced by a connector scan.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    pub source_id: String,
    pub source_type: SourceType,
    pub title: String,
    pub url: Option<String>,
    pub content_hash: String,
    pub payload: Payload,
}

/// Outcome counters for one sync run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub scanned: usize,
    pub pending: usize,
    pub ingested: usize,
    pub chunks: usize,
    pub skipped_empty: usize,
    pub failed: usize,
}

#[derive(Debug, Default, Clone)]
pub struct SyncOptions {
    /// Ignore the sync state — reingest everything.
    pub full: bool,
    /// Report pending counts without fetching or writing.
    pub dry_run: bool,
    /// Cap on the number of pending entries processed this run.
    pub limit: Option<usize>,
}

/// Entries whose hash is absent from or different in the sync state.
fn diff_pending(entries: Vec<SourceEntry>, state: &HashMap<String, String>) -> Vec<SourceEntry> {
    entries
        .into_iter()
        .filter(|e| state.get(&e.source_id) != Some(&e.content_hash))
        .collect()
}

/// Diff against the sync state and apply the limit: the set of entries one
/// run would process.
async fn pending_entries(
    pool: &SqlitePool,
    entries: Vec<SourceEntry>,
    options: &SyncOptions,
) -> (usize, Vec<SourceEntry>) {
    let state = if options.full {
        HashMap::new()
    } else {
        sync_state::load(pool).await
    };

    let mut pending = diff_pending(entries, &state);
    if let Some(limit) = options.limit {
        pending.truncate(limit);
    }
    (pending.len(), pending)
}

/// What a sync run would do, without doing it: scan/diff counts only.
/// Needs no providers, so dry runs work offline and without credentials.
pub async fn plan_entries(
    pool: &SqlitePool,
    entries: Vec<SourceEntry>,
    options: &SyncOptions,
) -> SyncReport {
    let mut report = SyncReport {
        scanned: entries.len(),
        ..Default::default()
    };
    let (pending_count, _) = pending_entries(pool, entries, options).await;
    report.pending = pending_count;
    report
}

/// Run one sync over the given scanned entries.
pub async fn sync_entries(
    pool: &SqlitePool,
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    fetcher: Arc<dyn PageFetcher>,
    config: &Config,
    entries: Vec<SourceEntry>,
    options: &SyncOptions,
) -> Result<SyncReport> {
    let mut report = SyncReport {
        scanned: entries.len(),
        ..Default::default()
    };

    let (pending_count, pending) = pending_entries(pool, entries, options).await;
    report.pending = pending_count;

    if options.dry_run {
        return Ok(report);
    }

    // Fetch all remote payloads up front with bounded concurrency.
    let fetched = fetch_remote(&pending, fetcher, config.bookmarks.fetch_concurrency).await;

    for (i, entry) in pending.iter().enumerate() {
        let text = match &entry.payload {
            // Notes index whole; the content limits below are sized for
            // fetched pages, not local files.
            Payload::Inline(text) => text.clone(),
            Payload::Remote(url) => {
                let body = match fetched.get(&i) {
                    Some(Ok(body)) => body,
                    Some(Err(e)) => {
                        warn!(source_id = %entry.source_id, url = %url, error = %e, "fetch failed; entry left pending");
                        report.failed += 1;
                        continue;
                    }
                    None => {
                        warn!(source_id = %entry.source_id, url = %url, "fetch task lost; entry left pending");
                        report.failed += 1;
                        continue;
                    }
                };

                let text = truncate_chars(&html_to_text(body), config.bookmarks.max_content_length);

                if text.trim().chars().count() < config.bookmarks.min_content_length {
                    // Nothing worth indexing; mark synced so we don't
                    // refetch a page that is genuinely empty on every run.
                    if let Err(e) =
                        sync_state::record(pool, &entry.source_id, &entry.content_hash).await
                    {
                        warn!(source_id = %entry.source_id, error = %e, "failed to record zero-chunk state");
                        report.failed += 1;
                        continue;
                    }
                    report.skipped_empty += 1;
                    continue;
                }
                text
            }
        };

        match ingest_one(pool, index.as_ref(), embedder.as_ref(), config, entry, &text).await {
            Ok(chunk_count) => {
                report.ingested += 1;
                report.chunks += chunk_count;
            }
            Err(e) => {
                warn!(source_id = %entry.source_id, error = %e, "ingestion failed; entry left pending");
                report.failed += 1;
            }
        }
    }

    info!(
        scanned = report.scanned,
        pending = report.pending,
        ingested = report.ingested,
        chunks = report.chunks,
        skipped_empty = report.skipped_empty,
        failed = report.failed,
        "sync complete"
    );

    Ok(report)
}

/// Chunk, embed, upsert, and record one entry. Returns the chunk count.
async fn ingest_one(
    pool: &SqlitePool,
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    config: &Config,
    entry: &SourceEntry,
    text: &str,
) -> Result<usize> {
    let texts = chunk_text(
        text,
        config.chunking.chunk_size,
        config.chunking.chunk_overlap,
    )?;

    let mut embeddings: Vec<Vec<f32>> = Vec::with_capacity(texts.len());
    for batch in texts.chunks(config.embedding.batch_size) {
        let vecs = embedder.embed(batch).await?;
        if vecs.len() != batch.len() {
            anyhow::bail!(
                "embedding count mismatch: sent {}, received {}",
                batch.len(),
                vecs.len()
            );
        }
        embeddings.extend(vecs);
    }

    let chunks: Vec<DocumentChunk> = texts
        .into_iter()
        .zip(embeddings)
        .enumerate()
        .map(|(position, (text, embedding))| {
            let position = position as i64;
            DocumentChunk {
                id: chunk_id(&entry.source_id, position),
                source_id: entry.source_id.clone(),
                source_type: entry.source_type,
                title: entry.title.clone(),
                url: entry.url.clone(),
                text,
                position,
                embedding,
            }
        })
        .collect();

    index.upsert(&chunks).await?;

    // Only now is the entry done. Crash before this line and the next
    // run redoes the upsert under the same chunk ids.
    sync_state::record(pool, &entry.source_id, &entry.content_hash).await?;

    Ok(chunks.len())
}

/// Fetch every `Payload::Remote` in `pending`, at most `concurrency` at a
/// time. Returns results keyed by position in `pending`.
async fn fetch_remote(
    pending: &[SourceEntry],
    fetcher: Arc<dyn PageFetcher>,
    concurrency: usize,
) -> HashMap<usize, Result<String>> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut set: JoinSet<(usize, Result<String>)> = JoinSet::new();

    for (i, entry) in pending.iter().enumerate() {
        if let Payload::Remote(url) = &entry.payload {
            let url = url.clone();
            let fetcher = fetcher.clone();
            let semaphore = semaphore.clone();
            set.spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => return (i, Err(anyhow::anyhow!("semaphore closed: {}", e))),
                };
                (i, fetcher.fetch(&url).await)
            });
        }
    }

    let mut results = HashMap::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((i, result)) => {
                results.insert(i, result);
            }
            Err(e) => warn!(error = %e, "fetch task panicked"),
        }
    }
    results
}

/// Truncate to at most `max_chars` characters on a char boundary.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte, _)) => text[..byte].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(source_id: &str, hash: &str) -> SourceEntry {
        SourceEntry {
            source_id: source_id.to_string(),
            source_type: SourceType::Note,
            title: source_id.to_string(),
            url: None,
            content_hash: hash.to_string(),
            payload: Payload::Inline(String::new()),
        }
    }

    #[test]
    fn diff_keeps_new_and_changed_entries() {
        let mut state = HashMap::new();
        state.insert("note:same.md".to_string(), "hash-1".to_string());
        state.insert("note:changed.md".to_string(), "old-hash".to_string());

        let entries = vec![
            entry("note:same.md", "hash-1"),
            entry("note:changed.md", "new-hash"),
            entry("note:new.md", "hash-3"),
        ];

        let pending = diff_pending(entries, &state);
        let ids: Vec<&str> = pending.iter().map(|e| e.source_id.as_str()).collect();
        assert_eq!(ids, vec!["note:changed.md", "note:new.md"]);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("hello", 3), "hel");
        assert_eq!(truncate_chars("hello", 10), "hello");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
    }
}
