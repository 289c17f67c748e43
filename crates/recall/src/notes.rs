//! Local notes connector.
//!
//! Walks the configured notes directory and produces one [`SourceEntry`]
//! per matching file. Content hashes are taken over the file bytes, so
//! editing a note marks it pending on the next sync.

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use sha2::{Digest, Sha256};
use tracing::warn;
use walkdir::WalkDir;

use recall_core::models::SourceType;

use crate::config::NotesConfig;
use crate::ingest::{Payload, SourceEntry};

pub fn scan_notes(config: &NotesConfig) -> Result<Vec<SourceEntry>> {
    let root = &config.dir;
    if !root.exists() {
        bail!("Notes directory does not exist: {}", root.display());
    }

    let include_set = build_globset(&config.include_globs)?;

    let mut default_excludes = vec!["**/.git/**".to_string(), "**/node_modules/**".to_string()];
    default_excludes.extend(config.exclude_globs.clone());
    let exclude_set = build_globset(&default_excludes)?;

    let mut entries = Vec::new();

    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if !include_set.is_match(&rel_str) {
            continue;
        }

        // An unreadable file (I/O failure, non-UTF-8 content) is skipped,
        // not scanned as empty: no entry means no state row, so it is
        // retried once it becomes readable.
        let body = match std::fs::read_to_string(path) {
            Ok(body) => body,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "note unreadable; skipped");
                continue;
            }
        };

        let mut hasher = Sha256::new();
        hasher.update(body.as_bytes());
        let content_hash = format!("{:x}", hasher.finalize());

        let title = path
            .file_stem()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| rel_str.clone());

        entries.push(SourceEntry {
            source_id: format!("note:{}", rel_str),
            source_type: SourceType::Note,
            title,
            url: None,
            content_hash,
            payload: Payload::Inline(body),
        });
    }

    // Sort for deterministic ordering
    entries.sort_by(|a, b| a.source_id.cmp(&b.source_id));

    Ok(entries)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern)?);
    }
    Ok(builder.build()?)
}
