//! Firefox bookmark connector.
//!
//! Reads bookmark rows out of a profile's `places.sqlite`. Firefox holds
//! an exclusive lock on the live database while running, so the file is
//! copied to a temp location first and the copy is opened read-only.
//!
//! The content hash covers `(url, title, dateAdded)` — everything the
//! diff needs is known at scan time, before any page is fetched.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;

use recall_core::models::SourceType;

use crate::config::BookmarksConfig;
use crate::ingest::{Payload, SourceEntry};

#[derive(Debug, sqlx::FromRow)]
struct BookmarkRow {
    id: i64,
    url: String,
    title: Option<String>,
    date_added: i64,
}

pub async fn scan_bookmarks(config: &BookmarksConfig) -> Result<Vec<SourceEntry>> {
    let profile = if config.profile_path == "auto" {
        detect_profile()?
    } else {
        PathBuf::from(&config.profile_path)
    };

    let places = profile.join("places.sqlite");
    if !places.exists() {
        bail!("places.sqlite not found in profile: {}", profile.display());
    }

    // Copy aside so an open Firefox instance's lock doesn't block us.
    let snapshot = tempfile::NamedTempFile::new().context("Failed to create temp file")?;
    std::fs::copy(&places, snapshot.path())
        .with_context(|| format!("Failed to copy {}", places.display()))?;

    let rows = read_places(snapshot.path()).await?;
    Ok(rows.into_iter().map(row_to_entry).collect())
}

/// Read bookmark rows from a places database at `path`.
pub async fn read_places(path: &Path) -> Result<Vec<BookmarkEntry>> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", path.display()))?
        .read_only(true);
    let pool = SqlitePool::connect_with(options).await?;

    let rows: Vec<BookmarkRow> = sqlx::query_as(
        r#"
        SELECT b.id AS id, p.url AS url, b.title AS title, b.dateAdded AS date_added
        FROM moz_bookmarks b
        JOIN moz_places p ON b.fk = p.id
        WHERE b.type = 1
          AND p.url NOT LIKE 'place:%'
          AND p.url NOT LIKE 'about:%'
        ORDER BY b.dateAdded
        "#,
    )
    .fetch_all(&pool)
    .await
    .context("Failed to read bookmarks from places.sqlite")?;

    pool.close().await;

    Ok(rows
        .into_iter()
        .map(|r| BookmarkEntry {
            id: r.id,
            url: r.url,
            title: r.title.unwrap_or_default(),
            date_added: r.date_added,
        })
        .collect())
}

/// One bookmark as read from Firefox, before it becomes a [`SourceEntry`].
#[derive(Debug, Clone)]
pub struct BookmarkEntry {
    pub id: i64,
    pub url: String,
    pub title: String,
    pub date_added: i64,
}

fn row_to_entry(row: BookmarkEntry) -> SourceEntry {
    let mut hasher = Sha256::new();
    hasher.update(row.url.as_bytes());
    hasher.update(b"|");
    hasher.update(row.title.as_bytes());
    hasher.update(b"|");
    hasher.update(row.date_added.to_le_bytes());
    let content_hash = format!("{:x}", hasher.finalize());

    let title = if row.title.is_empty() {
        row.url.clone()
    } else {
        row.title
    };

    SourceEntry {
        source_id: format!("bookmark:{}", row.id),
        source_type: SourceType::Bookmark,
        title,
        url: Some(row.url.clone()),
        content_hash,
        payload: Payload::Remote(row.url),
    }
}

/// Locate the default Firefox profile directory for this platform.
///
/// Preference order: a profile directory named `*.default-release`, then
/// `*.default`, then any directory that contains a `places.sqlite`.
pub fn detect_profile() -> Result<PathBuf> {
    let profiles_root = firefox_profiles_root()
        .ok_or_else(|| anyhow::anyhow!("Could not determine the Firefox profiles directory"))?;
    if !profiles_root.exists() {
        bail!(
            "Firefox profiles directory not found: {}",
            profiles_root.display()
        );
    }

    let mut fallback: Option<PathBuf> = None;
    let mut default: Option<PathBuf> = None;
    let mut default_release: Option<PathBuf> = None;

    for entry in std::fs::read_dir(&profiles_root)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();

        if name.ends_with(".default-release") {
            default_release = Some(path);
        } else if name.ends_with(".default") {
            default = Some(path);
        } else if fallback.is_none() && path.join("places.sqlite").exists() {
            fallback = Some(path);
        }
    }

    default_release
        .or(default)
        .or(fallback)
        .ok_or_else(|| {
            anyhow::anyhow!(
                "No Firefox profile found under {}",
                profiles_root.display()
            )
        })
}

#[cfg(target_os = "linux")]
fn firefox_profiles_root() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".mozilla/firefox"))
}

#[cfg(target_os = "macos")]
fn firefox_profiles_root() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join("Library/Application Support/Firefox/Profiles"))
}

#[cfg(target_os = "windows")]
fn firefox_profiles_root() -> Option<PathBuf> {
    dirs::data_dir().map(|data| data.join("Mozilla/Firefox/Profiles"))
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn firefox_profiles_root() -> Option<PathBuf> {
    None
}
