//! # Recall
//!
//! Application layer for the Recall knowledge-base assistant: TOML
//! configuration, SQLite storage (sync state + persistent vector index),
//! source connectors (local notes, Firefox bookmarks), HTTP fetching and
//! HTML extraction, the incremental ingestion engine, and
//! OpenAI-compatible embedding/generation providers.
//!
//! The pipeline logic itself lives in [`recall_core`]; this crate wires
//! real I/O into the core's trait seams and exposes the `recall` binary.

pub mod bookmarks;
pub mod config;
pub mod db;
pub mod embedding;
pub mod extract;
pub mod fetch;
pub mod ingest;
pub mod llm;
pub mod notes;
pub mod sqlite_index;
pub mod sync_state;
