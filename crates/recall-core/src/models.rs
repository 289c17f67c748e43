//! Core data models used throughout Recall.
//!
//! These types represent the chunks, conversation turns, citations, and
//! query results that flow through the ingestion and query pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a piece of content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Note,
    Bookmark,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Note => write!(f, "note"),
            SourceType::Bookmark => write!(f, "bookmark"),
        }
    }
}

/// A bounded slice of a source document's text — the unit of embedding
/// and retrieval.
///
/// `position` is 0-based and contiguous within a `source_id`. The id is
/// deterministic (`"{source_id}#{position}"`), which makes index upserts
/// idempotent across re-ingestion of the same source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub source_id: String,
    pub source_type: SourceType,
    pub title: String,
    pub url: Option<String>,
    pub text: String,
    pub position: i64,
    pub embedding: Vec<f32>,
}

/// Deterministic chunk id: stable across runs for the same source and
/// position, so re-indexing an already-indexed source replaces rather
/// than duplicates.
pub fn chunk_id(source_id: &str, position: i64) -> String {
    format!("{}#{}", source_id, position)
}

/// A chunk paired with its similarity score from a vector query.
#[derive(Debug, Clone)]
pub struct ScoredChunk {
    pub chunk: DocumentChunk,
    pub score: f32,
}

/// A structured reference attached to an answer, pointing at the chunk
/// the claim came from. Only ever built from chunks that were actually
/// passed into synthesis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub title: String,
    pub url: Option<String>,
    pub chunk_id: String,
}

/// Speaker role within a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One entry in a session's conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Citation>,
}

impl Turn {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
            citations: Vec::new(),
        }
    }

    pub fn with_citations(role: Role, text: impl Into<String>, citations: Vec<Citation>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: Utc::now(),
            citations,
        }
    }
}

/// Terminal outcome of one trip through the query pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineVerdict {
    /// The answer passed both guards.
    Accepted,
    /// The input guard refused the query before retrieval.
    Rejected,
    /// Synthesis could not be verified (or an external service failed);
    /// an explicit fallback message was returned instead.
    Fallback,
}

/// The unit returned to the caller for every query — the pipeline never
/// surfaces a raw error.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub answer: String,
    pub citations: Vec<Citation>,
    pub verdict: PipelineVerdict,
}
