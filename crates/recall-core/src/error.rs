//! Error taxonomy for the pipeline stages.
//!
//! Every failure class the pipeline recovers from has a variant here, so
//! callers can match on the *kind* of failure instead of string-inspecting
//! an opaque error. The application crate wraps these in `anyhow` at its
//! outer edges; the query pipeline itself never lets one escape to the
//! caller — failures become structured fallback responses (see
//! [`crate::pipeline`]).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Bad startup parameters (chunking config, query limits). Fatal at
    /// startup, never recovered at runtime.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Embedding service failure (ingestion: the entry stays pending;
    /// query: surfaced as a graceful retrieval fallback).
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// Vector index failure.
    #[error("index operation failed: {0}")]
    Index(String),

    /// LLM failure: generation, rewriting, or an LLM-backed guard that
    /// returned something unparseable.
    #[error("generation failed: {0}")]
    Generation(String),
}

pub type Result<T> = std::result::Result<T, Error>;
