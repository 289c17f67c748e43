//! # Recall Core
//!
//! Shared logic for Recall, a retrieval-augmented question-answering
//! pipeline over a personal document corpus: data models, chunking,
//! conversation memory, guard policies, the vector index abstraction,
//! embedding and generation traits, and the query-time pipeline.
//!
//! This crate contains no tokio, sqlx, filesystem I/O, or network
//! dependencies. External services (embedding model, LLM, persistent
//! vector store) enter through the [`embedding::Embedder`],
//! [`llm::Generator`], [`guard::GuardPolicy`], and [`index::VectorIndex`]
//! traits, so every stage can be tested with deterministic doubles.

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod guard;
pub mod index;
pub mod llm;
pub mod memory;
pub mod models;
pub mod pipeline;
pub mod retrieve;
pub mod synthesize;

#[cfg(test)]
pub(crate) mod testutil;
