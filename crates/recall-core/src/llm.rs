//! Text generation boundary.
//!
//! The [`Generator`] trait is the single seam through which the query
//! rewriter, the synthesis stage, and the LLM-backed guard reach a
//! language model. The app crate provides an OpenAI-compatible
//! implementation; tests use scripted doubles.

use async_trait::async_trait;

use crate::error::Result;

/// Trait for chat-completion providers.
///
/// `system` sets the model's instructions for the call; `prompt` is the
/// user-role message. Implementations are expected to request
/// deterministic output (temperature 0) so guard and synthesis behavior
/// is reproducible.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String>;
}
