//! Retrieval stage: follow-up rewriting plus vector search.
//!
//! Follow-up questions ("what about the second one?") carry pronouns and
//! ellipses that embed poorly on their own, so the stage first rewrites
//! the query into a standalone question using recent conversation turns,
//! then embeds it and queries the index. Rewriting is best-effort: any
//! failure falls back to the original query rather than failing the
//! request.

use std::sync::Arc;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::index::VectorIndex;
use crate::llm::Generator;
use crate::models::{Role, ScoredChunk, SourceType, Turn};

const REWRITE_SYSTEM: &str = "You rewrite follow-up questions into standalone questions. \
Given a conversation history and a new user question, rewrite the question so it can be \
understood without the history. Resolve pronouns and references to earlier answers. \
If the question is already standalone, return it unchanged. \
Return only the rewritten question, nothing else.";

/// Rewrite `query` into a standalone question using the given history.
///
/// Returns the original query when the history is empty, when the
/// generator fails, or when it returns an empty string.
pub async fn rewrite_followup(
    generator: &dyn Generator,
    history: &[&Turn],
    query: &str,
) -> String {
    if history.is_empty() {
        return query.to_string();
    }

    let mut transcript = String::new();
    for turn in history {
        let speaker = match turn.role {
            Role::User => "User",
            Role::Assistant => "Assistant",
            Role::System => "System",
        };
        transcript.push_str(&format!("{}: {}\n", speaker, turn.text));
    }

    let prompt = format!(
        "Conversation so far:\n{}\nNew question: {}\n\nStandalone question:",
        transcript, query
    );

    match generator.generate(REWRITE_SYSTEM, &prompt).await {
        Ok(rewritten) => {
            let rewritten = rewritten.trim();
            if rewritten.is_empty() {
                query.to_string()
            } else {
                rewritten.to_string()
            }
        }
        Err(_) => query.to_string(),
    }
}

/// Embeds a query and searches the index, keeping results at or above
/// the score threshold.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    top_k: usize,
    score_threshold: f32,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        top_k: usize,
        score_threshold: f32,
    ) -> Self {
        Self {
            embedder,
            index,
            top_k,
            score_threshold,
        }
    }

    /// Retrieve the top chunks for `query`. An empty index (or a query
    /// nothing clears the threshold for) yields an empty list.
    pub async fn retrieve(
        &self,
        query: &str,
        source_type: Option<SourceType>,
    ) -> Result<Vec<ScoredChunk>> {
        let vector = self.embedder.embed_one(query).await?;
        let mut hits = self.index.query(&vector, self.top_k, source_type).await?;
        hits.retain(|h| h.score >= self.score_threshold);
        Ok(hits)
    }
}
