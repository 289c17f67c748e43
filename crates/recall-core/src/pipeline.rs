//! Query-time pipeline orchestrator.
//!
//! Runs one question through the full stage sequence:
//!
//! ```text
//! input guard -> rewrite -> retrieve -> synthesize -> output guard -> memory
//! ```
//!
//! Every path terminates in a structured [`QueryResult`] — the pipeline
//! never returns an error to the caller. Guard refusals become `Rejected`
//! responses; infrastructure failures (embedding, index, generation,
//! guard backends) become `Fallback` responses with a user-readable
//! message. A rejected or fallback turn is still recorded in the session
//! memory so follow-ups see what happened.

use std::sync::Arc;

use crate::guard::{GuardPolicy, InputVerdict, OutputVerdict};
use crate::llm::Generator;
use crate::memory::ConversationMemory;
use crate::models::{Citation, DocumentChunk, PipelineVerdict, QueryResult, Role, Turn};
use crate::retrieve::{rewrite_followup, Retriever};
use crate::synthesize::synthesize;

/// Refusal shown for injection attempts.
pub const REFUSAL_INJECTION: &str = "I can't help with that request.";
/// Refusal shown for queries unrelated to the knowledge base.
pub const REFUSAL_OFF_TOPIC: &str =
    "That doesn't look like a question about your knowledge base.";
/// Fallback when retrieval infrastructure is unavailable.
pub const FALLBACK_RETRIEVAL: &str =
    "I'm temporarily unable to search your knowledge base. Please try again shortly.";
/// Fallback when synthesis or verification fails.
pub const FALLBACK_UNVERIFIED: &str =
    "I couldn't produce an answer I could verify against your documents. Try rephrasing.";

pub struct PipelineConfig {
    /// How many recent turns feed the follow-up rewriter.
    pub history_window: usize,
    /// How many strict re-synthesis attempts follow an ungrounded answer.
    pub max_resynthesis: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_window: 10,
            max_resynthesis: 1,
        }
    }
}

pub struct Pipeline {
    guard: Arc<dyn GuardPolicy>,
    retriever: Retriever,
    generator: Arc<dyn Generator>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        guard: Arc<dyn GuardPolicy>,
        retriever: Retriever,
        generator: Arc<dyn Generator>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            guard,
            retriever,
            generator,
            config,
        }
    }

    /// Answer one question within a session.
    ///
    /// Infallible by construction: every internal error is converted into
    /// a `Fallback` result before it reaches the caller.
    pub async fn ask(&self, memory: &mut ConversationMemory, query: &str) -> QueryResult {
        match self.guard.classify_input(query).await {
            Ok(InputVerdict::Benign) => {}
            Ok(InputVerdict::PromptInjection) => {
                return self.finish_rejected(memory, query, REFUSAL_INJECTION);
            }
            Ok(InputVerdict::OffTopic) => {
                return self.finish_rejected(memory, query, REFUSAL_OFF_TOPIC);
            }
            Err(_) => {
                // A broken guard must not mean an unguarded answer.
                return self.finish(memory, query, FALLBACK_UNVERIFIED, Vec::new(), PipelineVerdict::Fallback);
            }
        }

        let rewritten = {
            let history = memory.context(self.config.history_window);
            rewrite_followup(self.generator.as_ref(), &history, query).await
        };

        let hits = match self.retriever.retrieve(&rewritten, None).await {
            Ok(hits) => hits,
            Err(_) => {
                return self.finish(
                    memory,
                    query,
                    FALLBACK_RETRIEVAL,
                    Vec::new(),
                    PipelineVerdict::Fallback,
                );
            }
        };

        if hits.is_empty() {
            let (answer, citations) = match synthesize(self.generator.as_ref(), &rewritten, &hits, false).await {
                Ok(out) => out,
                Err(_) => {
                    return self.finish(
                        memory,
                        query,
                        FALLBACK_UNVERIFIED,
                        Vec::new(),
                        PipelineVerdict::Fallback,
                    );
                }
            };
            // Nothing retrieved means nothing to verify or fabricate.
            return self.finish(memory, query, &answer, citations, PipelineVerdict::Accepted);
        }

        let context: Vec<DocumentChunk> = hits.iter().map(|h| h.chunk.clone()).collect();

        let mut strict = false;
        for _ in 0..=self.config.max_resynthesis {
            let (answer, citations) =
                match synthesize(self.generator.as_ref(), &rewritten, &hits, strict).await {
                    Ok(out) => out,
                    Err(_) => break,
                };

            match self.guard.classify_output(&answer, &context).await {
                Ok(OutputVerdict::Grounded) => {
                    return self.finish(
                        memory,
                        query,
                        &answer,
                        citations,
                        PipelineVerdict::Accepted,
                    );
                }
                Ok(OutputVerdict::Ungrounded) => {
                    strict = true;
                }
                Err(_) => break,
            }
        }

        self.finish(
            memory,
            query,
            FALLBACK_UNVERIFIED,
            Vec::new(),
            PipelineVerdict::Fallback,
        )
    }

    fn finish_rejected(
        &self,
        memory: &mut ConversationMemory,
        query: &str,
        refusal: &str,
    ) -> QueryResult {
        memory.append(Turn::new(Role::User, query));
        memory.append(Turn::new(Role::System, refusal));
        QueryResult {
            answer: refusal.to_string(),
            citations: Vec::new(),
            verdict: PipelineVerdict::Rejected,
        }
    }

    fn finish(
        &self,
        memory: &mut ConversationMemory,
        query: &str,
        answer: &str,
        citations: Vec<Citation>,
        verdict: PipelineVerdict,
    ) -> QueryResult {
        memory.append(Turn::new(Role::User, query));
        memory.append(Turn::with_citations(
            Role::Assistant,
            answer,
            citations.clone(),
        ));
        QueryResult {
            answer: answer.to_string(),
            citations,
            verdict,
        }
    }
}
