//! Shared fixtures for the integration tests: deterministic stand-ins
//! for the embedding service, the LLM, and the network.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{bail, Result};
use async_trait::async_trait;

use recall::config::{
    BookmarksConfig, ChunkingConfig, Config, DbConfig, EmbeddingConfig, GuardConfig, LlmConfig,
    MemoryConfig, RetrievalConfig, SynthesisConfig,
};
use recall::fetch::PageFetcher;
use recall_core::embedding::Embedder;
use recall_core::error::Error;
use recall_core::llm::Generator;

/// Deterministic hash-based embedder: identical text embeds identically,
/// shared words pull vectors together. Counts embed calls.
pub struct HashEmbedder {
    pub calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn embed_text(text: &str) -> Vec<f32> {
        let mut v = [0f32; 8];
        for word in text.to_lowercase().split_whitespace() {
            for b in word.bytes() {
                v[(b as usize) % 8] += 1.0;
            }
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v.to_vec()
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        "hash-embedder"
    }

    fn dims(&self) -> usize {
        8
    }

    async fn embed(&self, texts: &[String]) -> recall_core::error::Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| Self::embed_text(t)).collect())
    }
}

/// Fetcher serving a fixed URL → body map. Unknown URLs fail, emulating a
/// dead host. Counts fetches so tests can assert what was (not) refetched.
pub struct StaticFetcher {
    pages: HashMap<String, String>,
    pub fetches: AtomicUsize,
}

impl StaticFetcher {
    pub fn new(pages: &[(&str, &str)]) -> Self {
        Self {
            pages: pages
                .iter()
                .map(|(url, body)| (url.to_string(), body.to_string()))
                .collect(),
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageFetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.pages.get(url) {
            Some(body) => Ok(body.clone()),
            None => bail!("connection refused: {}", url),
        }
    }
}

/// Generator replaying a fixed list of responses.
pub struct ScriptedGenerator {
    responses: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(str::to_string).collect()),
        }
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, _system: &str, _prompt: &str) -> recall_core::error::Result<String> {
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(Error::Generation("script exhausted".to_string()));
        }
        Ok(responses.remove(0))
    }
}

/// A config pointing at a temp database, with small limits suitable for
/// short fixture texts.
pub fn test_config(db_path: PathBuf) -> Config {
    Config {
        db: DbConfig { path: db_path },
        notes: None,
        bookmarks: BookmarksConfig {
            enabled: true,
            profile_path: "auto".to_string(),
            fetch_timeout_secs: 5,
            fetch_concurrency: 2,
            max_content_length: 50_000,
            min_content_length: 10,
        },
        chunking: ChunkingConfig {
            chunk_size: 120,
            chunk_overlap: 20,
        },
        retrieval: RetrievalConfig {
            top_k: 5,
            score_threshold: 0.1,
        },
        embedding: EmbeddingConfig {
            model: "hash-embedder".to_string(),
            dims: 8,
            base_url: "http://localhost:0".to_string(),
            batch_size: 16,
            max_retries: 0,
            timeout_secs: 5,
        },
        llm: LlmConfig {
            model: "scripted".to_string(),
            base_url: "http://localhost:0".to_string(),
            max_retries: 0,
            timeout_secs: 5,
        },
        guard: GuardConfig {
            mode: "rules".to_string(),
            max_query_length: 1000,
        },
        memory: MemoryConfig { history_length: 10 },
        synthesis: SynthesisConfig { max_resynthesis: 1 },
    }
}
