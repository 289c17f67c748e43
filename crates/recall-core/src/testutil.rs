//! Deterministic test doubles shared by the unit tests in this crate.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::embedding::Embedder;
use crate::error::{Error, Result};
use crate::guard::{GuardPolicy, InputVerdict, OutputVerdict};
use crate::llm::Generator;
use crate::models::DocumentChunk;

/// Hash-based embedder: maps each text to a fixed 8-dim vector derived
/// from its bytes, so identical texts embed identically and texts sharing
/// words land near each other. Counts calls for short-circuit assertions.
pub struct FakeEmbedder {
    pub calls: AtomicUsize,
    fail: bool,
}

impl FakeEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            fail: true,
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
impl Embedder for FakeEmbedder {
    fn model_name(&self) -> &str {
        "fake-embedder"
    }

    fn dims(&self) -> usize {
        8
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Embedding("fake embedder down".to_string()));
        }
        Ok(texts.iter().map(|t| Self::embed_text(t)).collect())
    }
}

/// Generator that replays a fixed script of responses and records every
/// (system, prompt) pair it was called with.
pub struct ScriptedGenerator {
    responses: Mutex<Vec<std::result::Result<String, String>>>,
    pub calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<&str>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(|r| Ok(r.to_string())).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_script(responses: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            responses: Mutex::new(responses),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String> {
        self.calls
            .lock()
            .unwrap()
            .push((system.to_string(), prompt.to_string()));
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(Error::Generation("script exhausted".to_string()));
        }
        responses.remove(0).map_err(Error::Generation)
    }
}

/// Guard that always returns the configured verdicts (or errors) and
/// counts how often each side was consulted.
pub struct StaticGuard {
    input: std::result::Result<InputVerdict, String>,
    output: std::result::Result<OutputVerdict, String>,
    pub input_calls: AtomicUsize,
    pub output_calls: AtomicUsize,
}

impl StaticGuard {
    pub fn new(input: InputVerdict, output: OutputVerdict) -> Self {
        Self {
            input: Ok(input),
            output: Ok(output),
            input_calls: AtomicUsize::new(0),
            output_calls: AtomicUsize::new(0),
        }
    }

    pub fn failing_input() -> Self {
        Self {
            input: Err("guard backend unavailable".to_string()),
            output: Ok(OutputVerdict::Grounded),
            input_calls: AtomicUsize::new(0),
            output_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GuardPolicy for StaticGuard {
    async fn classify_input(&self, _query: &str) -> Result<InputVerdict> {
        self.input_calls.fetch_add(1, Ordering::SeqCst);
        self.input.clone().map_err(Error::Generation)
    }

    async fn classify_output(
        &self,
        _answer: &str,
        _context: &[DocumentChunk],
    ) -> Result<OutputVerdict> {
        self.output_calls.fetch_add(1, Ordering::SeqCst);
        self.output.clone().map_err(Error::Generation)
    }
}
