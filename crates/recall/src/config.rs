use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    #[serde(default)]
    pub notes: Option<NotesConfig>,
    #[serde(default)]
    pub bookmarks: BookmarksConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub guard: GuardConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotesConfig {
    pub dir: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
}

fn default_include_globs() -> Vec<String> {
    vec!["**/*.md".to_string(), "**/*.txt".to_string()]
}

#[derive(Debug, Deserialize, Clone)]
pub struct BookmarksConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Firefox profile directory, or "auto" to detect the default profile.
    #[serde(default = "default_profile_path")]
    pub profile_path: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,
}

impl Default for BookmarksConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            profile_path: default_profile_path(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            fetch_concurrency: default_fetch_concurrency(),
            max_content_length: default_max_content_length(),
            min_content_length: default_min_content_length(),
        }
    }
}

fn default_profile_path() -> String {
    "auto".to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    15
}
fn default_fetch_concurrency() -> usize {
    4
}
fn default_max_content_length() -> usize {
    50_000
}
fn default_min_content_length() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_score_threshold() -> f32 {
    0.1
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dims: usize,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    pub model: String,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct GuardConfig {
    /// "rules" for the deterministic guard, "llm" for the classifier.
    #[serde(default = "default_guard_mode")]
    pub mode: String,
    #[serde(default = "default_max_query_length")]
    pub max_query_length: usize,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            mode: default_guard_mode(),
            max_query_length: default_max_query_length(),
        }
    }
}

fn default_guard_mode() -> String {
    "llm".to_string()
}
fn default_max_query_length() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_history_length")]
    pub history_length: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            history_length: default_history_length(),
        }
    }
}

fn default_history_length() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct SynthesisConfig {
    #[serde(default = "default_max_resynthesis")]
    pub max_resynthesis: usize,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_resynthesis: default_max_resynthesis(),
        }
    }
}

fn default_max_resynthesis() -> usize {
    1
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate chunking
    if config.chunking.chunk_size == 0 {
        anyhow::bail!("chunking.chunk_size must be > 0");
    }
    if config.chunking.chunk_overlap >= config.chunking.chunk_size {
        anyhow::bail!(
            "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
            config.chunking.chunk_overlap,
            config.chunking.chunk_size
        );
    }

    // Validate retrieval
    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if !(0.0..=1.0).contains(&config.retrieval.score_threshold) {
        anyhow::bail!("retrieval.score_threshold must be in [0.0, 1.0]");
    }

    // Validate embedding
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    // Validate guard
    match config.guard.mode.as_str() {
        "rules" | "llm" => {}
        other => anyhow::bail!("Unknown guard mode: '{}'. Must be rules or llm.", other),
    }
    if config.guard.max_query_length == 0 {
        anyhow::bail!("guard.max_query_length must be > 0");
    }

    // Validate bookmarks
    if config.bookmarks.enabled && config.bookmarks.fetch_concurrency == 0 {
        anyhow::bail!("bookmarks.fetch_concurrency must be >= 1");
    }

    Ok(config)
}
