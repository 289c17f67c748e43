//! # Recall CLI (`recall`)
//!
//! The `recall` binary is the interface to the Recall knowledge-base
//! assistant: database initialization, incremental ingestion of notes and
//! Firefox bookmarks, one-shot questions, and an interactive chat session.
//!
//! ## Usage
//!
//! ```bash
//! recall --config ./config/recall.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `recall init` | Create the SQLite database and schema |
//! | `recall sync <notes\|bookmarks\|all>` | Incrementally ingest sources |
//! | `recall ask "<question>"` | Answer a single question with citations |
//! | `recall chat` | Interactive session with conversation memory |
//! | `recall status` | Show index and sync-state counts |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! recall init --config ./config/recall.toml
//!
//! # Ingest notes and bookmarks
//! recall sync all --config ./config/recall.toml
//!
//! # See what a sync would do without writing
//! recall sync bookmarks --dry-run --config ./config/recall.toml
//!
//! # Ask a one-shot question
//! recall ask "what did I save about rust async runtimes?"
//!
//! # Chat with follow-up questions
//! recall chat
//! ```

use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tracing_subscriber::EnvFilter;

use recall_core::embedding::Embedder;
use recall_core::index::VectorIndex;
use recall_core::llm::Generator;
use recall_core::memory::ConversationMemory;
use recall_core::models::{PipelineVerdict, QueryResult};
use recall_core::pipeline::{Pipeline, PipelineConfig};
use recall_core::retrieve::Retriever;

use recall::bookmarks;
use recall::config::{self, Config};
use recall::db;
use recall::embedding::OpenAiEmbedder;
use recall::fetch::{HttpFetcher, PageFetcher};
use recall::ingest::{self, SourceEntry, SyncOptions, SyncReport};
use recall::llm::{build_guard, OpenAiGenerator};
use recall::notes;
use recall::sqlite_index::SqliteIndex;
use recall::sync_state;

/// Recall — ask questions over your notes and Firefox bookmarks.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/recall.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "recall",
    about = "Recall — a retrieval-augmented QA assistant over your notes and Firefox bookmarks",
    version,
    long_about = "Recall ingests local notes and the content behind your Firefox bookmarks into \
    a local SQLite vector index, then answers questions about them with citations. Answers are \
    guarded: queries are screened before retrieval and answers are verified against the \
    retrieved context before they are shown."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/recall.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file, the sync-state table, and the
    /// chunk index. Idempotent — running it multiple times is safe.
    Init,

    /// Incrementally ingest sources into the index.
    ///
    /// Scans the requested sources, diffs against the sync state, and
    /// processes only new or changed entries. Bookmark pages are fetched
    /// concurrently; individual failures leave that entry pending for the
    /// next run.
    Sync {
        /// Which sources to sync: `notes`, `bookmarks`, or `all`.
        source: String,

        /// Ignore the sync state — reingest everything from scratch.
        #[arg(long)]
        full: bool,

        /// Show pending counts without fetching or writing.
        #[arg(long)]
        dry_run: bool,

        /// Maximum number of pending entries to process.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Ask a single question and print the answer with citations.
    Ask {
        /// The question to answer from your knowledge base.
        question: String,
    },

    /// Start an interactive chat session.
    ///
    /// Turns share one conversation memory, so follow-up questions
    /// ("what about the second one?") are resolved against earlier
    /// answers. Type `exit` or press Ctrl-D to leave.
    Chat,

    /// Show index and sync-state counts.
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            db::init(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Sync {
            source,
            full,
            dry_run,
            limit,
        } => {
            run_sync(&cfg, &source, SyncOptions { full, dry_run, limit }).await?;
        }
        Commands::Ask { question } => {
            let (pipeline, pool) = build_pipeline(&cfg).await?;
            let session = uuid::Uuid::new_v4();
            tracing::debug!(session = %session, "one-shot session");
            let mut memory = ConversationMemory::new(cfg.memory.history_length);
            let result = pipeline.ask(&mut memory, &question).await;
            print_result(&result);
            pool.close().await;
        }
        Commands::Chat => {
            run_chat(&cfg).await?;
        }
        Commands::Status => {
            let pool = db::connect(&cfg.db.path).await?;
            db::init(&pool).await?;
            let index = SqliteIndex::new(pool.clone());
            let chunks = index.count().await?;
            let notes = sync_state::count(&pool, Some("note:")).await?;
            let bookmarks = sync_state::count(&pool, Some("bookmark:")).await?;
            println!("status");
            println!("  indexed chunks: {}", chunks);
            println!("  synced notes: {}", notes);
            println!("  synced bookmarks: {}", bookmarks);
            pool.close().await;
        }
    }

    Ok(())
}

struct SyncProviders {
    index: Arc<dyn VectorIndex>,
    embedder: Arc<dyn Embedder>,
    fetcher: Arc<dyn PageFetcher>,
}

async fn run_sync(cfg: &Config, source: &str, options: SyncOptions) -> Result<()> {
    match source {
        "notes" | "bookmarks" | "all" => {}
        other => bail!("Unknown source: '{}'. Available: notes, bookmarks, all", other),
    }

    let pool = db::connect(&cfg.db.path).await?;
    db::init(&pool).await?;

    // A dry run only diffs against the sync state, so it needs neither an
    // embedding key nor a network client.
    let providers = if options.dry_run {
        None
    } else {
        Some(SyncProviders {
            index: Arc::new(SqliteIndex::new(pool.clone())),
            embedder: Arc::new(OpenAiEmbedder::new(&cfg.embedding)?),
            fetcher: Arc::new(HttpFetcher::new(cfg.bookmarks.fetch_timeout_secs)?),
        })
    };

    if source == "notes" || source == "all" {
        match &cfg.notes {
            Some(notes_cfg) => {
                let entries = notes::scan_notes(notes_cfg)?;
                sync_source(&pool, providers.as_ref(), cfg, "notes", entries, &options).await?;
            }
            None if source == "notes" => bail!("Notes are not configured ([notes] section missing)"),
            None => {}
        }
    }

    if source == "bookmarks" || source == "all" {
        if cfg.bookmarks.enabled {
            let entries = bookmarks::scan_bookmarks(&cfg.bookmarks).await?;
            sync_source(&pool, providers.as_ref(), cfg, "bookmarks", entries, &options).await?;
        } else if source == "bookmarks" {
            bail!("Bookmarks are not enabled (set bookmarks.enabled = true)");
        }
    }

    println!("ok");
    pool.close().await;
    Ok(())
}

async fn sync_source(
    pool: &SqlitePool,
    providers: Option<&SyncProviders>,
    cfg: &Config,
    label: &str,
    entries: Vec<SourceEntry>,
    options: &SyncOptions,
) -> Result<()> {
    let report = match providers {
        Some(p) => {
            ingest::sync_entries(
                pool,
                p.index.clone(),
                p.embedder.clone(),
                p.fetcher.clone(),
                cfg,
                entries,
                options,
            )
            .await?
        }
        None => ingest::plan_entries(pool, entries, options).await,
    };
    print_report(label, &report, options.dry_run);
    Ok(())
}

fn print_report(source: &str, report: &SyncReport, dry_run: bool) {
    if dry_run {
        println!("sync {} (dry-run)", source);
        println!("  scanned: {}", report.scanned);
        println!("  pending: {}", report.pending);
        return;
    }
    println!("sync {}", source);
    println!("  scanned: {}", report.scanned);
    println!("  pending: {}", report.pending);
    println!("  ingested: {}", report.ingested);
    println!("  chunks written: {}", report.chunks);
    println!("  skipped (empty): {}", report.skipped_empty);
    println!("  failed: {}", report.failed);
}

async fn build_pipeline(cfg: &Config) -> Result<(Pipeline, SqlitePool)> {
    let pool = db::connect(&cfg.db.path).await?;
    db::init(&pool).await?;

    let index: Arc<dyn VectorIndex> = Arc::new(SqliteIndex::new(pool.clone()));
    let embedder: Arc<dyn Embedder> = Arc::new(OpenAiEmbedder::new(&cfg.embedding)?);
    let generator: Arc<dyn Generator> = Arc::new(OpenAiGenerator::new(&cfg.llm)?);
    let guard = build_guard(&cfg.guard, generator.clone());

    let retriever = Retriever::new(
        embedder,
        index,
        cfg.retrieval.top_k,
        cfg.retrieval.score_threshold,
    );

    let pipeline = Pipeline::new(
        guard,
        retriever,
        generator,
        PipelineConfig {
            history_window: cfg.memory.history_length,
            max_resynthesis: cfg.synthesis.max_resynthesis,
        },
    );

    Ok((pipeline, pool))
}

async fn run_chat(cfg: &Config) -> Result<()> {
    let (pipeline, pool) = build_pipeline(cfg).await?;
    let session = uuid::Uuid::new_v4();
    tracing::debug!(session = %session, "chat session started");
    let mut memory = ConversationMemory::new(cfg.memory.history_length);

    println!("recall chat — type 'exit' to leave");
    let stdin = std::io::stdin();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break; // EOF
        }
        let question = line.trim();
        if question.is_empty() {
            continue;
        }
        if question == "exit" || question == "quit" {
            break;
        }

        let result = pipeline.ask(&mut memory, question).await;
        print_result(&result);
    }

    pool.close().await;
    Ok(())
}

fn print_result(result: &QueryResult) {
    println!("{}", result.answer);
    if !result.citations.is_empty() {
        println!();
        println!("sources:");
        for (i, citation) in result.citations.iter().enumerate() {
            match &citation.url {
                Some(url) => println!("  [{}] {} ({})", i + 1, citation.title, url),
                None => println!("  [{}] {}", i + 1, citation.title),
            }
        }
    }
    match result.verdict {
        PipelineVerdict::Accepted => {}
        PipelineVerdict::Rejected => println!("(query rejected)"),
        PipelineVerdict::Fallback => println!("(fallback response)"),
    }
}
