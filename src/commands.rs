use anyhow::{Context, Result};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::conversation::{SessionState, render};
use crate::corpus::{ensure_sample_corpus, load_documents};
use crate::embeddings::{Embedder, OllamaClient, chunk_documents};
use crate::generation::Generator;
use crate::index::VectorIndex;
use crate::orchestrator::{AnswerOrchestrator, SupportResponse};
use crate::service::{SupportService, serve_stdio};

/// Summary of one ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestStats {
    pub corpus_dir: PathBuf,
    pub seeded_sample: bool,
    pub documents: usize,
    pub chunks: usize,
    pub dimension: usize,
    pub index_path: PathBuf,
}

/// Load configuration from an explicit directory or the default location
#[inline]
pub fn load_config(config_dir: Option<&Path>) -> Result<Config> {
    match config_dir {
        Some(dir) => Config::load_from(dir),
        None => Config::load(),
    }
}

fn connect_ollama(config: &Config) -> Result<Arc<OllamaClient>> {
    let client = OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;
    if let Err(e) = client.health_check() {
        error!("Ollama health check failed: {:#}", e);
        eprintln!(
            "Error: Ollama at {} is not ready: {:#}",
            config.ollama.ollama_url().map_or_else(|_| config.ollama.host.clone(), |u| u.to_string()),
            e
        );
        eprintln!("Use 'support-rag config' to update connection settings.");
        return Err(e);
    }
    Ok(Arc::new(client))
}

fn ingest_progress_bar() -> ProgressBar {
    if console::user_attended_stderr() {
        ProgressBar::new(0).with_style(
            ProgressStyle::with_template("{spinner} [{pos}/{len}] Embedding chunks {wide_bar}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        )
    } else {
        ProgressBar::hidden()
    }
}

/// Chunk the corpus, embed it and persist the index for `config`
///
/// Seeds the sample FAQ when `corpus_dir` does not exist.
#[inline]
pub fn build_index(
    config: &Config,
    corpus_dir: &Path,
    embedder: &dyn Embedder,
    bar: &ProgressBar,
) -> Result<IngestStats> {
    let seeded_sample = ensure_sample_corpus(corpus_dir)
        .with_context(|| format!("Failed to seed sample corpus at {}", corpus_dir.display()))?;
    let documents = load_documents(corpus_dir)
        .with_context(|| format!("Failed to load documents from {}", corpus_dir.display()))?;
    if documents.is_empty() {
        warn!("No .txt documents found in {}", corpus_dir.display());
    }

    let chunks = chunk_documents(&documents, &config.chunking).context("Failed to chunk documents")?;
    info!(
        "Split {} documents into {} chunks",
        documents.len(),
        chunks.len()
    );

    let index = VectorIndex::build_with_progress(chunks, embedder, bar)
        .context("Failed to build vector index")?;
    bar.finish_and_clear();

    let index_path = config.index_path();
    index
        .persist(&index_path)
        .with_context(|| format!("Failed to persist index to {}", index_path.display()))?;

    Ok(IngestStats {
        corpus_dir: corpus_dir.to_path_buf(),
        seeded_sample,
        documents: documents.len(),
        chunks: index.len(),
        dimension: index.dimension(),
        index_path,
    })
}

/// Build the index from the configured (or given) documentation directory
#[inline]
pub fn ingest(config_dir: Option<&Path>, docs: Option<PathBuf>) -> Result<IngestStats> {
    let config = load_config(config_dir)?;
    let corpus_dir = docs.unwrap_or_else(|| config.corpus.directory.clone());
    let client = connect_ollama(&config)?;

    let stats = build_index(&config, &corpus_dir, client.as_ref(), &ingest_progress_bar())?;

    if stats.seeded_sample {
        println!(
            "Created sample documentation at {}",
            style(stats.corpus_dir.display()).cyan()
        );
    }
    println!(
        "{} Indexed {} documents as {} chunks (dimension {})",
        style("✓").green(),
        stats.documents,
        stats.chunks,
        stats.dimension
    );
    println!("Index written to {}", stats.index_path.display());
    Ok(stats)
}

/// Share one Ollama client as both pipeline capabilities
fn capabilities(client: Arc<OllamaClient>) -> (Arc<dyn Embedder>, Arc<dyn Generator>) {
    let embedder: Arc<dyn Embedder> = client.clone();
    (embedder, client)
}

fn orchestrator_for(config: &Config) -> Result<(AnswerOrchestrator, VectorIndex)> {
    let client = connect_ollama(config)?;
    let index = VectorIndex::load(&config.index_path(), client.as_ref()).context(
        "No usable index found; run 'support-rag ingest' first",
    )?;
    let (embedder, generator) = capabilities(client);
    let orchestrator = AnswerOrchestrator::from_config(config, embedder, generator)
        .context("Failed to assemble answer pipeline")?;
    Ok((orchestrator, index))
}

fn print_response(response: &SupportResponse) {
    println!("{}", response.response);
    if response.escalate {
        println!("{}", style("Escalation required!").yellow().bold());
    }
}

/// Answer a single question in a fresh session
#[inline]
pub fn ask(config_dir: Option<&Path>, question: &str) -> Result<SupportResponse> {
    let config = load_config(config_dir)?;
    let (orchestrator, index) = orchestrator_for(&config)?;
    let mut session = SessionState::new();

    let response = orchestrator
        .handle_query(&index, &mut session, question)
        .context("Failed to answer question")?;
    print_response(&response);
    Ok(response)
}

/// Interactive conversation on the terminal
///
/// While escalated, `/agent <text>` plays the human agent and `/resume`
/// returns the session to automated answers.
#[inline]
pub fn chat(config_dir: Option<&Path>) -> Result<()> {
    let config = load_config(config_dir)?;
    let (orchestrator, index) = orchestrator_for(&config)?;
    let mut session = SessionState::new();

    println!("{}", style("Customer Support Assistant").bold().cyan());
    println!("Ask questions about our products or services!");
    println!(
        "{}",
        style("Commands: /agent <reply>, /resume, /history, /quit").dim()
    );

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        let prompt = if session.is_escalated() { "waiting> " } else { "you> " };
        print!("{}", style(prompt).green());
        io::stdout().flush()?;

        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        let outcome = match input.split_once(' ').map_or((input, ""), |(cmd, rest)| (cmd, rest)) {
            ("/quit" | "/exit", _) => break,
            ("/history", _) => {
                print!("{}", render(&session));
                Ok(())
            }
            ("/resume", _) => orchestrator.resume(&mut session).map(|()| {
                println!("{}", style("Returned to automated support.").dim());
            }),
            ("/agent", reply) => orchestrator
                .agent_reply(&mut session, reply.trim())
                .map(|()| println!("{} {}", style("agent>").magenta(), reply.trim())),
            _ => orchestrator
                .handle_query(&index, &mut session, input)
                .map(|response| {
                    print_response(&response);
                    if response.escalate {
                        println!(
                            "{}",
                            style("You've been connected to human support.").dim()
                        );
                    }
                }),
        };

        if let Err(e) = outcome {
            warn!("Chat turn failed: {}", e);
            println!("{} {}", style("error:").red(), e);
        }
    }

    Ok(())
}

/// Serve the line-delimited JSON protocol on stdio
///
/// Refuses to start when no index has been built.
#[inline]
pub async fn serve(config_dir: Option<&Path>) -> Result<()> {
    let config = load_config(config_dir)?;
    let client = connect_ollama(&config)?;
    let (embedder, generator) = capabilities(client);

    let service = match SupportService::start(&config, embedder, generator) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!("Support service failed to start: {}", e);
            eprintln!("Error: {}", e);
            eprintln!("Run 'support-rag ingest' to build the index first.");
            return Err(e.into());
        }
    };

    eprintln!(
        "Support service listening on stdio ({} escalation). Press Ctrl+C to stop.",
        config.escalation.strategy
    );

    tokio::select! {
        result = serve_stdio(Arc::clone(&service)) => {
            result.context("Support service stopped with an error")?;
        }
        _ = tokio::signal::ctrl_c() => {
            eprintln!("Received interrupt signal, shutting down...");
        }
    }

    info!(
        "Shutting down with {} open sessions",
        service.session_count().await
    );
    Ok(())
}

/// Show configuration, model availability and index state
#[inline]
pub fn show_status(config_dir: Option<&Path>) -> Result<()> {
    let config = load_config(config_dir)?;

    println!("{}", style("Support Assistant Status").bold().cyan());
    println!();
    println!("Configuration: {}", config.config_file_path().display());
    println!(
        "Escalation: {} ({} triggers)",
        config.escalation.strategy,
        config.escalation.triggers.len()
    );
    println!(
        "Retrieval: top {} chunks, chunks of {} chars with {} overlap",
        config.retrieval.top_k, config.chunking.max_chunk_size, config.chunking.overlap
    );

    println!();
    println!("{}", style("Ollama:").bold());
    let client = OllamaClient::new(&config.ollama).context("Failed to create Ollama client")?;
    match client.health_check() {
        Ok(()) => println!(
            "   {} Connected; models {} and {} available",
            style("✓").green(),
            config.ollama.embedding_model,
            config.ollama.generation_model
        ),
        Err(e) => println!("   {} {:#}", style("✗").red(), e),
    }

    println!();
    println!("{}", style("Index:").bold());
    let index_path = config.index_path();
    if VectorIndex::exists(&index_path) {
        match VectorIndex::load(&index_path, &client) {
            Ok(index) => {
                println!("   Location: {}", index_path.display());
                println!("   Chunks: {}", index.len());
                println!("   Dimension: {}", index.dimension());
                println!("   Embedding model: {}", index.model());
                println!(
                    "   Built: {}",
                    index.created_at().format("%Y-%m-%d %H:%M:%S UTC")
                );
            }
            Err(e) => println!("   {} {}", style("✗").red(), e),
        }
    } else {
        println!("   No index built yet. Run 'support-rag ingest'.");
    }

    println!();
    println!("{}", style("Corpus:").bold());
    let corpus_dir = &config.corpus.directory;
    match load_documents(corpus_dir) {
        Ok(documents) => println!(
            "   {} documents in {}",
            documents.len(),
            corpus_dir.display()
        ),
        Err(_) => println!(
            "   {} does not exist yet; 'ingest' will create a sample FAQ",
            corpus_dir.display()
        ),
    }

    Ok(())
}
