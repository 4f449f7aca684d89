use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use support_rag::commands::{ask, chat, ingest, serve, show_status};
use support_rag::config::{run_interactive_config, show_config};

#[derive(Parser)]
#[command(name = "support-rag")]
#[command(about = "A customer support assistant that answers from product documentation")]
#[command(version)]
struct Cli {
    /// Use this configuration directory instead of ~/.support-rag
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection and settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Chunk and embed the documentation corpus into the index
    Ingest {
        /// Directory of .txt documents (defaults to the configured corpus directory)
        #[arg(long)]
        docs: Option<PathBuf>,
    },
    /// Answer a single question
    Ask {
        /// The customer question
        question: String,
    },
    /// Start an interactive support conversation
    Chat,
    /// Serve the JSON-lines support protocol on stdio
    Serve,
    /// Show configuration, model and index status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config_dir = cli.config_dir.as_deref();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config(config_dir)?;
            } else {
                run_interactive_config(config_dir)?;
            }
        }
        Commands::Ingest { docs } => {
            ingest(config_dir, docs)?;
        }
        Commands::Ask { question } => {
            ask(config_dir, &question)?;
        }
        Commands::Chat => {
            chat(config_dir)?;
        }
        Commands::Serve => {
            serve(config_dir).await?;
        }
        Commands::Status => {
            show_status(config_dir)?;
        }
    }

    Ok(())
}
