mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use sift::config::SiftConfig;

#[derive(Parser)]
#[command(name = "sift", version, about = "Classify, index, and query your notes")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio unless --http or server.transport = "http")
    Serve {
        /// Serve streamable HTTP on server.host:server.port instead of stdio
        #[arg(long)]
        http: bool,
    },
    /// Sync a markdown vault into the knowledge store
    Sync {
        /// Vault directory
        #[arg(required_unless_present = "remove")]
        path: Option<PathBuf>,
        /// Source id to store the notes under
        #[arg(long, default_value = "vault")]
        source: String,
        /// Delete every item of the source instead of syncing
        #[arg(long, conflicts_with = "path")]
        remove: bool,
    },
    /// Semantic search over synced items
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        /// Only return items from this source id
        #[arg(long)]
        source: Option<String>,
        /// Only return items with cosine distance strictly below this value
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Ask a question; the best agent answers it
    Ask {
        query: String,
        /// Chat session id; history is kept per session
        #[arg(long, default_value = "default")]
        session: String,
    },
    /// Classify a single markdown file without storing it
    Classify { file: PathBuf },
    /// Show knowledge store statistics
    Stats,
    /// Check model files and database health
    Doctor,
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.sift/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load config (for log level)
    let config = SiftConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { http } => {
            if http || config.server.transport == "http" {
                server::serve_http(config).await?;
            } else {
                server::serve_stdio(config).await?;
            }
        }
        Command::Sync {
            path,
            source,
            remove,
        } => match path {
            Some(path) if !remove => cli::sync::sync(config, &path, &source).await?,
            _ => cli::sync::remove(config, &source).await?,
        },
        Command::Search {
            query,
            limit,
            source,
            threshold,
        } => cli::search::search(config, &query, limit, source, threshold).await?,
        Command::Ask { query, session } => cli::ask::ask(config, &query, &session).await?,
        Command::Classify { file } => cli::classify::classify(&config, &file).await?,
        Command::Stats => cli::stats::stats(&config)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
    }

    Ok(())
}
