mod cli;
mod server;
mod tools;

use anyhow::Result;
use clap::{Parser, Subcommand};
use lyra::config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lyra", version, about = "Conversation memory with decayed semantic recall")]
struct Cli {
    /// Config file (defaults to ~/.lyra/config.toml)
    #[arg(long, global = true)]
    config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server
    Serve {
        /// Transport: stdio or http (defaults to the configured transport)
        #[arg(long)]
        transport: Option<String>,
    },
    /// Record a (user, bot) turn
    Add {
        user: String,
        bot: String,
        /// Tag to attach; repeatable
        #[arg(long = "tag", short)]
        tags: Vec<String>,
        #[arg(long)]
        conversation: Option<String>,
    },
    /// Show ranked past turns and a summary for a message
    Context {
        query: String,
        #[arg(short)]
        k: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// List the most recent turns
    Recent {
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: usize,
    },
    /// Find turns containing literal text
    Search { text: String },
    /// List turns carrying a tag
    Tagged { tag: String },
    /// Display memory statistics
    Stats {
        #[arg(long)]
        json: bool,
    },
    /// Check the health of every store
    Doctor,
    /// Delete all remembered conversations
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Manage the embedding model
    Model {
        #[command(subcommand)]
        action: ModelAction,
    },
}

#[derive(Subcommand)]
enum ModelAction {
    /// Download the embedding model to ~/.lyra/models/
    Download,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::LyraConfig::load_from(path)?,
        None => config::LyraConfig::load()?,
    };

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve { transport } => {
            let transport = transport.unwrap_or_else(|| config.server.transport.clone());
            match transport.as_str() {
                "stdio" => server::serve_stdio(config).await?,
                "http" => server::serve_http(config).await?,
                other => anyhow::bail!("unknown transport: {other}. Supported: stdio, http"),
            }
        }
        Command::Add {
            user,
            bot,
            tags,
            conversation,
        } => cli::context::add(config, user, bot, tags, conversation).await?,
        Command::Context { query, k, json } => cli::context::context(config, query, k, json).await?,
        Command::Recent { limit } => cli::browse::recent(&config, limit)?,
        Command::Search { text } => cli::browse::search(&config, &text)?,
        Command::Tagged { tag } => cli::browse::tagged(&config, &tag)?,
        Command::Stats { json } => cli::stats::stats(&config, json)?,
        Command::Doctor => cli::doctor::doctor(&config)?,
        Command::Reset { yes } => cli::reset::reset(&config, yes)?,
        Command::Model { action } => match action {
            ModelAction::Download => {
                cli::model_download(&config.embedding).await?;
            }
        },
    }

    Ok(())
}
