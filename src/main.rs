use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cmd;

#[derive(Parser)]
#[command(name = "mnemo")]
#[command(
    version,
    about = "Hierarchical response cache and context budgeting engine"
)]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Cache root directory. Overrides mnemo.toml and the platform default.
    #[arg(long, global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Path to the config file. Defaults to ./mnemo.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store content at a cache level
    Store {
        /// Cache level: raw, structured, summary, meta (or 0-3)
        #[arg(short, long, default_value = "raw")]
        level: String,
        /// Tag to attach (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        /// Parent entry id, one level below
        #[arg(long)]
        parent: Option<String>,
        /// Tokens consumed producing the content
        #[arg(long)]
        tokens: Option<u32>,
        /// Content to store; read from stdin when omitted
        content: Option<String>,
    },
    /// Fetch one entry by id
    Get {
        #[arg(short, long, default_value = "raw")]
        level: String,
        id: String,
    },
    /// Similarity search within a level
    Search {
        #[arg(short, long, default_value = "raw")]
        level: String,
        /// Minimum similarity score
        #[arg(long)]
        threshold: Option<f32>,
        /// Restrict to entries carrying this tag (repeatable)
        #[arg(short, long = "tag")]
        tags: Vec<String>,
        query: String,
    },
    /// List entries carrying every given tag
    Tags {
        #[arg(short, long, default_value = "raw")]
        level: String,
        #[arg(required = true)]
        tags: Vec<String>,
    },
    /// Show the ancestor/child chain through an entry
    Hierarchy {
        #[arg(short, long, default_value = "raw")]
        level: String,
        id: String,
    },
    /// Delete one entry
    Invalidate {
        #[arg(short, long, default_value = "raw")]
        level: String,
        id: String,
    },
    /// Evict entries older than the retention age and rebuild indexes
    Cleanup {
        /// Maximum entry age in days. Overrides mnemo.toml
        #[arg(long)]
        max_age_days: Option<u32>,
    },
    /// Per-level entry counts and sizes
    Stats,
    /// Fit a message history (JSON file) into a token budget
    Optimize {
        /// JSON file holding an array of messages
        file: PathBuf,
        /// Token budget. Defaults to the model's context budget
        #[arg(long)]
        max_tokens: Option<usize>,
        /// Model whose catalog entry supplies the default budget
        #[arg(long)]
        model: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "mnemo=debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    match &cli.command {
        Commands::Store {
            level,
            tags,
            parent,
            tokens,
            content,
        } => {
            cmd::cmd_store(
                &cli,
                level,
                tags,
                parent.as_deref(),
                *tokens,
                content.as_deref(),
            )
            .await?;
        }
        Commands::Get { level, id } => {
            cmd::cmd_get(&cli, level, id).await?;
        }
        Commands::Search {
            level,
            threshold,
            tags,
            query,
        } => {
            cmd::cmd_search(&cli, level, *threshold, tags, query).await?;
        }
        Commands::Tags { level, tags } => {
            cmd::cmd_tags(&cli, level, tags).await?;
        }
        Commands::Hierarchy { level, id } => {
            cmd::cmd_hierarchy(&cli, level, id).await?;
        }
        Commands::Invalidate { level, id } => {
            cmd::cmd_invalidate(&cli, level, id).await?;
        }
        Commands::Cleanup { max_age_days } => {
            cmd::cmd_cleanup(&cli, *max_age_days).await?;
        }
        Commands::Stats => {
            cmd::cmd_stats(&cli).await?;
        }
        Commands::Optimize {
            file,
            max_tokens,
            model,
        } => {
            cmd::cmd_optimize(&cli, file, *max_tokens, model.as_deref()).await?;
        }
    }

    Ok(())
}
