//! # Pressroom CLI (`press`)
//!
//! The `press` binary drives the publication workflow and the content
//! store: scrape a page, iterate on an AI rewrite with a human in the
//! loop, publish a final version, and query the resulting lineage.
//!
//! ## Usage
//!
//! ```bash
//! press --config ./config/press.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `press init` | Create the SQLite store and run schema migrations |
//! | `press publish --url <url>` | Run the full scrape → rewrite → review → publish workflow |
//! | `press search "<query>"` | Ranked search over a partition |
//! | `press history <id>` | Show the full lineage for an original |
//! | `press get <partition> <id>` | Fetch one record |
//! | `press delete <partition> <id>` | Delete one record (partition-scoped) |
//! | `press stats` | Partition counts and embedding coverage |
//! | `press serve` | Start the HTTP API server |
//!
//! Without a config file, everything runs on local defaults: SQLite
//! under `data/`, AI and embedding providers disabled (the workflow
//! then passes original content through unchanged).

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use pressroom::agents::{ChatAgents, ContentAgents};
use pressroom::config;
use pressroom::models::Partition;
use pressroom::scrape::HttpScraper;
use pressroom::search::SearchMode;
use pressroom::server;
use pressroom::stats;
use pressroom::store::ContentStore;
use pressroom::ui::{self, TerminalPrompt};
use pressroom::workflow::{run_workflow, WorkflowContext};

/// Pressroom — a human-in-the-loop content rewriting and publication
/// workflow with full version lineage.
#[derive(Parser)]
#[command(
    name = "press",
    about = "Pressroom — scrape, rewrite, review, and publish content with full version lineage",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Built-in defaults apply when
    /// the file does not exist.
    #[arg(long, global = true, default_value = "./config/press.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the store schema.
    ///
    /// Creates the SQLite database and all partitions. Idempotent —
    /// running it multiple times is safe, and every other command
    /// performs the same migration on connect.
    Init,

    /// Run the complete publication workflow for one url.
    ///
    /// Scrapes the page, stores the original, generates an AI draft
    /// when a provider is configured, then hands control to the
    /// interactive review loop before publishing a final version.
    Publish {
        /// Page to scrape and publish.
        #[arg(long)]
        url: String,

        /// Writing style for AI generation.
        #[arg(long, default_value = "modern")]
        style: String,

        /// Tone for AI generation.
        #[arg(long, default_value = "engaging")]
        tone: String,

        /// Override the review-loop iteration budget from config.
        #[arg(long)]
        max_iterations: Option<u32>,
    },

    /// Search records in one partition.
    Search {
        /// The search query string.
        query: String,

        /// Partition to search: original_content, ai_generated,
        /// reviews, or final_versions.
        #[arg(long, default_value = "final_versions")]
        partition: String,

        /// `keyword`, `semantic`, or `hybrid`. Defaults to hybrid when
        /// an embedding provider is configured, keyword otherwise.
        #[arg(long)]
        mode: Option<String>,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<i64>,
    },

    /// Show the full processing lineage for an original document.
    History {
        /// Id of the original record.
        id: String,
    },

    /// Fetch one record by partition and id.
    Get { partition: String, id: String },

    /// Delete one record. Partition-scoped: lineage records in other
    /// partitions are untouched.
    Delete { partition: String, id: String },

    /// Show partition counts and embedding coverage.
    Stats,

    /// Start the HTTP API server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pressroom=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = config::load_or_default(&cli.config)?;

    match cli.command {
        Commands::Init => {
            ContentStore::connect(&config).await?;
            println!("Store initialized at {}", config.db.path.display());
        }

        Commands::Publish {
            url,
            style,
            tone,
            max_iterations,
        } => {
            let store = ContentStore::connect(&config).await?;
            let scraper = HttpScraper::new(&config.scrape)?;
            let agents = ChatAgents::from_config(&config.ai);
            if agents.is_none() {
                println!("AI agents not available — original content will pass through unchanged.");
            }

            let max_iterations = max_iterations.unwrap_or(config.review.max_iterations);
            let preview_chars = config.review.preview_chars;
            let ctx = WorkflowContext {
                config,
                store,
                scraper: Box::new(scraper),
                agents: agents.map(|a| Box::new(a) as Box<dyn ContentAgents>),
            };
            let mut source = TerminalPrompt::new(preview_chars);

            match run_workflow(&ctx, &url, &style, &tone, max_iterations, &mut source).await? {
                Some(record) => {
                    println!();
                    println!("Workflow completed.");
                    println!("  original: {}", record.original_id);
                    if let Some(draft_id) = &record.draft_id {
                        println!("  draft:    {}", draft_id);
                    }
                    println!("  final:    {}", record.final_id);
                }
                None => {
                    println!("Workflow produced no result (cancelled or scrape failed).");
                    std::process::exit(1);
                }
            }
        }

        Commands::Search {
            query,
            partition,
            mode,
            limit,
        } => {
            let store = ContentStore::connect(&config).await?;
            let partition = Partition::from_str(&partition)?;
            let limit = limit.unwrap_or(config.retrieval.final_limit);

            let hits = match mode {
                Some(mode) => {
                    let mode = SearchMode::from_str(&mode)?;
                    store.search_with_mode(partition, &query, mode, limit).await?
                }
                None => store.search(partition, &query, limit).await?,
            };
            ui::print_search_hits(&hits);
        }

        Commands::History { id } => {
            let store = ContentStore::connect(&config).await?;
            match store.history(&id).await? {
                Some(history) => ui::print_history(&history, config.review.preview_chars),
                None => {
                    eprintln!("No original with id: {}", id);
                    std::process::exit(1);
                }
            }
        }

        Commands::Get { partition, id } => {
            let store = ContentStore::connect(&config).await?;
            let partition = Partition::from_str(&partition)?;
            match store.get(partition, &id).await? {
                Some(record) => ui::print_record(&record),
                None => {
                    eprintln!("No record {} in {}", id, partition);
                    std::process::exit(1);
                }
            }
        }

        Commands::Delete { partition, id } => {
            let store = ContentStore::connect(&config).await?;
            let partition = Partition::from_str(&partition)?;
            if store.delete(partition, &id).await? {
                println!("Deleted {} from {}", id, partition);
            } else {
                eprintln!("No record {} in {}", id, partition);
                std::process::exit(1);
            }
        }

        Commands::Stats => {
            stats::run_stats(&config).await?;
        }

        Commands::Serve => {
            let store = ContentStore::connect(&config).await?;
            let scraper = HttpScraper::new(&config.scrape)?;
            let agents = ChatAgents::from_config(&config.ai);
            let ctx = WorkflowContext {
                config,
                store,
                scraper: Box::new(scraper),
                agents: agents.map(|a| Box::new(a) as Box<dyn ContentAgents>),
            };
            server::run_server(Arc::new(ctx)).await?;
        }
    }

    Ok(())
}
