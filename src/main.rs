//! # Keyword Scout CLI (`kscout`)
//!
//! ## Usage
//!
//! ```bash
//! kscout --config ./config/kscout.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `kscout init` | Create the SQLite database and run schema migrations |
//! | `kscout serve` | Start the HTTP API |
//! | `kscout research <keyword>` | Composite analysis of one keyword |
//! | `kscout bulk <seed>` | Breadth-first research through related terms |
//! | `kscout show <category> <keyword>` | Stored data for one category |
//! | `kscout history` | Search history, newest first |
//! | `kscout clear` | Clear history and data, or only cached reports |
//! | `kscout credentials <status\|test>` | Inspect vendor credentials |
//!
//! Every command except `init` and `serve` prints JSON on stdout. Logs go
//! to stderr, filtered by `RUST_LOG`.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use keyword_scout::app::AppContext;
use keyword_scout::bulk::BulkRequest;
use keyword_scout::config::{self, DispatchMode};
use keyword_scout::research::ResearchOptions;
use keyword_scout::{migrate, server};

/// Keyword Scout: keyword research from search volume, competition, trends,
/// related terms and tag suggestions.
#[derive(Parser)]
#[command(name = "kscout", version, about)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/kscout.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema. Idempotent.
    Init,

    /// Start the HTTP API on `[server].bind`.
    Serve,

    /// Research one keyword and print the composite report.
    Research {
        keyword: String,

        /// Refetch every category, ignoring cached reports and fresh data.
        #[arg(long)]
        force: bool,
    },

    /// Research keywords reachable from a seed through related terms.
    Bulk {
        seed: String,

        /// Number of keywords to research.
        #[arg(long, default_value = "10")]
        count: usize,
    },

    /// Print stored data of one category.
    Show {
        #[arg(value_enum)]
        category: ShowCategory,
        keyword: String,
    },

    /// List search history, most recent first.
    History {
        #[arg(long)]
        prefix: Option<String>,

        #[arg(long, default_value = "50")]
        limit: usize,
    },

    /// Clear search history and stored data.
    Clear {
        /// Only clear this keyword.
        #[arg(long)]
        keyword: Option<String>,

        /// Only clear cached reports.
        #[arg(long)]
        cache_only: bool,
    },

    /// Inspect vendor credentials.
    Credentials {
        #[command(subcommand)]
        action: CredentialAction,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ShowCategory {
    Metrics,
    Trends,
    Related,
    Tags,
}

#[derive(Subcommand)]
enum CredentialAction {
    /// Show which credentials are set (masked).
    Status,
    /// Issue one search request with the current credentials.
    Test,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("keyword_scout=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let mut cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Serve => {
            let ctx = Arc::new(AppContext::open(&cfg).await?);
            server::run_server(ctx).await?;
        }
        command => {
            // One-shot commands exit right after responding; queued refreshes would be lost.
            cfg.research.mode = DispatchMode::Inline;
            let ctx = AppContext::open(&cfg).await?;
            run_command(&ctx, command).await?;
        }
    }

    Ok(())
}

async fn run_command(ctx: &AppContext, command: Commands) -> Result<()> {
    let research = &ctx.research;
    match command {
        Commands::Research { keyword, force } => {
            let options = ResearchOptions {
                force_refresh: force,
                ..Default::default()
            };
            print_json(&research.research(&keyword, options).await?)?;
        }
        Commands::Bulk { seed, count } => {
            let request = BulkRequest {
                initial_keyword: seed,
                search_count: count,
            };
            print_json(&research.bulk_research(&request, ctx.config.research.bulk_max).await?)?;
        }
        Commands::Show { category, keyword } => match category {
            ShowCategory::Metrics => print_json(&research.metrics(&keyword).await?)?,
            ShowCategory::Trends => print_json(&research.trends(&keyword).await?)?,
            ShowCategory::Related => print_json(&research.related(&keyword).await?)?,
            ShowCategory::Tags => print_json(&research.tags(&keyword).await?)?,
        },
        Commands::History { prefix, limit } => {
            print_json(&research.history(prefix.as_deref(), limit).await?)?;
        }
        Commands::Clear { keyword, cache_only } => {
            let removed = if cache_only {
                match keyword.as_deref() {
                    Some(k) => {
                        let k = keyword_scout::research::require_keyword(k)?;
                        ctx.store.clear_reports(Some(&k)).await?
                    }
                    None => research.clear_cache().await?,
                }
            } else {
                research.clear_history(keyword.as_deref()).await?
            };
            print_json(&serde_json::json!({ "removed": removed }))?;
        }
        Commands::Credentials { action } => match action {
            CredentialAction::Status => print_json(&ctx.credentials.status())?,
            CredentialAction::Test => print_json(&ctx.naver.verify_credentials().await)?,
        },
        Commands::Init | Commands::Serve => {}
    }
    Ok(())
}
