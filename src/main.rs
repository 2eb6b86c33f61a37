//! # insightd CLI
//!
//! The `insightd` binary runs the daily insight pipeline and its operational
//! escape hatches.
//!
//! ## Usage
//!
//! ```bash
//! insightd --config ./config/insightd.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `insightd init` | Create the SQLite database and run schema migrations |
//! | `insightd run` | Run the full pipeline: fetch → analyze → deliver |
//! | `insightd fetch` | Poll sources and store new records only |
//! | `insightd analyze` | Drain the unanalyzed backlog only |
//! | `insightd deliver` | Deliver pending insights only |
//! | `insightd sources` | List configured sources |
//! | `insightd articles` | List recent records and their analysis status |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! insightd init --config ./config/insightd.toml
//!
//! # The daily invocation (cron-friendly, no required flags)
//! insightd run
//!
//! # Re-drive a stage by hand after an incident
//! insightd deliver
//! ```
//!
//! Exit code is 0 unless a storage fault aborts the run; item-level and
//! source-level failures are logged and reported in the summary only.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use insightd::analysis;
use insightd::analyze;
use insightd::articles;
use insightd::config;
use insightd::db;
use insightd::delivery::{self, DelivererRegistry};
use insightd::fetch;
use insightd::insight_store::InsightStore;
use insightd::migrate;
use insightd::record_store::RecordStore;
use insightd::retry::RetryPolicy;
use insightd::run;
use insightd::sources::{self, SourceRegistry};

/// insightd — a daily insight pipeline.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/insightd.example.toml` for a full example. Secrets
/// (analysis API key, webhook credentials) come from the environment or a
/// `.env` file.
#[derive(Parser)]
#[command(
    name = "insightd",
    about = "insightd — fetch, analyze, and deliver daily insights from content sources",
    version,
    long_about = "insightd runs a daily batch pipeline: poll content sources (arXiv, Hacker News), \
    deduplicate and persist candidate records, analyze the backlog through a text-analysis \
    provider, and deliver the structured insights through configured channels."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/insightd.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and both pipeline tables. This
    /// command is idempotent — running it multiple times is safe.
    Init,

    /// Run the full pipeline once: fetch, analyze, deliver.
    ///
    /// The daily entrypoint. Prints a per-stage summary; exits nonzero only
    /// on a storage fault.
    Run,

    /// Poll configured sources and store new records (fetch stage only).
    Fetch,

    /// Analyze the unanalyzed backlog (analysis stage only).
    ///
    /// Requires `[analysis]` to be configured with a provider and model.
    Analyze,

    /// Deliver pending insights (delivery stage only).
    Deliver,

    /// List configured sources and their status.
    Sources,

    /// List recent records and their analysis status.
    Articles {
        /// Maximum number of records to list.
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("insightd=info".parse()?))
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.storage.path).await?;
            migrate::run_migrations(&pool).await?;
            println!("Database initialized successfully.");
        }
        Commands::Run => {
            let pool = db::connect(&cfg.storage.path).await?;
            migrate::run_migrations(&pool).await?;
            let summary = run::run_pipeline(&cfg, &pool).await?;
            run::print_summary(&summary);
        }
        Commands::Fetch => {
            let pool = db::connect(&cfg.storage.path).await?;
            migrate::run_migrations(&pool).await?;
            let records = RecordStore::new(pool.clone());
            let registry = SourceRegistry::from_config(&cfg);
            let retry = RetryPolicy::from_config(&cfg.retry);
            let counts =
                fetch::run_fetch(&records, &registry, cfg.fetch.concurrency, retry).await?;

            println!("fetch");
            if counts.is_empty() {
                println!("  no sources configured");
            }
            for (source, c) in &counts {
                println!(
                    "  {}: {} fetched, {} new, {} failed",
                    source, c.fetched, c.new, c.failed
                );
            }
            println!("ok");
        }
        Commands::Analyze => {
            if !cfg.analysis.is_enabled() {
                anyhow::bail!("Analysis provider is disabled. Set [analysis] provider in config.");
            }
            let pool = db::connect(&cfg.storage.path).await?;
            migrate::run_migrations(&pool).await?;
            let records = RecordStore::new(pool.clone());
            let insights = InsightStore::new(pool.clone());
            let provider = analysis::create_provider(&cfg.analysis)?;
            let retry = RetryPolicy::from_config(&cfg.retry);
            let counts =
                analyze::run_analyze(&records, &insights, provider.as_ref(), &cfg.analysis, retry)
                    .await?;

            println!("analyze");
            println!("  analyzed: {}", counts.analyzed);
            println!("  skipped: {}", counts.skipped);
            println!("  abandoned: {}", counts.abandoned);
            println!("ok");
        }
        Commands::Deliver => {
            let pool = db::connect(&cfg.storage.path).await?;
            migrate::run_migrations(&pool).await?;
            let records = RecordStore::new(pool.clone());
            let insights = InsightStore::new(pool.clone());
            let registry = DelivererRegistry::from_config(&cfg);
            let retry = RetryPolicy::from_config(&cfg.retry);
            let counts = delivery::run_delivery(
                &records,
                &insights,
                &registry,
                cfg.delivery.pending_limit,
                retry,
            )
            .await?;

            println!("deliver");
            println!("  pending: {}", counts.pending);
            println!("  delivered: {}", counts.delivered);
            println!("  failed: {}", counts.failed);
            println!("ok");
        }
        Commands::Sources => {
            sources::list_sources(&cfg);
        }
        Commands::Articles { limit } => {
            let pool = db::connect(&cfg.storage.path).await?;
            migrate::run_migrations(&pool).await?;
            articles::run_articles(&pool, limit).await?;
        }
    }

    Ok(())
}
