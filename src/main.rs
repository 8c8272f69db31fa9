//! Tidemark main entry point
//!
//! This is the command-line interface for the Tidemark crawl provider.

use anyhow::{bail, Context as _};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tidemark::config::{load_config, LoadedConfig};
use tidemark::index::{index_path, promote, IndexBackend, SqliteIndex};
use tidemark::output::{load_statistics, print_statistics};
use tidemark::provider::{CrawlerProvider, DispatchType, RuntimeContext};
use tidemark::storage::{open_storage, SeenStore, Storage};
use tracing_subscriber::EnvFilter;

/// Tidemark: a crawl provider feeding a two-phase search index
///
/// Tidemark crawls a site breadth-first into a genesis index, fetching
/// every eligible page exactly once, and promotes finished builds to the
/// stable serving index.
#[derive(Parser, Debug)]
#[command(name = "tidemark")]
#[command(version)]
#[command(about = "Crawl provider and two-phase index builder", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, global = true, default_value = "tidemark.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl into a genesis index
    Crawl {
        /// INSERT crawls from the seed, UPDATE from the given path
        #[arg(long, value_enum, default_value_t = Dispatch::Insert)]
        dispatch: Dispatch,

        /// Document path (absolute URL or relative to the seed)
        #[arg(long)]
        path: Option<String>,

        /// Context name, defaults to the configured one
        #[arg(long)]
        context: Option<String>,
    },

    /// Promote the newest finalized genesis index to stable
    GenesisToStable {
        /// Index database name, defaults to the configured one
        #[arg(long)]
        database_name: Option<String>,
    },

    /// Clear the seen ledger and the filter-rejection memo
    Reset {
        #[arg(long)]
        context: Option<String>,
    },

    /// Show ledger and index statistics
    Stats {
        #[arg(long)]
        context: Option<String>,
    },

    /// Validate the configuration and show what would be crawled
    Validate,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum Dispatch {
    Insert,
    Update,
}

impl From<Dispatch> for DispatchType {
    fn from(dispatch: Dispatch) -> Self {
        match dispatch {
            Dispatch::Insert => DispatchType::Insert,
            Dispatch::Update => DispatchType::Update,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let loaded = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", loaded.hash);

    match cli.command {
        Command::Crawl {
            dispatch,
            path,
            context,
        } => handle_crawl(loaded, dispatch.into(), path, context).await,
        Command::GenesisToStable { database_name } => {
            handle_genesis_to_stable(&loaded, database_name)
        }
        Command::Reset { context } => handle_reset(&loaded, context),
        Command::Stats { context } => handle_stats(&loaded, context),
        Command::Validate => handle_validate(&loaded),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tidemark=info,warn"),
            1 => EnvFilter::new("tidemark=debug,info"),
            2 => EnvFilter::new("tidemark=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn context_name(loaded: &LoadedConfig, context: Option<String>) -> String {
    context.unwrap_or_else(|| loaded.app.provider.context.clone())
}

/// Handles the crawl subcommand: one full provider lifecycle
async fn handle_crawl(
    loaded: LoadedConfig,
    dispatch: DispatchType,
    path: Option<String>,
    context: Option<String>,
) -> anyhow::Result<()> {
    let mut runtime = RuntimeContext::new(context_name(&loaded, context), dispatch);
    if let Some(path) = path {
        runtime = runtime.with_path(path);
    }

    let mut provider = CrawlerProvider::new(loaded)?;
    let cancel = provider.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, cancelling crawl");
            cancel.cancel();
        }
    });

    let report = provider.run_once(&runtime).await?;
    println!(
        "Run {} {}: {} accepted, {} rejected, {} failed (genesis generation {})",
        report.run_id,
        report.state,
        report.counts.accepted,
        report.counts.rejected,
        report.counts.failed,
        report.generation
    );
    if let Some(promotion) = &report.promotion {
        println!(
            "✓ Generation {} promoted to stable ({} documents)",
            promotion.promoted, promotion.document_count
        );
    }

    match report.error {
        Some(e) => bail!("Crawl aborted: {}", e),
        None => Ok(()),
    }
}

/// Handles the genesis-to-stable subcommand
fn handle_genesis_to_stable(
    loaded: &LoadedConfig,
    database_name: Option<String>,
) -> anyhow::Result<()> {
    let name = database_name.unwrap_or_else(|| loaded.app.index.database_name.clone());
    let report = promote(Path::new(&loaded.app.index.directory), &name)?;

    println!(
        "✓ Generation {} of '{}' is now stable ({} documents)",
        report.promoted, name, report.document_count
    );
    if let Some(retired) = report.retired {
        println!("  Retired generation {}", retired);
    }
    if !report.superseded.is_empty() {
        println!("  Discarded superseded generations {:?}", report.superseded);
    }
    Ok(())
}

/// Handles the reset subcommand
fn handle_reset(loaded: &LoadedConfig, context: Option<String>) -> anyhow::Result<()> {
    let context = context_name(loaded, context);
    let mut storage = open_storage(Path::new(&loaded.app.provider.state_path), &context)?;

    let interrupted = storage.reset_running_runs()?;
    storage.reset()?;
    storage.reset_filter_store()?;

    println!("✓ Ledger for context '{}' cleared", context);
    if interrupted > 0 {
        println!("  Marked {} interrupted run(s) as reset", interrupted);
    }
    Ok(())
}

/// Handles the stats subcommand
fn handle_stats(loaded: &LoadedConfig, context: Option<String>) -> anyhow::Result<()> {
    let context = context_name(loaded, context);
    println!("Ledger: {}\n", loaded.app.provider.state_path);

    let storage = open_storage(Path::new(&loaded.app.provider.state_path), &context)?;

    let directory = Path::new(&loaded.app.index.directory);
    let database_name = &loaded.app.index.database_name;
    let index = if index_path(directory, database_name).exists() {
        Some(SqliteIndex::open(directory, database_name)?)
    } else {
        None
    };

    let stats = load_statistics(
        &context,
        &storage,
        index.as_ref().map(|i| i as &dyn IndexBackend),
    )?;
    print_statistics(&stats);
    Ok(())
}

/// Handles the validate subcommand: shows the effective configuration
fn handle_validate(loaded: &LoadedConfig) -> anyhow::Result<()> {
    let app = &loaded.app;
    let crawl = &loaded.crawl;

    println!("=== Tidemark Configuration ===\n");

    println!("Provider:");
    println!("  Context: {}", app.provider.context);
    println!("  Ledger: {}", app.provider.state_path);
    println!("  Concurrency: {}", app.provider.concurrency);
    println!("  Ledger policy: {:?}", app.provider.ledger_policy);

    println!("\nFetch:");
    println!("  User agent: {}", app.fetch.user_agent);
    println!("  Timeout: {}s", app.fetch.timeout_secs);
    println!("  Max retries: {}", app.fetch.max_retries);

    println!("\nIndex:");
    println!(
        "  Database: {}",
        index_path(Path::new(&app.index.directory), &app.index.database_name).display()
    );
    println!("  Auto-promote: {}", app.index.auto_promote);

    println!("\nCrawl:");
    println!("  Seed: {}", crawl.seed);
    println!(
        "  Own host only: {} (subdomains: {})",
        crawl.own_host_only, crawl.allow_subdomains
    );
    println!("  Schemes: {:?}", crawl.allowed_schemes);
    println!("  Mime types: {:?}", crawl.allowed_mime_types);
    println!("  Max link depth: {}", crawl.max_link_depth);
    match crawl.crawl_limit() {
        Some(limit) => println!("  Crawl limit: {}", limit),
        None => println!("  Crawl limit: unlimited"),
    }
    match crawl.size_limit() {
        Some(limit) => println!("  Content max size: {} bytes", limit),
        None => println!("  Content max size: unlimited"),
    }
    println!(
        "  Link patterns: {} allow, {} deny",
        crawl.valid_links.len(),
        crawl.user_invalid_links.len()
    );

    println!("\n✓ Configuration is valid");
    Ok(())
}
