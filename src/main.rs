//! Quote-Harvest main entry point
//!
//! This is the command-line interface for the Quote-Harvest crawler.

use clap::Parser;
use quote_harvest::config::{load_config_with_hash, Config};
use quote_harvest::crawler::{run_crawl, CancelFlag};
use quote_harvest::output::{print_failure, print_preview, print_report};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Quote-Harvest: a paginated quote crawler
///
/// Quote-Harvest renders a JavaScript-driven quote listing in headless
/// Chrome, follows its "next" control page by page, and stores every quote
/// it finds in SQLite.
#[derive(Parser, Debug)]
#[command(name = "quote-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A paginated quote crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,

    /// Number of harvested records to print after a crawl
    #[arg(long, value_name = "N", default_value_t = 10)]
    preview: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, &config_hash, cli.preview).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("quote_harvest=info,warn"),
            1 => EnvFilter::new("quote_harvest=debug,info"),
            2 => EnvFilter::new("quote_harvest=trace,debug"),
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

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Quote-Harvest Dry Run ===\n");

    println!("Source:");
    println!("  URL: {}", config.source.url);
    println!("  Quote block: {}", config.source.quote_selector);
    println!("  Text: {}", config.source.text_selector);
    println!("  Author: {}", config.source.author_selector);
    println!("  Tags: {}", config.source.tag_selector);
    println!("  Next page: {}", config.source.next_selector);

    println!("\nCrawler Configuration:");
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Page timeout: {}ms", config.crawler.page_timeout_ms);
    println!("  Poll interval: {}ms", config.crawler.poll_interval_ms);
    println!("  Settle delay: {}ms", config.crawler.settle_delay_ms);
    println!("  Empty page grace: {}ms", config.crawler.empty_page_grace_ms);

    println!("\nBrowser:");
    println!("  Headless: {}", config.browser.headless);
    println!("  GPU disabled: {}", config.browser.disable_gpu);
    println!("  Sandbox disabled: {}", config.browser.no_sandbox);
    if let Some(executable) = &config.browser.executable {
        println!("  Executable: {}", executable);
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Busy timeout: {}ms", config.output.busy_timeout_ms);

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl up to {} pages starting at {}",
        config.crawler.max_pages, config.source.url
    );
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use quote_harvest::output::{load_statistics, print_statistics};
    use quote_harvest::storage::open_store;
    use std::path::Path;
    use std::time::Duration;

    println!("Database: {}\n", config.output.database_path);

    let store = open_store(
        Path::new(&config.output.database_path),
        Duration::from_millis(config.output.busy_timeout_ms),
    )?;

    let stats = load_statistics(&store)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: &str,
    preview: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Crawling {} (max pages: {})",
        config.source.url,
        config.crawler.max_pages
    );

    let cancel = CancelFlag::new();
    let signal_flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            signal_flag.cancel();
        }
    });

    match run_crawl(config, config_hash, cancel).await {
        Ok(report) => {
            print_report(&report);
            print_preview(&report.records, preview);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            print_failure(&e);
            Err(e.into())
        }
    }
}
