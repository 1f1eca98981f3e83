//! Sumi-Mirror main entry point
//!
//! This is the command-line interface for the Sumi-Mirror website archiver.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use sumi_mirror::config::{load_config_with_hash, Config};
use sumi_mirror::crawler::Coordinator;
use sumi_mirror::linkfix::{
    print_fix_report, print_restore_report, restore, LinkFixer, ReplacementPolicy,
};
use sumi_mirror::output::print_report;
use tracing_subscriber::EnvFilter;

/// Sumi-Mirror: an offline website archiver
///
/// Sumi-Mirror crawls a site, downloads every asset its pages need exactly once,
/// and rewrites the pages to work from local disk. A separate pass repairs
/// anchors that lead nowhere in the mirrored tree.
#[derive(Parser, Debug)]
#[command(name = "sumi-mirror")]
#[command(version)]
#[command(about = "An offline website archiver", long_about = None)]
struct Cli {
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
    /// Mirror a site as described by a TOML configuration file
    Mirror {
        /// Path to TOML configuration file
        #[arg(value_name = "CONFIG")]
        config: PathBuf,

        /// Validate config and show what would be mirrored without fetching
        #[arg(long)]
        dry_run: bool,
    },

    /// Replace javascript: and dead local anchors in a directory of HTML files
    FixLinks(FixLinksArgs),

    /// Put back the originals saved by fix-links and delete the backups
    Restore {
        /// Directory previously processed by fix-links
        #[arg(value_name = "DIR")]
        directory: PathBuf,
    },
}

#[derive(Args, Debug)]
#[command(group(clap::ArgGroup::new("policy").required(true).args(["replacement_url", "local_fallback"])))]
struct FixLinksArgs {
    /// Directory containing the HTML files
    #[arg(value_name = "DIR")]
    directory: PathBuf,

    /// URL every dead link is pointed at
    #[arg(long, value_name = "URL")]
    replacement_url: Option<String>,

    /// File under DIR every dead link is pointed at, relative to each page
    #[arg(long, value_name = "FILE")]
    local_fallback: Option<String>,

    /// Modify files without writing .backup copies
    #[arg(long)]
    no_backup: bool,

    /// Report what would change without writing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match cli.command {
        Command::Mirror { config, dry_run } => {
            tracing::info!("Loading configuration from: {}", config.display());
            let (config, config_hash) = load_config_with_hash(&config)
                .with_context(|| format!("Failed to load {}", config.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

            if dry_run {
                handle_dry_run(&config);
            } else {
                handle_mirror(config).await?;
            }
        }
        Command::FixLinks(args) => handle_fix_links(args)?,
        Command::Restore { directory } => {
            let report = restore(&directory)
                .with_context(|| format!("Failed to restore {}", directory.display()))?;
            print_restore_report(&report);
        }
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
            0 => EnvFilter::new("sumi_mirror=info,warn"),
            1 => EnvFilter::new("sumi_mirror=debug,info"),
            2 => EnvFilter::new("sumi_mirror=trace,debug"),
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

/// Handles `mirror --dry-run`: shows the validated plan
fn handle_dry_run(config: &Config) {
    println!("=== Sumi-Mirror Dry Run ===\n");

    println!("Input:");
    if let Some(local) = &config.crawl.local_file {
        println!("  Local file: {}", local.display());
        match &config.crawl.base_url {
            Some(base) => println!("  Base URL: {}", base),
            None => println!("  Base URL: detected from the file"),
        }
    }
    println!("  Seeds ({}):", config.crawl.seeds.len());
    for seed in &config.crawl.seeds {
        println!("    * {}", seed);
    }

    println!("\nCrawl:");
    match config.crawl.max_pages {
        Some(max) => println!("  Max pages: {}", max),
        None => println!("  Max pages: unlimited"),
    }
    match config.crawl.max_depth {
        Some(max) => println!("  Max depth: {}", max),
        None => println!("  Max depth: unlimited"),
    }
    println!("  Delay per host: {}ms", config.crawl.delay_ms);
    println!("  Same domain only: {}", config.crawl.same_domain_only);
    if !config.crawl.allowed_domains.is_empty() {
        println!("  Allowed domains: {}", config.crawl.allowed_domains.join(", "));
    }
    println!(
        "  Concurrent asset fetches: {}",
        config.crawl.max_concurrent_fetches
    );

    println!("\nAssets:");
    println!("  Consolidate: {}", config.assets.consolidate);
    println!(
        "  Keep external fonts: {} ({})",
        config.assets.keep_external_fonts,
        config.assets.font_hosts.join(", ")
    );

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory.display());
    println!("  Sitemap: {}", config.output.sitemap);

    println!("\n✓ Configuration is valid");
}

/// Handles the main mirror operation
async fn handle_mirror(config: Config) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config).context("Failed to start mirror")?;

    let stop = coordinator.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current page");
            stop.store(true, Ordering::SeqCst);
        }
    });

    let report = coordinator.run().await.context("Mirror failed")?;
    print_report(&report);

    if report.has_failures() {
        tracing::warn!("Mirror finished with failures, see report above");
    }
    Ok(())
}

/// Handles the fix-links subcommand
fn handle_fix_links(args: FixLinksArgs) -> anyhow::Result<()> {
    let policy = match (args.replacement_url, args.local_fallback) {
        (Some(url), _) => ReplacementPolicy::ExternalUrl(url),
        (None, Some(file)) => ReplacementPolicy::LocalFallback(file),
        (None, None) => anyhow::bail!("one of --replacement-url or --local-fallback is required"),
    };

    let report = LinkFixer::new(&args.directory, policy)
        .with_context(|| format!("Cannot fix links in {}", args.directory.display()))?
        .with_backups(!args.no_backup)
        .dry_run(args.dry_run)
        .run()?;

    print_fix_report(&report);
    Ok(())
}
