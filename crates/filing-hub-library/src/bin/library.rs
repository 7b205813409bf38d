//! Library CLI
//!
//! Taxonomy library management: scans parsed filings for requirements,
//! monitors continuously, lists library state, processes manual drops, and
//! triggers downloads of pending libraries.

use clap::Parser;
use std::time::Duration;
use tracing::info;

use filing_hub_acquire::DownloadCoordinator;
use filing_hub_core::database::DatabasePool;
use filing_hub_core::logging::init_tracing;
use filing_hub_core::models::TaxonomyLibrary;
use filing_hub_core::{create_pool, Config};
use filing_hub_library::manual::ManualProcessor;
use filing_hub_library::reporter::StatisticsReporter;
use filing_hub_library::{LibraryCoordinator, RetryMonitor};

/// Taxonomy library management
#[derive(Parser)]
#[command(name = "library")]
#[command(about = "Discover, verify, and acquire XBRL taxonomy libraries")]
struct Cli {
    /// Scan once for new parsed filings and exit
    #[arg(long)]
    scan: bool,

    /// Continuously monitor for new parsed filings
    #[arg(long)]
    monitor: bool,

    /// List all taxonomy libraries
    #[arg(long)]
    list: bool,

    /// List pending taxonomy downloads
    #[arg(long)]
    list_pending: bool,

    /// Show library statistics
    #[arg(long)]
    stats: bool,

    /// Process manual drops and show manual download instructions
    #[arg(long)]
    manual: bool,

    /// Download all pending taxonomy libraries
    #[arg(long)]
    download: bool,

    /// Create all required directories
    #[arg(long)]
    setup: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    std::process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {}", e);
            return 1;
        }
    };

    // Setup needs no database
    if cli.setup {
        return cmd_setup(&config);
    }

    let pool = match create_pool(&config.database_url, &config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            eprintln!("Error connecting to database: {}", e);
            return 1;
        }
    };

    let result = if cli.scan {
        cmd_scan(&pool, &config).await
    } else if cli.monitor {
        cmd_monitor(&pool, &config).await
    } else if cli.list {
        cmd_list(&pool).await
    } else if cli.list_pending {
        cmd_list_pending(&pool).await
    } else if cli.stats {
        cmd_stats(&pool).await
    } else if cli.manual {
        cmd_manual(&pool, &config).await
    } else if cli.download {
        cmd_download(&pool, &config).await
    } else {
        println!("No command given. Try --scan, --monitor, --list, --stats, --manual, --download, or --setup.");
        Ok(())
    };

    match result {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("\nError: {}", e);
            1
        }
    }
}

fn cmd_setup(config: &Config) -> i32 {
    info!("Setting up library directories");

    match config.paths.ensure_all_directories() {
        Ok(count) => {
            println!("\nDirectory setup complete ({} directories).", count);
            println!("  Entities:         {}", config.paths.entities_dir.display());
            println!("  Taxonomies:       {}", config.paths.taxonomies_dir.display());
            println!("  Manual downloads: {}", config.paths.manual_downloads_dir.display());
            println!("  Manual processed: {}", config.paths.manual_processed_dir.display());
            println!("  Temp:             {}", config.paths.temp_dir.display());
            println!("  Logs:             {}", config.paths.log_dir.display());
            0
        }
        Err(e) => {
            eprintln!("Setup failed: {}", e);
            1
        }
    }
}

async fn cmd_scan(pool: &DatabasePool, config: &Config) -> anyhow::Result<()> {
    println!("\n{}", "=".repeat(80));
    println!("LIBRARY SCAN - ONE-TIME");
    println!("{}", "=".repeat(80));

    let coordinator = LibraryCoordinator::new(pool.clone(), config);

    println!("\nScanning for new parsed filings...");
    let reports = coordinator.process_new_filings().await;

    if reports.is_empty() {
        println!("No new filings found to process.");
        return Ok(());
    }

    println!("\nProcessed {} filings:\n", reports.len());

    let mut success_count = 0;
    for report in &reports {
        if report.success {
            success_count += 1;
            let status = if report.libraries_ready() {
                "Ready"
            } else {
                "Missing libraries"
            };
            println!("  {} | {}", status, report.filing_id);
            println!("    Namespaces: {}", report.namespaces_detected);
            println!("    Libraries: {}", report.libraries_required.join(", "));
            if !report.libraries_ready() {
                println!("    Missing: {} libraries", report.libraries_missing);
            }
            println!();
        } else {
            println!(
                "  Error | {}: {}\n",
                report.filing_id,
                report.error.as_deref().unwrap_or("Unknown error")
            );
        }
    }

    println!("{}", "=".repeat(80));
    println!(
        "Summary: {}/{} filings processed successfully",
        success_count,
        reports.len()
    );
    println!("{}", "=".repeat(80));

    Ok(())
}

async fn cmd_monitor(pool: &DatabasePool, config: &Config) -> anyhow::Result<()> {
    println!("\n{}", "=".repeat(80));
    println!("LIBRARY MONITOR - CONTINUOUS MODE");
    println!("{}", "=".repeat(80));
    println!("\nPress Ctrl+C to stop monitoring\n");

    let interval = Duration::from_secs(config.library.monitor_interval_seconds);
    let coordinator = LibraryCoordinator::new(pool.clone(), config);
    let monitor = RetryMonitor::new(pool.clone(), &config.paths.manual_downloads_dir);

    println!("Monitoring every {}s...\n", interval.as_secs());

    let mut cycle = 0u64;
    loop {
        cycle += 1;
        println!("[Cycle {}] Scanning for new filings...", cycle);

        let reports = coordinator.process_new_filings().await;
        if reports.is_empty() {
            println!("  No new filings");
        } else {
            println!("  Found {} new filings", reports.len());
            for report in &reports {
                if report.success {
                    let marker = if report.libraries_ready() { "+" } else { "!" };
                    println!("  {} {}", marker, report.filing_id);
                }
            }
        }

        // Escalate failed downloads on every cycle
        let summary = monitor.monitor_download_results().await?;
        if summary.pending_retries > 0 || summary.permanent_failures > 0 {
            println!(
                "  Retries: {} requeued, {} switched URL, {} need manual action",
                summary.requeued_same_url,
                summary.switched_alternative,
                summary.manual_interventions
            );
        }

        let (processed, _) = coordinator.statistics().await;
        println!("  Total processed: {}", processed);
        println!("  Waiting {}s...\n", interval.as_secs());

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                println!("\nMonitoring stopped by user");
                return Ok(());
            }
        }
    }
}

async fn cmd_list(pool: &DatabasePool) -> anyhow::Result<()> {
    let libraries = TaxonomyLibrary::list_all(pool).await?;

    if libraries.is_empty() {
        println!("\nNo taxonomy libraries recorded.");
        return Ok(());
    }

    println!("\n{}", "=".repeat(100));
    println!(
        "{:<30} {:<14} {:<12} {:<8} {:<10}",
        "Taxonomy", "Version", "Status", "Files", "Attempts"
    );
    println!("{}", "-".repeat(100));

    for library in &libraries {
        println!(
            "{:<30} {:<14} {:<12} {:<8} {:<10}",
            library.taxonomy_name,
            library.taxonomy_version,
            library.download_status,
            library
                .total_files
                .map(|n| n.to_string())
                .unwrap_or_else(|| "-".to_string()),
            library.total_attempts,
        );
    }

    println!("{}", "=".repeat(100));
    println!("{} libraries", libraries.len());

    Ok(())
}

async fn cmd_list_pending(pool: &DatabasePool) -> anyhow::Result<()> {
    let pending = TaxonomyLibrary::get_downloadable(pool, 500).await?;

    if pending.is_empty() {
        println!("\nNo pending taxonomy downloads.");
        return Ok(());
    }

    println!("\nPending taxonomy downloads ({}):\n", pending.len());
    for library in &pending {
        println!(
            "  {} v{} [{}] <- {}",
            library.taxonomy_name,
            library.taxonomy_version,
            library.download_status,
            library.current_url
        );
    }

    Ok(())
}

async fn cmd_stats(pool: &DatabasePool) -> anyhow::Result<()> {
    let reporter = StatisticsReporter::new(pool.clone());
    let stats = reporter.gather().await?;

    println!("\n{}", StatisticsReporter::render(&stats));

    Ok(())
}

async fn cmd_manual(pool: &DatabasePool, config: &Config) -> anyhow::Result<()> {
    let processor = ManualProcessor::new(pool.clone(), config);

    let outcomes = processor.process_all().await?;

    if outcomes.is_empty() {
        println!("\nNo manual drops found.\n");
        println!("{}", processor.manual_instructions());
        return Ok(());
    }

    println!("\nProcessed {} manual drop(s):", outcomes.len());
    for outcome in &outcomes {
        println!(
            "  {} v{}: {} files, source archived to {}",
            outcome.taxonomy_name,
            outcome.taxonomy_version,
            outcome.files_extracted,
            outcome.archived_to.display()
        );
    }

    Ok(())
}

async fn cmd_download(pool: &DatabasePool, config: &Config) -> anyhow::Result<()> {
    println!("\n{}", "=".repeat(80));
    println!("LIBRARY DOWNLOAD - PENDING TAXONOMIES");
    println!("{}", "=".repeat(80));

    let (shutdown_tx, shutdown_rx) = DownloadCoordinator::shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received; finishing in-flight items...");
            let _ = shutdown_tx.send(true);
        }
    });

    let coordinator = DownloadCoordinator::new(pool.clone(), config.clone(), shutdown_rx)?;

    println!("\nQuerying pending taxonomy downloads...");
    let stats = coordinator.process_pending_downloads(100).await?;

    println!("\n{}", "=".repeat(80));
    println!("DOWNLOAD RESULTS");
    println!("{}", "=".repeat(80));
    println!("Total processed: {}", stats.total);
    println!("Succeeded: {}", stats.succeeded);
    println!("Failed: {}", stats.failed);
    println!("Duration: {:.1}s", stats.duration_seconds);
    println!("{}", "=".repeat(80));

    Ok(())
}
