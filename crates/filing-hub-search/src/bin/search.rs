//! Search CLI
//!
//! Searches a market for filings and queues the results for download.

use chrono::NaiveDate;
use clap::Parser;
use tracing::info;

use filing_hub_core::logging::init_tracing;
use filing_hub_core::models::Market;
use filing_hub_core::{create_pool, Config};
use filing_hub_search::registry::available_markets;
use filing_hub_search::SearchOrchestrator;

/// Search a market for XBRL filings and queue them for download
#[derive(Parser)]
#[command(name = "search")]
#[command(about = "Search filings across SEC, UK Companies House, and ESEF")]
struct Cli {
    /// Market to search (sec, uk_frc, esef)
    market: String,

    /// Company identifier (ticker, CIK, company number, or LEI)
    identifier: String,

    /// Filing form type (10-K, AA, AFR, ...)
    #[arg(long, default_value = "10-K")]
    form_type: String,

    /// Maximum number of results
    #[arg(long, default_value = "10")]
    max_results: usize,

    /// Start of the filing date window (YYYY-MM-DD)
    #[arg(long)]
    start_date: Option<NaiveDate>,

    /// End of the filing date window (YYYY-MM-DD)
    #[arg(long)]
    end_date: Option<NaiveDate>,

    /// Treat the identifier as a company name
    #[arg(long)]
    by_name: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    if !available_markets().contains(&cli.market.as_str()) {
        eprintln!(
            "Unknown market '{}'. Available: {}",
            cli.market,
            available_markets().join(", ")
        );
        std::process::exit(1);
    }

    let config = Config::from_env()?;
    let pool = create_pool(&config.database_url, &config.database).await?;

    // Idempotent; keeps the markets table in step with the registry
    Market::seed(&pool).await?;

    let orchestrator = SearchOrchestrator::new(pool, config);

    let stats = if cli.by_name {
        orchestrator
            .search_by_name_and_save(
                &cli.market,
                &cli.identifier,
                &cli.form_type,
                cli.max_results,
                cli.start_date,
                cli.end_date,
            )
            .await
    } else {
        orchestrator
            .search_and_save(
                &cli.market,
                &cli.identifier,
                &cli.form_type,
                cli.max_results,
                cli.start_date,
                cli.end_date,
            )
            .await
    };

    match stats {
        Ok(stats) => {
            info!(
                "Search complete: {} found, {} queued, {} already known",
                stats.results_found, stats.results_saved, stats.results_skipped
            );
            println!(
                "Found {} filings: {} queued for download, {} already known, {} failed",
                stats.results_found,
                stats.results_saved,
                stats.results_skipped,
                stats.results_failed
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("Search failed: {}", e);
            std::process::exit(1);
        }
    }
}
