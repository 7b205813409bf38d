//! Downloader CLI
//!
//! Lists downloadable items (pending and failed, failed first), accepts a
//! selection, and runs the download coordinator for each selected item.

use clap::Parser;
use std::io::Write;
use std::time::Duration;
use tracing::info;

use filing_hub_acquire::paths::WorkItem;
use filing_hub_acquire::temp::cleanup_temp_files;
use filing_hub_acquire::DownloadCoordinator;
use filing_hub_core::logging::init_tracing;
use filing_hub_core::models::DownloadStatus;
use filing_hub_core::{create_pool, Config};

/// Age past which abandoned temp files are reaped
const TEMP_MAX_AGE: Duration = Duration::from_secs(24 * 3600);

/// Interactive downloader for queued filings and taxonomy libraries
#[derive(Parser)]
#[command(name = "downloader")]
#[command(about = "Download queued XBRL filings and taxonomy libraries")]
struct Cli {
    /// Maximum queue items to list
    #[arg(long, default_value = "100")]
    limit: i64,

    /// Process everything without prompting
    #[arg(long)]
    all: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let pool = create_pool(&config.database_url, &config.database).await?;

    // Reap temp files abandoned by earlier failed runs
    let _ = cleanup_temp_files(&config.paths.temp_dir, TEMP_MAX_AGE);

    let (shutdown_tx, shutdown_rx) = DownloadCoordinator::shutdown_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nInterrupt received; finishing in-flight items...");
            let _ = shutdown_tx.send(true);
        }
    });

    let coordinator = DownloadCoordinator::new(pool, config, shutdown_rx)?;

    let items = coordinator.pending_work_items(cli.limit).await?;

    if items.is_empty() {
        println!("\nNo downloadable items found in database.");
        println!("Run the search module first to populate the queue.");
        return Ok(());
    }

    display_items(&items);

    let selection = if cli.all {
        (0..items.len()).collect()
    } else {
        match read_selection(items.len())? {
            Some(selection) => selection,
            None => {
                println!("\nDownload cancelled.");
                return Ok(());
            }
        }
    };

    let selected: Vec<WorkItem> = selection.iter().map(|&i| items[i].clone()).collect();

    println!("\nDownloading {} item(s)...\n", selected.len());
    info!("Starting download of {} item(s)", selected.len());

    let mut success_count = 0usize;
    let mut failed_count = 0usize;
    let mut retry_count = 0usize;

    for (i, item) in selected.iter().enumerate() {
        let status = match item {
            WorkItem::Filing(filing) => DownloadStatus::from(filing.download_status.clone()),
            WorkItem::Taxonomy(library) => DownloadStatus::from(library.download_status.clone()),
        };
        let is_retry = status == DownloadStatus::Failed;
        if is_retry {
            retry_count += 1;
        }

        let retry_marker = if is_retry { "[RETRY] " } else { "" };
        println!("[{}/{}] {}{}", i + 1, selected.len(), retry_marker, item.label());

        let result = coordinator.process_single_item(item.clone()).await;

        if result.success {
            success_count += 1;
            println!("  Success ({:.1}s)", result.total_duration.as_secs_f64());
        } else {
            failed_count += 1;
            let stage = result
                .error_stage
                .map(|s| s.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            println!("  Failed at {}", stage);
        }
    }

    println!("\n{}", "=".repeat(90));
    println!("DOWNLOAD SUMMARY");
    println!("{}", "=".repeat(90));
    println!("Total:     {}", selected.len());
    println!("Retries:   {}", retry_count);
    println!("Success:   {}", success_count);
    println!("Failed:    {}", failed_count);
    println!("{}", "=".repeat(90));

    info!(
        "Download complete: {} succeeded, {} failed ({} were retries)",
        success_count, failed_count, retry_count
    );

    Ok(())
}

fn display_items(items: &[WorkItem]) {
    println!("\n{}", "=".repeat(90));
    println!("DOWNLOADABLE ITEMS (Pending & Failed)");
    println!("{}", "=".repeat(90));
    println!(
        "\n{:<5} {:<8} {:<50} {:<12} {:<10}",
        "#", "Kind", "Item", "Date", "Status"
    );
    println!("{}", "-".repeat(90));

    for (i, item) in items.iter().enumerate() {
        match item {
            WorkItem::Filing(filing) => {
                let mut company = filing.company_name.clone();
                if company.len() > 38 {
                    company.truncate(35);
                    company.push_str("...");
                }
                println!(
                    "{:<5} {:<8} {:<50} {:<12} {:<10}",
                    i + 1,
                    "filing",
                    format!("{} ({})", company, filing.form_type),
                    filing.filing_date.to_string(),
                    filing.download_status.to_uppercase()
                );
            }
            WorkItem::Taxonomy(library) => {
                println!(
                    "{:<5} {:<8} {:<50} {:<12} {:<10}",
                    i + 1,
                    "taxonomy",
                    format!("{} v{}", library.taxonomy_name, library.taxonomy_version),
                    "-",
                    library.download_status.to_uppercase()
                );
            }
        }
    }

    println!("{}", "=".repeat(90));
}

fn read_selection(max_options: usize) -> anyhow::Result<Option<Vec<usize>>> {
    println!("\nEnter selection:");
    println!("  - Single number (1-{})", max_options);
    println!("  - Range (e.g., 1-5)");
    println!("  - Multiple (e.g., 1,3,5)");
    println!("  - 'all' for all items");
    println!("  - 'q' to quit");

    loop {
        print!("\nSelection: ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if std::io::stdin().read_line(&mut line)? == 0 {
            return Ok(None);
        }

        match parse_selection(line.trim(), max_options) {
            SelectionParse::Quit => return Ok(None),
            SelectionParse::Selected(selection) => return Ok(Some(selection)),
            SelectionParse::Invalid(message) => println!("{}", message),
        }
    }
}

enum SelectionParse {
    Selected(Vec<usize>),
    Quit,
    Invalid(String),
}

/// Parse a selection string: single number, range, CSV, `all`, or `q`.
/// Returned indices are 0-based.
fn parse_selection(input: &str, max_options: usize) -> SelectionParse {
    let choice = input.to_lowercase();

    if matches!(choice.as_str(), "q" | "quit" | "exit") {
        return SelectionParse::Quit;
    }

    if choice == "all" {
        return SelectionParse::Selected((0..max_options).collect());
    }

    if choice.contains('-') && !choice.contains(',') {
        let parts: Vec<&str> = choice.split('-').collect();
        if parts.len() == 2 {
            if let (Ok(start), Ok(end)) = (parts[0].trim().parse::<usize>(), parts[1].trim().parse::<usize>()) {
                if start >= 1 && start <= end && end <= max_options {
                    return SelectionParse::Selected((start - 1..end).collect());
                }
            }
        }
        return SelectionParse::Invalid(format!(
            "Invalid range. Must be between 1 and {}",
            max_options
        ));
    }

    if choice.contains(',') {
        let mut selected = Vec::new();
        for part in choice.split(',') {
            match part.trim().parse::<usize>() {
                Ok(n) if n >= 1 && n <= max_options => selected.push(n - 1),
                _ => {
                    return SelectionParse::Invalid(format!(
                        "Invalid selection. All numbers must be between 1 and {}",
                        max_options
                    ))
                }
            }
        }
        return SelectionParse::Selected(selected);
    }

    match choice.parse::<usize>() {
        Ok(n) if n >= 1 && n <= max_options => SelectionParse::Selected(vec![n - 1]),
        _ => SelectionParse::Invalid(format!(
            "Invalid input. Please enter a number (1-{}), range, or 'q' to quit.",
            max_options
        )),
    }
}
