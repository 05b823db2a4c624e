mod blob;
mod config;
mod crawler;
mod db;
mod fetcher;
mod images;
mod parser;
mod pipeline;
mod progress;
mod record;
mod retry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};

use crate::config::Settings;
use crate::crawler::{Crawler, PageOutcome};
use crate::db::Store;
use crate::fetcher::HttpPageSource;
use crate::pipeline::RunReport;
use crate::progress::Progress;

#[derive(Parser)]
#[command(name = "castle_crawler", about = "Castle database crawler for alleburgen.de")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl every page id, store images, persist all records
    Crawl {
        /// Number of page ids to visit, starting at 0
        #[arg(short = 'n', long)]
        count: Option<u32>,
        /// Pages fetched in parallel
        #[arg(short, long)]
        concurrency: Option<usize>,
        #[arg(long)]
        base_url: Option<String>,
        /// SQLite database path
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Fetch and extract one page without storing it
    Page { id: u32 },
    /// Print a stored record
    Show {
        id: u32,
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show database statistics
    Stats {
        #[arg(long)]
        db: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load()?;
    let is_crawl = matches!(cli.command, Commands::Crawl { .. });

    let result = match cli.command {
        Commands::Crawl {
            count,
            concurrency,
            base_url,
            db,
        } => {
            if let Some(count) = count {
                settings.total_id_count = count;
            }
            if let Some(concurrency) = concurrency {
                settings.concurrency_limit = concurrency;
            }
            if let Some(base_url) = base_url {
                settings.base_url = base_url;
            }
            if let Some(db) = db {
                settings.db_path = db;
            }
            let settings = settings.normalized()?;

            let store = Store::connect(&settings.db_path)?;
            store.init_schema()?;
            let client = fetcher::build_client(settings.request_timeout())?;
            let pages = Arc::new(HttpPageSource::new(client.clone(), settings.base_url.clone()));

            println!(
                "Crawling {} pages from {} ({} concurrent)...",
                settings.total_id_count, settings.base_url, settings.concurrency_limit
            );
            let (progress, reporter) = progress::spawn_reporter(progress::spinner());
            let report = pipeline::run(&settings, pages, client, &store, &store, progress).await;
            let summary = reporter.await.context("Progress reporter crashed")?;

            println!(
                "\nVisited {} page ids with {} requests.",
                summary.total, summary.attempts
            );
            print_report(&report);
            match report.persisted {
                Ok(_) => Ok(()),
                Err(e) => Err(e.context(format!("Failed to store records in {:?}", settings.db_path))),
            }
        }
        Commands::Page { id } => {
            let client = fetcher::build_client(settings.request_timeout())?;
            let pages = Arc::new(HttpPageSource::new(client, settings.base_url.clone()));
            let crawler = Crawler::new(
                pages,
                &settings.base_url,
                settings.retry_policy(),
                1,
                Progress::disabled(),
            );
            match crawler.visit(id).await {
                PageOutcome::Extracted(record) => {
                    println!("{}", serde_json::to_string_pretty(&record)?);
                    Ok(())
                }
                PageOutcome::Empty(_) => {
                    println!("Page {} has no castle.", id);
                    Ok(())
                }
                PageOutcome::Failed { error, .. } => bail!("Page {} failed: {}", id, error),
            }
        }
        Commands::Show { id, db } => {
            let store = Store::connect(&db.unwrap_or(settings.db_path))?;
            store.init_schema()?;
            match store.fetch_record(id)? {
                Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
                None => println!("No record with id {}.", id),
            }
            Ok(())
        }
        Commands::Stats { db } => {
            let store = Store::connect(&db.unwrap_or(settings.db_path))?;
            store.init_schema()?;
            let s = store.get_stats()?;
            println!("Records:        {}", s.records);
            println!("  with images:  {}", s.with_images);
            println!("Images:         {}", s.images);
            println!("  stored:       {}", s.images_stored);
            println!("Blobs:          {} ({})", s.blobs, format_bytes(s.blob_bytes));
            Ok(())
        }
    };

    if let Some(footer) = done_footer(is_crawl, t0.elapsed()) {
        println!("{}", footer);
    }

    result
}

fn print_report(report: &RunReport) {
    println!(
        "Found {} castles, skipped {} empty pages, {} pages failed.",
        report.found,
        report.skipped.len(),
        report.failed.len()
    );
    println!(
        "Stored {} of {} images.",
        report.images_stored, report.images_total
    );

    if !report.missing_images.is_empty() {
        println!("\n--- Missing images ({}) ---", report.missing_images.len());
        for m in &report.missing_images {
            println!("  #{} image {}: {} ({})", m.source_id, m.index + 1, m.url, m.reason);
        }
    }

    if !report.failed.is_empty() {
        println!("\n--- Failed pages ({}) ---", report.failed.len());
        for f in &report.failed {
            println!("  {}: {}", f.id, f.error);
        }
    }

    match &report.persisted {
        Ok(n) => println!("\nSaved {} records in {}.", n, format_duration(report.elapsed)),
        Err(e) => println!("\nNothing saved after {}: {:#}", format_duration(report.elapsed), e),
    }
}

/// The crawl report carries its own timing; other commands get a footer when slow.
fn done_footer(is_crawl: bool, elapsed: std::time::Duration) -> Option<String> {
    if is_crawl || elapsed.as_secs() < 1 {
        return None;
    }
    Some(format!("\nDone in {}", format_duration(elapsed)))
}

fn format_bytes(bytes: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MB {
        format!("{:.1} MB", bytes as f64 / MB)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h {:02}m {:02}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
