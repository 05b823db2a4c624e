use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::blob::BlobSink;
use crate::config::Settings;
use crate::crawler::{Crawler, FailedPage};
use crate::db::RecordStore;
use crate::fetcher::PageSource;
use crate::images::{ImageFetcher, MissingImage};
use crate::progress::{Progress, ProgressEvent};

/// What a full run produced, for the final report.
#[derive(Debug)]
pub struct RunReport {
    pub found: usize,
    pub skipped: Vec<u32>,
    pub failed: Vec<FailedPage>,
    pub images_total: usize,
    pub images_stored: usize,
    pub missing_images: Vec<MissingImage>,
    /// Records written, or why the bulk insert failed.
    pub persisted: anyhow::Result<usize>,
    pub elapsed: Duration,
}

/// Crawl every id, store images, then write all records in one batch.
pub async fn run(
    settings: &Settings,
    pages: Arc<dyn PageSource>,
    client: reqwest::Client,
    blobs: &dyn BlobSink,
    store: &dyn RecordStore,
    progress: Progress,
) -> RunReport {
    let t0 = Instant::now();
    let policy = settings.retry_policy();

    // ── Phase 1: pages ──
    let crawler = Crawler::new(
        pages,
        &settings.base_url,
        policy,
        settings.concurrency_limit,
        progress.clone(),
    );
    let crawled = crawler.crawl(0..settings.total_id_count).await;
    let mut records = crawled.records;
    records.sort_by_key(|r| r.source_id);

    // ── Phase 2: images ──
    let images = ImageFetcher::new(client, blobs, policy, progress.clone());
    let missing_images = images
        .store_all(&mut records, settings.image_concurrency)
        .await;
    let images_total: usize = records.iter().map(|r| r.images.len()).sum();
    let images_stored = records
        .iter()
        .flat_map(|r| &r.images)
        .filter(|img| img.blob_id.is_some())
        .count();

    // ── Phase 3: persist ──
    progress.emit(ProgressEvent::Persisting {
        records: records.len(),
    });
    let persisted = store.insert_records(&records);
    match &persisted {
        Ok(n) => info!("Persisted {} records", n),
        Err(e) => error!("Persisting {} records failed: {:#}", records.len(), e),
    }

    RunReport {
        found: records.len(),
        skipped: crawled.skipped,
        failed: crawled.failed,
        images_total,
        images_stored,
        missing_images,
        persisted,
        elapsed: t0.elapsed(),
    }
}
