use std::collections::HashSet;
use std::ops::Range;
use std::sync::Arc;

use tokio::sync::{mpsc, Semaphore};
use tracing::{info, warn};

use crate::fetcher::{FetchError, PageSource};
use crate::parser::{self, Extraction};
use crate::progress::{Progress, ProgressEvent};
use crate::record::Record;
use crate::retry::RetryPolicy;

/// Terminal state of one page id, sent from a worker to the coordinator.
#[derive(Debug)]
pub enum PageOutcome {
    Extracted(Record),
    Empty(u32),
    Failed { id: u32, error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPage {
    pub id: u32,
    pub error: String,
}

/// Everything the page phase produced. Owned by the coordinator loop only.
#[derive(Debug, Default)]
pub struct CrawlOutcome {
    pub records: Vec<Record>,
    pub skipped: Vec<u32>,
    pub failed: Vec<FailedPage>,
}

impl CrawlOutcome {
    pub fn total(&self) -> usize {
        self.records.len() + self.skipped.len() + self.failed.len()
    }
}

#[derive(Clone)]
pub struct Crawler {
    pages: Arc<dyn PageSource>,
    base_url: Arc<str>,
    policy: RetryPolicy,
    concurrency: usize,
    progress: Progress,
}

impl Crawler {
    pub fn new(
        pages: Arc<dyn PageSource>,
        base_url: &str,
        policy: RetryPolicy,
        concurrency: usize,
        progress: Progress,
    ) -> Self {
        Self {
            pages,
            base_url: Arc::from(base_url),
            policy,
            concurrency: concurrency.max(1),
            progress,
        }
    }

    /// Crawl every id in `ids` with at most `concurrency` pages in flight.
    /// Per-id failures are recorded and never abort the run.
    pub async fn crawl(&self, ids: Range<u32>) -> CrawlOutcome {
        let expected = ids.len();
        self.progress.emit(ProgressEvent::Started {
            total: expected as u32,
        });

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        // Workers send results, this loop owns the collections
        let (tx, mut rx) = mpsc::channel::<PageOutcome>(self.concurrency * 2);

        let dispatcher = {
            let crawler = self.clone();
            let ids = ids.clone();
            tokio::spawn(async move {
                for id in ids {
                    // A permit is taken before spawning so idle ids never pile up as tasks
                    let Ok(permit) = Arc::clone(&semaphore).acquire_owned().await else {
                        break;
                    };
                    let crawler = crawler.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let outcome = crawler.visit(id).await;
                        let _ = tx.send(outcome).await;
                        drop(permit);
                    });
                }
            })
        };

        let mut outcome = CrawlOutcome::default();
        let mut seen = HashSet::with_capacity(expected);

        while let Some(result) = rx.recv().await {
            match result {
                PageOutcome::Extracted(record) => {
                    seen.insert(record.source_id);
                    self.progress.emit(ProgressEvent::Found {
                        source_id: record.source_id,
                    });
                    outcome.records.push(record);
                }
                PageOutcome::Empty(id) => {
                    seen.insert(id);
                    self.progress.emit(ProgressEvent::Skipped { source_id: id });
                    outcome.skipped.push(id);
                }
                PageOutcome::Failed { id, error } => {
                    seen.insert(id);
                    self.progress.emit(ProgressEvent::Failed { source_id: id });
                    outcome.failed.push(FailedPage { id, error });
                }
            }
        }

        if let Err(e) = dispatcher.await {
            warn!("Page dispatcher stopped early: {}", e);
        }

        // A worker that died without reporting still gets a terminal state
        for id in ids.filter(|id| !seen.contains(id)) {
            warn!("No result for page {}", id);
            outcome.failed.push(FailedPage {
                id,
                error: "worker exited without a result".into(),
            });
        }

        info!(
            "Crawled {} pages ({} found, {} skipped, {} failed)",
            outcome.total(),
            outcome.records.len(),
            outcome.skipped.len(),
            outcome.failed.len()
        );
        if let Some(last) = outcome.failed.last() {
            warn!(
                "{} pages failed, last error (id {}): {}",
                outcome.failed.len(),
                last.id,
                last.error
            );
        }

        outcome
    }

    /// Fetch with retry, then extract.
    pub async fn visit(&self, id: u32) -> PageOutcome {
        match self.fetch_with_retry(id).await {
            Ok(bytes) => {
                let html = String::from_utf8_lossy(&bytes);
                match parser::parse_page(id, &html, &self.base_url) {
                    Extraction::Record(record) => PageOutcome::Extracted(record),
                    Extraction::Empty => PageOutcome::Empty(id),
                }
            }
            Err(e) => PageOutcome::Failed {
                id,
                error: e.to_string(),
            },
        }
    }

    async fn fetch_with_retry(&self, id: u32) -> Result<Vec<u8>, FetchError> {
        let target = format!("page {}", id);
        self.policy
            .run(&target, &self.progress, |_| self.pages.fetch(id))
            .await
    }
}
