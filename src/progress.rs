use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::debug;

/// Status updates emitted by the crawl and image phases.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Started { total: u32 },
    Attempt { target: String, attempt: u32, of: u32 },
    Found { source_id: u32 },
    Skipped { source_id: u32 },
    Failed { source_id: u32 },
    StoringImages { records: usize },
    Stored { url: String },
    Missing { url: String },
    Persisting { records: usize },
}

/// Cheap, cloneable sender side. Emitting never blocks and never fails.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    tx: Option<UnboundedSender<ProgressEvent>>,
}

impl Progress {
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn emit(&self, event: ProgressEvent) {
        if let Some(tx) = &self.tx {
            // Reporter gone means nobody is watching.
            let _ = tx.send(event);
        }
    }
}

/// Counters accumulated by the reporter over a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgressSummary {
    pub total: u32,
    pub attempts: usize,
    pub found: usize,
    pub skipped: usize,
    pub failed: usize,
    pub stored: usize,
    pub missing: usize,
}

impl ProgressSummary {
    fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { total } => self.total = *total,
            ProgressEvent::Attempt { .. } => self.attempts += 1,
            ProgressEvent::Found { .. } => self.found += 1,
            ProgressEvent::Skipped { .. } => self.skipped += 1,
            ProgressEvent::Failed { .. } => self.failed += 1,
            ProgressEvent::Stored { .. } => self.stored += 1,
            ProgressEvent::Missing { .. } => self.missing += 1,
            ProgressEvent::StoringImages { .. } | ProgressEvent::Persisting { .. } => {}
        }
    }

    fn message(&self, event: &ProgressEvent) -> Option<String> {
        match event {
            ProgressEvent::Started { total } => Some(format!("Crawling {} pages...", total)),
            ProgressEvent::Found { .. }
            | ProgressEvent::Skipped { .. }
            | ProgressEvent::Failed { .. } => Some(format!(
                "Crawling... Found: {}, Skipped: {}, Failed: {}",
                self.found, self.skipped, self.failed
            )),
            ProgressEvent::StoringImages { records } => {
                Some(format!("Storing images of {} castles...", records))
            }
            ProgressEvent::Stored { url } | ProgressEvent::Missing { url } => Some(format!(
                "Storing images... Stored: {}, Missing: {} ({})",
                self.stored, self.missing, url
            )),
            ProgressEvent::Persisting { records } => {
                Some(format!("Storing {} castles to database...", records))
            }
            ProgressEvent::Attempt { .. } => None,
        }
    }
}

/// Spawn the terminal reporter. The task ends once every `Progress` clone is dropped.
pub fn spawn_reporter(bar: ProgressBar) -> (Progress, JoinHandle<ProgressSummary>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(report(rx, bar));
    (Progress { tx: Some(tx) }, handle)
}

/// Spinner styled for the crawl; hidden when stderr is not a terminal.
pub fn spinner() -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.magenta} [{elapsed_precise}] {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

async fn report(mut rx: UnboundedReceiver<ProgressEvent>, bar: ProgressBar) -> ProgressSummary {
    let mut summary = ProgressSummary::default();
    while let Some(event) = rx.recv().await {
        summary.apply(&event);
        if let ProgressEvent::Attempt { target, attempt, of } = &event {
            if *attempt > 1 {
                debug!("Retrying {} ({}/{})", target, attempt, of);
            }
        }
        if let Some(msg) = summary.message(&event) {
            bar.set_message(msg);
        }
    }
    bar.finish_and_clear();
    summary
}
