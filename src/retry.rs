use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::progress::{Progress, ProgressEvent};

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Run `op` until it succeeds or `attempts` calls have failed; the last error is returned.
    /// `op` receives the 1-based attempt number.
    pub async fn run<T, E, F, Fut>(&self, target: &str, progress: &Progress, mut op: F) -> Result<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            progress.emit(ProgressEvent::Attempt {
                target: target.to_string(),
                attempt,
                of: attempts,
            });

            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    debug!(
                        "{} failed (attempt {}/{}): {}, retrying in {:.1}s",
                        target,
                        attempt,
                        attempts,
                        e,
                        self.delay.as_secs_f64()
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!("{} failed after {} attempts: {}", target, attempts, e);
                    return Err(e);
                }
            }
        }
    }
}
