use std::fmt;

use futures::stream::{self, StreamExt};
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::blob::{filename_from_url, BlobMeta, BlobSink, DEFAULT_CONTENT_TYPE};
use crate::fetcher::FetchError;
use crate::progress::{Progress, ProgressEvent};
use crate::record::{BlobId, Record};
use crate::retry::RetryPolicy;

#[derive(Debug, Error)]
pub enum ImageError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Blob(#[from] crate::blob::BlobError),
}

/// Result of one image that did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageOutcome {
    Stored(BlobId),
    /// HEAD answered with a client or server error; nothing to download.
    Skipped { status: u16 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReason {
    Skipped(u16),
    Failed(String),
    /// The thumbnail had no source attribute to download from.
    NoSource,
}

impl fmt::Display for MissingReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingReason::Skipped(status) => write!(f, "HEAD returned {}", status),
            MissingReason::Failed(error) => write!(f, "{}", error),
            MissingReason::NoSource => write!(f, "thumbnail has no source URL"),
        }
    }
}

/// An image left without a blob after its final attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingImage {
    pub source_id: u32,
    pub index: usize,
    pub url: String,
    pub reason: MissingReason,
}

pub struct ImageFetcher<'a> {
    client: reqwest::Client,
    sink: &'a dyn BlobSink,
    policy: RetryPolicy,
    progress: Progress,
}

impl<'a> ImageFetcher<'a> {
    pub fn new(
        client: reqwest::Client,
        sink: &'a dyn BlobSink,
        policy: RetryPolicy,
        progress: Progress,
    ) -> Self {
        Self {
            client,
            sink,
            policy,
            progress,
        }
    }

    /// Download `url` into the blob sink, retrying the whole HEAD + GET sequence.
    pub async fn store(&self, url: &str) -> Result<ImageOutcome, ImageError> {
        self.policy
            .run(url, &self.progress, |_| self.store_once(url))
            .await
    }

    async fn store_once(&self, url: &str) -> Result<ImageOutcome, ImageError> {
        let head = self
            .client
            .head(url)
            .send()
            .await
            .map_err(FetchError::from)?;
        let status = head.status().as_u16();
        if status >= 400 {
            return Ok(ImageOutcome::Skipped { status });
        }

        let content_type = head
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let mut writer = self
            .sink
            .open(BlobMeta {
                content_type,
                filename: filename_from_url(url),
            })
            .await?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(FetchError::from)?;

        // Chunks go straight to the writer; an error here drops it unclosed
        let mut body = response.bytes_stream();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(FetchError::from)?;
            writer.write(&chunk).await?;
        }

        Ok(ImageOutcome::Stored(writer.close().await?))
    }

    /// Store every image of every record, `concurrency` records at a time.
    /// Images of one record go in order. Returns the images that ended without a blob.
    pub async fn store_all(&self, records: &mut [Record], concurrency: usize) -> Vec<MissingImage> {
        let total: usize = records.iter().map(|r| r.images.len()).sum();
        self.progress.emit(ProgressEvent::StoringImages {
            records: records.len(),
        });
        info!("Storing {} images from {} records", total, records.len());

        let missing: Vec<MissingImage> = stream::iter(records.iter_mut())
            .map(|record| self.store_record(record))
            .buffer_unordered(concurrency.max(1))
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flatten()
            .collect();

        info!(
            "Stored {} of {} images ({} missing)",
            total - missing.len(),
            total,
            missing.len()
        );
        missing
    }

    async fn store_record(&self, record: &mut Record) -> Vec<MissingImage> {
        let mut missing = Vec::new();
        for (index, image) in record.images.iter_mut().enumerate() {
            let outcome = if image.source_url.is_empty() {
                None
            } else {
                Some(self.store(&image.source_url).await)
            };
            let reason = match outcome {
                None => MissingReason::NoSource,
                Some(Ok(ImageOutcome::Stored(id))) => {
                    image.blob_id = Some(id);
                    self.progress.emit(ProgressEvent::Stored {
                        url: image.source_url.clone(),
                    });
                    continue;
                }
                Some(Ok(ImageOutcome::Skipped { status })) => {
                    debug!("Skipping {} (HEAD {})", image.source_url, status);
                    MissingReason::Skipped(status)
                }
                Some(Err(e)) => {
                    warn!("Image {} of record {} failed: {}", index, record.source_id, e);
                    MissingReason::Failed(e.to_string())
                }
            };

            self.progress.emit(ProgressEvent::Missing {
                url: image.source_url.clone(),
            });
            missing.push(MissingImage {
                source_id: record.source_id,
                index,
                url: image.source_url.clone(),
                reason,
            });
        }
        missing
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::*;
    use crate::blob::{BlobError, BlobWriter};
    use crate::fetcher::build_client;
    use crate::record::Image;

    type Blobs = Arc<Mutex<Vec<(BlobMeta, Vec<u8>)>>>;

    /// Keeps closed blobs in memory; optionally refuses every write.
    #[derive(Default)]
    struct MemorySink {
        blobs: Blobs,
        fail_writes: bool,
    }

    struct MemoryWriter {
        blobs: Blobs,
        meta: BlobMeta,
        buf: Vec<u8>,
        fail_writes: bool,
    }

    #[async_trait]
    impl BlobSink for MemorySink {
        async fn open(&self, meta: BlobMeta) -> Result<Box<dyn BlobWriter>, BlobError> {
            Ok(Box::new(MemoryWriter {
                blobs: Arc::clone(&self.blobs),
                meta,
                buf: Vec::new(),
                fail_writes: self.fail_writes,
            }))
        }
    }

    #[async_trait]
    impl BlobWriter for MemoryWriter {
        async fn write(&mut self, chunk: &[u8]) -> Result<(), BlobError> {
            if self.fail_writes {
                return Err(BlobError::Unavailable("disk full".into()));
            }
            self.buf.extend_from_slice(chunk);
            Ok(())
        }

        async fn close(&mut self) -> Result<BlobId, BlobError> {
            let mut blobs = self.blobs.lock().unwrap();
            blobs.push((self.meta.clone(), std::mem::take(&mut self.buf)));
            Ok(BlobId(blobs.len() as i64))
        }
    }

    fn fetcher(sink: &MemorySink) -> ImageFetcher<'_> {
        ImageFetcher::new(
            build_client(Duration::from_secs(5)).unwrap(),
            sink,
            RetryPolicy::new(5, Duration::ZERO),
            Progress::disabled(),
        )
    }

    fn record(id: u32, urls: &[String]) -> Record {
        Record {
            source_id: id,
            name: format!("Burg {}", id),
            images: urls.iter().map(Image::new).collect(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn stores_image_with_head_content_type() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/img/1.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .create_async()
            .await;
        server
            .mock("GET", "/img/1.png")
            .with_status(200)
            .with_body(b"\x89PNG")
            .create_async()
            .await;

        let sink = MemorySink::default();
        let mut records = vec![record(3, &[format!("{}/img/1.png", server.url())])];
        let missing = fetcher(&sink).store_all(&mut records, 1).await;

        assert!(missing.is_empty());
        assert_eq!(records[0].images[0].blob_id, Some(BlobId(1)));
        let blobs = sink.blobs.lock().unwrap();
        assert_eq!(blobs[0].0.content_type, "image/png");
        assert_eq!(blobs[0].0.filename, "1.png");
        assert_eq!(blobs[0].1, b"\x89PNG");
    }

    #[tokio::test]
    async fn content_type_defaults_to_jpeg() {
        let mut server = mockito::Server::new_async().await;
        server.mock("HEAD", "/a.jpg").with_status(200).create_async().await;
        server
            .mock("GET", "/a.jpg")
            .with_status(200)
            .with_body("jpeg")
            .create_async()
            .await;

        let sink = MemorySink::default();
        let outcome = fetcher(&sink)
            .store(&format!("{}/a.jpg", server.url()))
            .await
            .unwrap();

        assert_eq!(outcome, ImageOutcome::Stored(BlobId(1)));
        assert_eq!(sink.blobs.lock().unwrap()[0].0.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn head_error_is_skipped_without_retry() {
        let mut server = mockito::Server::new_async().await;
        let head = server
            .mock("HEAD", "/gone.jpg")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;
        let get = server.mock("GET", "/gone.jpg").expect(0).create_async().await;

        let sink = MemorySink::default();
        let url = format!("{}/gone.jpg", server.url());
        let mut records = vec![record(8, &[url.clone()])];
        let missing = fetcher(&sink).store_all(&mut records, 1).await;

        assert_eq!(
            missing,
            vec![MissingImage {
                source_id: 8,
                index: 0,
                url,
                reason: MissingReason::Skipped(404),
            }]
        );
        assert_eq!(records[0].images[0].blob_id, None);
        head.assert_async().await;
        get.assert_async().await;
    }

    #[tokio::test]
    async fn failing_download_is_missing_once_after_five_attempts() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("HEAD", "/b.jpg")
            .with_status(200)
            .expect(5)
            .create_async()
            .await;
        let get = server
            .mock("GET", "/b.jpg")
            .with_status(500)
            .expect(5)
            .create_async()
            .await;

        let sink = MemorySink::default();
        let mut records = vec![record(2, &[format!("{}/b.jpg", server.url())])];
        let missing = fetcher(&sink).store_all(&mut records, 1).await;

        assert_eq!(missing.len(), 1);
        assert!(matches!(missing[0].reason, MissingReason::Failed(_)));
        assert!(sink.blobs.lock().unwrap().is_empty());
        get.assert_async().await;
    }

    #[tokio::test]
    async fn writer_failure_leaves_image_missing() {
        let mut server = mockito::Server::new_async().await;
        server.mock("HEAD", "/c.jpg").with_status(200).create_async().await;
        server
            .mock("GET", "/c.jpg")
            .with_status(200)
            .with_body("bytes")
            .create_async()
            .await;

        let sink = MemorySink {
            fail_writes: true,
            ..Default::default()
        };
        let mut records = vec![record(5, &[format!("{}/c.jpg", server.url())])];
        let missing = fetcher(&sink).store_all(&mut records, 1).await;

        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].reason, MissingReason::Failed("blob store unavailable: disk full".into()));
        assert_eq!(records[0].images[0].blob_id, None);
    }

    #[tokio::test]
    async fn each_image_ends_stored_or_missing() {
        let mut server = mockito::Server::new_async().await;
        server.mock("HEAD", "/ok.jpg").with_status(200).create_async().await;
        server
            .mock("GET", "/ok.jpg")
            .with_status(200)
            .with_body("x")
            .create_async()
            .await;
        server.mock("HEAD", "/no.jpg").with_status(410).create_async().await;

        let ok = format!("{}/ok.jpg", server.url());
        let no = format!("{}/no.jpg", server.url());
        let mut records = vec![
            record(1, &[ok.clone(), no.clone()]),
            record(2, &[no.clone()]),
            record(3, &[]),
        ];
        let sink = MemorySink::default();
        let missing = fetcher(&sink).store_all(&mut records, 2).await;

        for r in &records {
            for (i, img) in r.images.iter().enumerate() {
                let listed = missing.iter().any(|m| m.source_id == r.source_id && m.index == i);
                assert_ne!(img.blob_id.is_some(), listed, "record {} image {}", r.source_id, i);
            }
        }
        assert_eq!(missing.len(), 2);
    }

    #[tokio::test]
    async fn thumbnail_without_source_is_missing_without_requests() {
        let mut server = mockito::Server::new_async().await;
        let ok = format!("{}/ok.jpg", server.url());
        server.mock("HEAD", "/ok.jpg").with_status(200).create_async().await;
        server
            .mock("GET", "/ok.jpg")
            .with_status(200)
            .with_body("x")
            .create_async()
            .await;

        let sink = MemorySink::default();
        let mut records = vec![record(4, &[String::new(), ok])];
        let missing = fetcher(&sink).store_all(&mut records, 1).await;

        assert_eq!(
            missing,
            vec![MissingImage {
                source_id: 4,
                index: 0,
                url: String::new(),
                reason: MissingReason::NoSource,
            }]
        );
        assert!(records[0].images[1].blob_id.is_some());
        assert_eq!(sink.blobs.lock().unwrap().len(), 1);
    }
}
