use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use crate::blob::{BlobError, BlobMeta, BlobSink, BlobWriter};
use crate::record::{BlobId, Record};

/// Terminal sink for finished records: one bulk write per run.
pub trait RecordStore: Send + Sync {
    fn insert_records(&self, records: &[Record]) -> Result<usize>;
}

/// SQLite-backed document and blob store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn connect(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {:?}", parent))?;
        }
        let conn = Connection::open(path).with_context(|| format!("Failed to open {:?}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self::from_connection(conn))
    }

    pub fn connect_in_memory() -> Result<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("database connection poisoned"))
    }

    pub fn init_schema(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS records (
                source_id  INTEGER PRIMARY KEY,
                name       TEXT NOT NULL,
                kind       TEXT,
                document   TEXT NOT NULL,
                crawled_at TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_records_name ON records(name);

            CREATE TABLE IF NOT EXISTS blobs (
                id           INTEGER PRIMARY KEY,
                filename     TEXT NOT NULL,
                content_type TEXT NOT NULL,
                size         INTEGER NOT NULL,
                data         BLOB NOT NULL,
                created_at   TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;
        Ok(())
    }

    pub fn fetch_record(&self, source_id: u32) -> Result<Option<Record>> {
        let conn = self.conn()?;
        let document: Option<String> = conn
            .query_row(
                "SELECT document FROM records WHERE source_id = ?1",
                [source_id],
                |row| row.get(0),
            )
            .optional()?;
        document
            .map(|doc| serde_json::from_str(&doc).context("Corrupt record document"))
            .transpose()
    }

    pub fn get_stats(&self) -> Result<Stats> {
        let conn = self.conn()?;
        let records: usize = conn.query_row("SELECT COUNT(*) FROM records", [], |r| r.get(0))?;
        let with_images: usize = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE json_array_length(document, '$.images') > 0",
            [],
            |r| r.get(0),
        )?;
        let images: usize = conn.query_row(
            "SELECT COALESCE(SUM(json_array_length(document, '$.images')), 0) FROM records",
            [],
            |r| r.get(0),
        )?;
        let images_stored: usize = conn.query_row(
            "SELECT COUNT(*) FROM records, json_each(records.document, '$.images') AS img
             WHERE json_extract(img.value, '$.blobId') IS NOT NULL",
            [],
            |r| r.get(0),
        )?;
        let (blobs, blob_bytes): (usize, i64) = conn.query_row(
            "SELECT COUNT(*), COALESCE(SUM(size), 0) FROM blobs",
            [],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;
        Ok(Stats {
            records,
            with_images,
            images,
            images_stored,
            blobs,
            blob_bytes: blob_bytes.max(0) as u64,
        })
    }
}

impl RecordStore for Store {
    /// All records in one transaction; any failure rolls the whole batch back.
    fn insert_records(&self, records: &[Record]) -> Result<usize> {
        let crawled_at = chrono::Utc::now().to_rfc3339();
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let mut count = 0;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO records (source_id, name, kind, document, crawled_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for r in records {
                let document = serde_json::to_string(r)?;
                count += stmt.execute(rusqlite::params![
                    r.source_id, r.name, r.kind, document, crawled_at,
                ])?;
            }
        }
        tx.commit()?;
        Ok(count)
    }
}

// ── Blobs ──

#[async_trait]
impl BlobSink for Store {
    async fn open(&self, meta: BlobMeta) -> Result<Box<dyn BlobWriter>, BlobError> {
        Ok(Box::new(SqliteBlobWriter {
            conn: Arc::clone(&self.conn),
            meta,
            buf: Vec::new(),
            closed: false,
        }))
    }
}

/// Buffers chunks and inserts the row on close.
struct SqliteBlobWriter {
    conn: Arc<Mutex<Connection>>,
    meta: BlobMeta,
    buf: Vec<u8>,
    closed: bool,
}

#[async_trait]
impl BlobWriter for SqliteBlobWriter {
    async fn write(&mut self, chunk: &[u8]) -> Result<(), BlobError> {
        if self.closed {
            return Err(BlobError::Closed);
        }
        self.buf.extend_from_slice(chunk);
        Ok(())
    }

    async fn close(&mut self) -> Result<BlobId, BlobError> {
        if self.closed {
            return Err(BlobError::Closed);
        }
        self.closed = true;
        let data = std::mem::take(&mut self.buf);
        let conn = self
            .conn
            .lock()
            .map_err(|_| BlobError::Unavailable("database connection poisoned".into()))?;
        conn.execute(
            "INSERT INTO blobs (filename, content_type, size, data) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![self.meta.filename, self.meta.content_type, data.len() as i64, data],
        )?;
        Ok(BlobId(conn.last_insert_rowid()))
    }
}

// ── Stats ──

pub struct Stats {
    pub records: usize,
    pub with_images: usize,
    pub images: usize,
    pub images_stored: usize,
    pub blobs: usize,
    pub blob_bytes: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Image;

    fn store() -> Store {
        let store = Store::connect_in_memory().unwrap();
        store.init_schema().unwrap();
        store
    }

    fn record(id: u32, images: Vec<Image>) -> Record {
        Record {
            source_id: id,
            name: format!("Burg {}", id),
            kind: "Höhenburg".into(),
            images,
            ..Default::default()
        }
    }

    async fn put_blob(store: &Store, bytes: &[u8]) -> BlobId {
        let mut w = store
            .open(BlobMeta {
                content_type: "image/png".into(),
                filename: "a.png".into(),
            })
            .await
            .unwrap();
        w.write(&bytes[..1]).await.unwrap();
        w.write(&bytes[1..]).await.unwrap();
        w.close().await.unwrap()
    }

    #[test]
    fn bulk_insert_and_lookup() {
        let store = store();
        let records = vec![record(1, vec![]), record(2, vec![Image::new("u")])];

        assert_eq!(store.insert_records(&records).unwrap(), 2);
        assert_eq!(store.fetch_record(2).unwrap(), Some(records[1].clone()));
        assert_eq!(store.fetch_record(3).unwrap(), None);
    }

    #[test]
    fn insert_into_missing_table_fails() {
        let store = Store::connect_in_memory().unwrap();
        assert!(store.insert_records(&[record(1, vec![])]).is_err());
    }

    #[tokio::test]
    async fn blob_written_in_chunks_is_stored_whole() {
        let store = store();
        let id = put_blob(&store, b"\x89PNG-data").await;

        let conn = store.conn().unwrap();
        let (ct, size, data): (String, i64, Vec<u8>) = conn
            .query_row(
                "SELECT content_type, size, data FROM blobs WHERE id = ?1",
                [id.0],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
            )
            .unwrap();
        assert_eq!(ct, "image/png");
        assert_eq!(size, 9);
        assert_eq!(data, b"\x89PNG-data");
    }

    #[tokio::test]
    async fn dropped_writer_leaves_no_blob() {
        let store = store();
        {
            let mut w = store
                .open(BlobMeta {
                    content_type: "image/jpeg".into(),
                    filename: "x.jpg".into(),
                })
                .await
                .unwrap();
            w.write(b"partial").await.unwrap();
        }
        assert_eq!(store.get_stats().unwrap().blobs, 0);
    }

    #[tokio::test]
    async fn stats_count_images_and_blobs() {
        let store = store();
        let id = put_blob(&store, b"abc").await;
        let mut stored = Image::new("https://alleburgen.de/img/1.jpg");
        stored.blob_id = Some(id);
        let missing = Image::new("https://alleburgen.de/img/2.jpg");
        store
            .insert_records(&[record(1, vec![stored, missing]), record(2, vec![])])
            .unwrap();

        let s = store.get_stats().unwrap();
        assert_eq!(s.records, 2);
        assert_eq!(s.with_images, 1);
        assert_eq!(s.images, 2);
        assert_eq!(s.images_stored, 1);
        assert_eq!(s.blobs, 1);
        assert_eq!(s.blob_bytes, 3);
    }

    #[test]
    fn open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("castles.sqlite");
        let store = Store::connect(&path).unwrap();
        store.init_schema().unwrap();
        assert!(path.exists());
    }
}
