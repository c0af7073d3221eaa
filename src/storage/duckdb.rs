use super::traits::{
    Batch, BatchClaim, NewBatch, NewRecord, Record, RecordFilter, RecordStore, StorageError,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection, Row};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const RECORD_COLUMNS: &str = "id, cast_hash, author_id, author_handle, content, entities, epoch_us(timestamp), batch_id";
const BATCH_COLUMNS: &str =
    "id, start_entry, end_entry, total_patterns, post_hash, epoch_us(created_at)";

/// DuckDB implementation of the RecordStore trait.
///
/// All statements run on the blocking pool behind a single connection, so
/// calls are serialized. Two concurrent `create_batch` calls therefore never
/// tag the same record.
pub struct DuckDbStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    StorageError::Database(format!(
                        "cannot create directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
                info!(path = %parent.display(), "Created storage directory");
            }
        }

        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory DuckDB store (for testing)
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = self.conn.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| StorageError::Database("connection mutex poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| StorageError::Database(format!("Task join error: {}", e)))?
    }
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> duckdb::Result<DateTime<Utc>> {
    let micros: i64 = row.get(idx)?;
    DateTime::from_timestamp_micros(micros).ok_or_else(|| {
        duckdb::Error::FromSqlConversionFailure(
            idx,
            duckdb::types::Type::BigInt,
            Box::new(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "invalid timestamp",
            )),
        )
    })
}

fn record_from_row(row: &Row<'_>) -> duckdb::Result<Record> {
    let entities_json: String = row.get(5)?;
    let entities = serde_json::from_str(&entities_json).map_err(|e| {
        duckdb::Error::FromSqlConversionFailure(5, duckdb::types::Type::Text, Box::new(e))
    })?;

    Ok(Record {
        id: row.get(0)?,
        cast_hash: row.get(1)?,
        author_id: row.get(2)?,
        author_handle: row.get(3)?,
        content: row.get(4)?,
        entities,
        timestamp: timestamp_at(row, 6)?,
        batch_id: row.get(7)?,
    })
}

fn batch_from_row(row: &Row<'_>) -> duckdb::Result<Batch> {
    Ok(Batch {
        id: row.get(0)?,
        start_entry: row.get(1)?,
        end_entry: row.get(2)?,
        total_patterns: row.get(3)?,
        post_hash: row.get(4)?,
        created_at: timestamp_at(row, 5)?,
    })
}

#[async_trait]
impl RecordStore for DuckDbStore {
    async fn init_schema(&self) -> Result<(), StorageError> {
        self.with_conn(|conn| {
            conn.execute_batch(
                "CREATE SEQUENCE IF NOT EXISTS records_id_seq START 1;
                 CREATE TABLE IF NOT EXISTS records (
                    id BIGINT PRIMARY KEY DEFAULT nextval('records_id_seq'),
                    cast_hash VARCHAR NOT NULL UNIQUE,
                    author_id UBIGINT NOT NULL,
                    author_handle VARCHAR,
                    content VARCHAR NOT NULL,
                    entities VARCHAR NOT NULL,
                    timestamp TIMESTAMPTZ NOT NULL,
                    batch_id BIGINT
                 );
                 CREATE INDEX IF NOT EXISTS idx_records_timestamp ON records(timestamp);

                 CREATE SEQUENCE IF NOT EXISTS batches_id_seq START 1;
                 CREATE TABLE IF NOT EXISTS batches (
                    id BIGINT PRIMARY KEY DEFAULT nextval('batches_id_seq'),
                    start_entry UBIGINT NOT NULL,
                    end_entry UBIGINT NOT NULL,
                    total_patterns UBIGINT NOT NULL,
                    post_hash VARCHAR,
                    created_at TIMESTAMPTZ NOT NULL,
                    CHECK (start_entry < end_entry)
                 );",
            )?;
            Ok(())
        })
        .await
    }

    async fn write_records(&self, records: &[NewRecord]) -> Result<usize, StorageError> {
        if records.is_empty() {
            return Ok(0);
        }

        let records = records.to_vec();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let mut inserted = 0;
            {
                let mut stmt = tx.prepare(
                    "INSERT INTO records (cast_hash, author_id, author_handle, content, entities, timestamp)
                     VALUES (?, ?, ?, ?, ?, to_timestamp(? / 1000000.0))
                     ON CONFLICT (cast_hash) DO NOTHING",
                )?;

                for record in &records {
                    let entities_json = serde_json::to_string(&record.entities)?;
                    inserted += stmt.execute(params![
                        record.cast_hash,
                        record.author_id,
                        record.author_handle,
                        record.content,
                        entities_json,
                        record.timestamp.timestamp_micros(),
                    ])?;
                }
            }
            tx.commit()?;

            debug!(inserted, offered = records.len(), "Wrote records");
            Ok(inserted)
        })
        .await
    }

    async fn query_since(&self, since: DateTime<Utc>) -> Result<Vec<Record>, StorageError> {
        let since_micros = since.timestamp_micros();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM records
                 WHERE timestamp >= to_timestamp(? / 1000000.0)
                 ORDER BY id",
                RECORD_COLUMNS
            ))?;

            let rows = stmt.query_map(params![since_micros], record_from_row)?;

            let mut records = Vec::new();
            for row in rows {
                records.push(row?);
            }
            Ok(records)
        })
        .await
    }

    async fn count_records(&self, filter: RecordFilter) -> Result<u64, StorageError> {
        self.with_conn(move |conn| {
            let count: i64 = match filter {
                RecordFilter::All => {
                    conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?
                }
                RecordFilter::Unbatched => conn.query_row(
                    "SELECT COUNT(*) FROM records WHERE batch_id IS NULL",
                    [],
                    |row| row.get(0),
                )?,
                RecordFilter::InBatch(batch_id) => conn.query_row(
                    "SELECT COUNT(*) FROM records WHERE batch_id = ?",
                    params![batch_id],
                    |row| row.get(0),
                )?,
            };
            Ok(count.max(0) as u64)
        })
        .await
    }

    async fn active_authors(
        &self,
        since: DateTime<Utc>,
        min_casts: u64,
    ) -> Result<Vec<u64>, StorageError> {
        let since_micros = since.timestamp_micros();

        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT author_id FROM records
                 WHERE timestamp >= to_timestamp(? / 1000000.0)
                 GROUP BY author_id
                 HAVING COUNT(*) >= ?
                 ORDER BY MIN(id)",
            )?;

            let rows = stmt.query_map(params![since_micros, min_casts as i64], |row| row.get(0))?;

            let mut authors = Vec::new();
            for row in rows {
                authors.push(row?);
            }
            Ok(authors)
        })
        .await
    }

    async fn create_batch(
        &self,
        batch: NewBatch,
        max_claim: u64,
    ) -> Result<BatchClaim, StorageError> {
        if batch.end_entry <= batch.start_entry {
            return Err(StorageError::InvalidRange {
                start: batch.start_entry,
                end: batch.end_entry,
            });
        }

        let limit = i64::try_from(max_claim).map_err(|_| StorageError::ClaimTooLarge(max_claim))?;
        let created_at = Utc::now().timestamp_micros();

        self.with_conn(move |conn| {
            let tx = conn.transaction()?;

            let batch_id: i64 = tx.query_row(
                "INSERT INTO batches (start_entry, end_entry, total_patterns, created_at)
                 VALUES (?, ?, ?, to_timestamp(? / 1000000.0))
                 RETURNING id",
                params![
                    batch.start_entry,
                    batch.end_entry,
                    batch.total_patterns(),
                    created_at,
                ],
                |row| row.get(0),
            )?;

            let claimed = tx.execute(
                "UPDATE records SET batch_id = ?
                 WHERE id IN (
                    SELECT id FROM records
                    WHERE batch_id IS NULL
                    ORDER BY timestamp, id
                    LIMIT ?
                 )",
                params![batch_id, limit],
            )?;

            tx.commit()?;

            let claim = BatchClaim {
                batch_id,
                start: batch.start_entry,
                end: batch.end_entry,
                total_patterns: batch.total_patterns(),
                claimed: claimed as u64,
            };

            if claim.claimed != claim.total_patterns {
                warn!(
                    batch_id,
                    declared = claim.total_patterns,
                    claimed = claim.claimed,
                    "Batch claimed a different number of records than declared"
                );
            }

            Ok(claim)
        })
        .await
    }

    async fn mark_batch_posted(&self, batch_id: i64, post_hash: &str) -> Result<(), StorageError> {
        let post_hash = post_hash.to_string();

        self.with_conn(move |conn| {
            let updated = conn.execute(
                "UPDATE batches SET post_hash = ? WHERE id = ? AND post_hash IS NULL",
                params![post_hash, batch_id],
            )?;

            if updated == 1 {
                return Ok(());
            }

            let mut stmt = conn.prepare("SELECT post_hash FROM batches WHERE id = ?")?;
            let mut rows = stmt.query(params![batch_id])?;
            match rows.next()? {
                Some(_) => Err(StorageError::AlreadyPosted(batch_id)),
                None => Err(StorageError::BatchNotFound(batch_id)),
            }
        })
        .await
    }

    async fn get_batch(&self, batch_id: i64) -> Result<Option<Batch>, StorageError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM batches WHERE id = ?",
                BATCH_COLUMNS
            ))?;
            let mut rows = stmt.query(params![batch_id])?;

            match rows.next()? {
                Some(row) => Ok(Some(batch_from_row(row)?)),
                None => Ok(None),
            }
        })
        .await
    }

    async fn recent_batches(&self, limit: usize) -> Result<Vec<Batch>, StorageError> {
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM batches ORDER BY id DESC LIMIT ?",
                BATCH_COLUMNS
            ))?;

            let rows = stmt.query_map(params![limit as i64], batch_from_row)?;

            let mut batches = Vec::new();
            for row in rows {
                batches.push(row?);
            }
            Ok(batches)
        })
        .await
    }
}
