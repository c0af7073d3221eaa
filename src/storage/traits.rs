use crate::extract::Entities;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An archived cast and the entities extracted from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub id: i64,
    pub cast_hash: String,
    pub author_id: u64,
    pub author_handle: Option<String>,
    pub content: String,
    pub entities: Entities,
    pub timestamp: DateTime<Utc>,
    pub batch_id: Option<i64>,
}

/// A record that has not been assigned an id yet
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub cast_hash: String,
    pub author_id: u64,
    pub author_handle: Option<String>,
    pub content: String,
    pub entities: Entities,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub id: i64,
    pub start_entry: u64,
    pub end_entry: u64,
    pub total_patterns: u64,
    pub post_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewBatch {
    pub start_entry: u64,
    pub end_entry: u64,
}

impl NewBatch {
    pub fn total_patterns(&self) -> u64 {
        self.end_entry.saturating_sub(self.start_entry)
    }
}

/// Outcome of claiming records into a new batch.
///
/// `total_patterns` is the declared range size and is never reconciled;
/// `claimed` is the number of records that were actually tagged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchClaim {
    pub batch_id: i64,
    pub start: u64,
    pub end: u64,
    pub total_patterns: u64,
    pub claimed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFilter {
    All,
    Unbatched,
    InBatch(i64),
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn init_schema(&self) -> Result<(), StorageError>;

    /// Insert records, ignoring any whose cast hash is already stored.
    /// Returns the number of newly inserted rows.
    async fn write_records(&self, records: &[NewRecord]) -> Result<usize, StorageError>;

    /// Records with `timestamp >= since`, in archive order
    async fn query_since(&self, since: DateTime<Utc>) -> Result<Vec<Record>, StorageError>;

    async fn count_records(&self, filter: RecordFilter) -> Result<u64, StorageError>;

    /// Authors with at least `min_casts` records since `since`, in first-archived order
    async fn active_authors(
        &self,
        since: DateTime<Utc>,
        min_casts: u64,
    ) -> Result<Vec<u64>, StorageError>;

    /// Insert a batch row and tag up to `max_claim` un-batched records with
    /// its id, oldest first, as one transaction.
    async fn create_batch(&self, batch: NewBatch, max_claim: u64)
        -> Result<BatchClaim, StorageError>;

    /// Set the post hash of a batch. Fails if the batch is missing or already posted.
    async fn mark_batch_posted(&self, batch_id: i64, post_hash: &str) -> Result<(), StorageError>;

    async fn get_batch(&self, batch_id: i64) -> Result<Option<Batch>, StorageError>;

    /// Most recent batches first
    async fn recent_batches(&self, limit: usize) -> Result<Vec<Batch>, StorageError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid batch range: start {start} must be below end {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("claim size {0} exceeds the store limit")]
    ClaimTooLarge(u64),

    #[error("batch {0} not found")]
    BatchNotFound(i64),

    #[error("batch {0} already has a post hash")]
    AlreadyPosted(i64),
}

impl From<duckdb::Error> for StorageError {
    fn from(e: duckdb::Error) -> Self {
        StorageError::Database(e.to_string())
    }
}
