//! Claiming un-batched records into numbered batches.

use crate::storage::{BatchClaim, NewBatch, RecordStore, StorageError};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("invalid batch range: start {start} must be below end {end}")]
    InvalidRange { start: u64, end: u64 },

    #[error("batch creation failed: {0}")]
    Storage(#[from] StorageError),
}

/// Entry range for the next batch given the current un-batched count.
///
/// The range ends at `unbatched` and spans at most `max_claim` entries.
pub fn batch_range(unbatched: u64, max_claim: u64) -> (u64, u64) {
    let end = unbatched;
    (end - unbatched.min(max_claim), end)
}

pub struct BatchCoordinator {
    store: Arc<dyn RecordStore>,
    max_claim: u64,
}

impl BatchCoordinator {
    pub fn new(store: Arc<dyn RecordStore>, max_claim: u64) -> Self {
        Self { store, max_claim }
    }

    pub fn max_claim(&self) -> u64 {
        self.max_claim
    }

    /// Create a batch for `[start, end)` and tag up to `max_claim` of the
    /// oldest un-batched records with its id.
    ///
    /// The returned claim keeps the declared range even when fewer records
    /// were available to tag.
    pub async fn create_batch(&self, start: u64, end: u64) -> Result<BatchClaim, BatchError> {
        if end <= start {
            return Err(BatchError::InvalidRange { start, end });
        }

        let claim = self
            .store
            .create_batch(
                NewBatch {
                    start_entry: start,
                    end_entry: end,
                },
                self.max_claim,
            )
            .await
            .map_err(|e| match e {
                StorageError::InvalidRange { start, end } => BatchError::InvalidRange { start, end },
                other => BatchError::Storage(other),
            })?;

        info!(
            batch_id = claim.batch_id,
            start = claim.start,
            end = claim.end,
            claimed = claim.claimed,
            "Batch created"
        );
        Ok(claim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Entities;
    use crate::storage::{Batch, DuckDbStore, NewRecord, Record, RecordFilter};
    use async_trait::async_trait;
    use chrono::{DateTime, Duration, Utc};

    async fn store_with(count: usize) -> Arc<DuckDbStore> {
        let store = Arc::new(DuckDbStore::in_memory().unwrap());
        store.init_schema().await.unwrap();
        let base = Utc::now() - Duration::hours(1);
        let records: Vec<NewRecord> = (0..count)
            .map(|i| NewRecord {
                cast_hash: format!("0x{:04x}", i),
                author_id: 1,
                author_handle: None,
                content: String::new(),
                entities: Entities::default(),
                timestamp: base + Duration::seconds(i as i64),
            })
            .collect();
        store.write_records(&records).await.unwrap();
        store
    }

    struct FailingStore;

    #[async_trait]
    impl RecordStore for FailingStore {
        async fn init_schema(&self) -> Result<(), StorageError> {
            Ok(())
        }
        async fn write_records(&self, _: &[NewRecord]) -> Result<usize, StorageError> {
            Err(StorageError::Database("unavailable".into()))
        }
        async fn query_since(&self, _: DateTime<Utc>) -> Result<Vec<Record>, StorageError> {
            Err(StorageError::Database("unavailable".into()))
        }
        async fn count_records(&self, _: RecordFilter) -> Result<u64, StorageError> {
            Err(StorageError::Database("unavailable".into()))
        }
        async fn active_authors(&self, _: DateTime<Utc>, _: u64) -> Result<Vec<u64>, StorageError> {
            Err(StorageError::Database("unavailable".into()))
        }
        async fn create_batch(&self, _: NewBatch, _: u64) -> Result<BatchClaim, StorageError> {
            Err(StorageError::Database("unavailable".into()))
        }
        async fn mark_batch_posted(&self, _: i64, _: &str) -> Result<(), StorageError> {
            Err(StorageError::Database("unavailable".into()))
        }
        async fn get_batch(&self, _: i64) -> Result<Option<Batch>, StorageError> {
            Err(StorageError::Database("unavailable".into()))
        }
        async fn recent_batches(&self, _: usize) -> Result<Vec<Batch>, StorageError> {
            Err(StorageError::Database("unavailable".into()))
        }
    }

    #[test]
    fn test_batch_range() {
        assert_eq!(batch_range(300, 500), (0, 300));
        assert_eq!(batch_range(1200, 500), (700, 1200));
        assert_eq!(batch_range(0, 500), (0, 0));
    }

    #[tokio::test]
    async fn test_claims_exact_range() {
        let store = store_with(300).await;
        let coordinator = BatchCoordinator::new(store.clone(), 500);

        let claim = coordinator.create_batch(0, 300).await.unwrap();

        assert_eq!(claim.claimed, 300);
        assert_eq!(claim.total_patterns, 300);
        assert_eq!(
            store.count_records(RecordFilter::InBatch(claim.batch_id)).await.unwrap(),
            300
        );
        assert_eq!(store.count_records(RecordFilter::Unbatched).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_partial_claim_succeeds() {
        let store = store_with(120).await;
        let coordinator = BatchCoordinator::new(store.clone(), 500);

        let claim = coordinator.create_batch(0, 500).await.unwrap();

        assert_eq!(claim.total_patterns, 500);
        assert_eq!(claim.claimed, 120);
        let batch = store.get_batch(claim.batch_id).await.unwrap().unwrap();
        assert_eq!(batch.total_patterns, 500);
    }

    #[tokio::test]
    async fn test_second_batch_does_not_overlap() {
        let store = store_with(150).await;
        let coordinator = BatchCoordinator::new(store.clone(), 100);

        let first = coordinator.create_batch(0, 100).await.unwrap();
        let second = coordinator.create_batch(0, 50).await.unwrap();

        assert_ne!(first.batch_id, second.batch_id);
        assert_eq!(first.claimed, 100);
        assert_eq!(second.claimed, 50);
        assert_eq!(store.count_records(RecordFilter::Unbatched).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_invalid_range_rejected_before_store() {
        let coordinator = BatchCoordinator::new(Arc::new(FailingStore), 500);
        let result = coordinator.create_batch(10, 10).await;
        assert!(matches!(result, Err(BatchError::InvalidRange { start: 10, end: 10 })));
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let coordinator = BatchCoordinator::new(Arc::new(FailingStore), 500);
        let result = coordinator.create_batch(0, 100).await;
        assert!(matches!(result, Err(BatchError::Storage(StorageError::Database(_)))));
    }
}
