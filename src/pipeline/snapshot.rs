use crate::analysis::{Significance, SignificanceScorer, WindowAggregator, WindowStats};
use crate::storage::{Batch, RecordFilter, RecordStore, StorageError};
use serde::Serialize;

const RECENT_BATCHES: usize = 10;

/// Archive totals as reported by `wen stats` and `GET /api/stats`
#[derive(Debug, Clone, Serialize)]
pub struct ArchiveStats {
    pub total_patterns: u64,
    pub unarchived: u64,
    pub latest_batch: Option<Batch>,
    pub recent_batches: Vec<Batch>,
    pub ready_to_post: bool,
}

impl ArchiveStats {
    pub async fn collect(store: &dyn RecordStore, min_patterns: u64) -> Result<Self, StorageError> {
        let total_patterns = store.count_records(RecordFilter::All).await?;
        let unarchived = store.count_records(RecordFilter::Unbatched).await?;
        let recent_batches = store.recent_batches(RECENT_BATCHES).await?;

        Ok(Self {
            total_patterns,
            unarchived,
            latest_batch: recent_batches.first().cloned(),
            recent_batches,
            ready_to_post: unarchived >= min_patterns,
        })
    }
}

/// Read-only view of the current window and its score
#[derive(Debug, Clone, Serialize)]
pub struct Diagnosis {
    pub window_hours: u64,
    pub stats: Option<WindowStats>,
    pub significance: Significance,
}

impl Diagnosis {
    pub async fn collect(
        aggregator: &WindowAggregator,
        scorer: &SignificanceScorer,
        window_hours: u64,
    ) -> Result<Self, StorageError> {
        let stats = aggregator.analyze(window_hours).await?;
        let significance = scorer.score(stats.as_ref());

        Ok(Self {
            window_hours,
            stats,
            significance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::Entities;
    use crate::storage::{DuckDbStore, NewRecord};
    use chrono::{Duration, Utc};
    use std::sync::Arc;

    async fn seeded_store(count: usize) -> Arc<DuckDbStore> {
        let store = Arc::new(DuckDbStore::in_memory().unwrap());
        store.init_schema().await.unwrap();
        let now = Utc::now();
        let records: Vec<NewRecord> = (0..count)
            .map(|i| NewRecord {
                cast_hash: format!("0x{:x}", i),
                author_id: (i % 4) as u64 + 1,
                author_handle: None,
                content: "gm #base".to_string(),
                entities: Entities {
                    hashtags: vec!["#base".to_string()],
                    ..Entities::default()
                },
                timestamp: now - Duration::minutes(i as i64),
            })
            .collect();
        store.write_records(&records).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_stats_ready_flag() {
        let store = seeded_store(120).await;

        let stats = ArchiveStats::collect(store.as_ref(), 100).await.unwrap();
        assert_eq!(stats.total_patterns, 120);
        assert_eq!(stats.unarchived, 120);
        assert!(stats.ready_to_post);
        assert!(stats.latest_batch.is_none());

        let stats = ArchiveStats::collect(store.as_ref(), 500).await.unwrap();
        assert!(!stats.ready_to_post);
    }

    #[tokio::test]
    async fn test_stats_latest_batch() {
        let store = seeded_store(50).await;
        let claim = store
            .create_batch(
                crate::storage::NewBatch {
                    start_entry: 0,
                    end_entry: 30,
                },
                30,
            )
            .await
            .unwrap();

        let stats = ArchiveStats::collect(store.as_ref(), 100).await.unwrap();
        assert_eq!(stats.unarchived, 20);
        assert_eq!(stats.latest_batch.map(|b| b.id), Some(claim.batch_id));
        assert_eq!(stats.recent_batches.len(), 1);
    }

    #[tokio::test]
    async fn test_diagnosis_does_not_mutate() {
        let store = seeded_store(40).await;
        let aggregator = WindowAggregator::new(store.clone());

        let diagnosis = Diagnosis::collect(&aggregator, &SignificanceScorer::new(), 12)
            .await
            .unwrap();

        let stats = diagnosis.stats.unwrap();
        assert_eq!(stats.total, 40);
        assert_eq!(stats.trending_hashtags[0], ("#base".to_string(), 40));
        assert_eq!(diagnosis.significance.score, 4);
        assert!(!diagnosis.significance.is_significant);
        assert_eq!(
            store.count_records(RecordFilter::Unbatched).await.unwrap(),
            40
        );
    }
}
