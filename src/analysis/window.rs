use super::frequency::FrequencyTable;
use crate::storage::{Record, RecordStore, StorageError};
use chrono::{DateTime, Duration, Utc};
use reqwest::Url;
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

/// Sentinel for URLs whose host could not be determined
pub const UNKNOWN_DOMAIN: &str = "unknown";

const TOP_HASHTAGS: usize = 5;
const TOP_MENTIONS: usize = 5;
const TOP_AUTHORS: usize = 10;
const TOP_DOMAINS: usize = 5;

/// Windows longer than this are clamped before computing the cutoff
const MAX_WINDOW_HOURS: u64 = 1_000_000;

/// Frequency statistics over a trailing window of records
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowStats {
    pub total: usize,
    pub avg_per_hour: f64,
    pub unique_authors: usize,
    pub trending_hashtags: Vec<(String, usize)>,
    pub trending_mentions: Vec<(String, usize)>,
    pub top_authors: Vec<(u64, usize)>,
    pub top_domains: Vec<(String, usize)>,
    pub timeframe_hours: u64,
    pub computed_at: DateTime<Utc>,
}

impl WindowStats {
    /// Build statistics from the records of one window.
    ///
    /// Returns None for an empty window. Records are counted in the order
    /// given, which decides ties in every ranking.
    pub fn from_records(
        records: &[Record],
        window_hours: u64,
        computed_at: DateTime<Utc>,
    ) -> Option<Self> {
        if records.is_empty() {
            return None;
        }

        let mut hashtags = FrequencyTable::new();
        let mut mentions = FrequencyTable::new();
        let mut domains = FrequencyTable::new();
        let mut authors = FrequencyTable::new();

        for record in records {
            authors.add(record.author_id);
            for tag in &record.entities.hashtags {
                hashtags.add(tag.clone());
            }
            for mention in &record.entities.mentions {
                mentions.add(mention.clone());
            }
            for url in record.entities.urls.iter().filter(|u| !u.is_empty()) {
                let domain = extract_domain(url);
                if domain != UNKNOWN_DOMAIN {
                    domains.add(domain);
                }
            }
        }

        let total = records.len();
        let avg_per_hour = if window_hours > 0 {
            round2(total as f64 / window_hours as f64)
        } else {
            0.0
        };

        Some(Self {
            total,
            avg_per_hour,
            unique_authors: authors.len(),
            trending_hashtags: hashtags.top(TOP_HASHTAGS),
            trending_mentions: mentions.top(TOP_MENTIONS),
            top_authors: authors.top(TOP_AUTHORS),
            top_domains: domains.top(TOP_DOMAINS),
            timeframe_hours: window_hours,
            computed_at,
        })
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Host of a URL with a leading `www.` removed, or [`UNKNOWN_DOMAIN`]
pub fn extract_domain(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_string))
        .filter(|host| !host.is_empty())
        .map(|host| match host.strip_prefix("www.") {
            Some(stripped) => stripped.to_string(),
            None => host,
        })
        .unwrap_or_else(|| UNKNOWN_DOMAIN.to_string())
}

/// Reads a trailing window from the store and summarizes it
pub struct WindowAggregator {
    store: Arc<dyn RecordStore>,
}

impl WindowAggregator {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// `Err` means the store could not be read; `Ok(None)` means the window is empty.
    pub async fn analyze(&self, window_hours: u64) -> Result<Option<WindowStats>, StorageError> {
        self.analyze_at(window_hours, Utc::now()).await
    }

    pub async fn analyze_at(
        &self,
        window_hours: u64,
        now: DateTime<Utc>,
    ) -> Result<Option<WindowStats>, StorageError> {
        let since = now - Duration::hours(window_hours.min(MAX_WINDOW_HOURS) as i64);
        let records = self.store.query_since(since).await?;

        debug!(records = records.len(), window_hours, "Loaded analysis window");
        Ok(WindowStats::from_records(&records, window_hours, now))
    }
}
