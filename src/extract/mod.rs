//! Entity extraction from cast text.
//!
//! The deterministic [`PatternExtractor`] always runs first. A fallback
//! extractor (normally the LLM client) is consulted only when the
//! deterministic pass found nothing and the text is long enough to be worth
//! the call. Extraction as a whole never fails: fallback errors are logged
//! and the deterministic result is kept.

pub mod llm;
pub mod pattern;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::source::RawCast;
use crate::storage::NewRecord;

pub use llm::LlmExtractor;
pub use pattern::PatternExtractor;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("extractor returned error status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed extractor response: {0}")]
    Malformed(String),
}

/// Entities found in a single cast. List order is preserved end to end.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    #[serde(default)]
    pub hashtags: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub urls: Vec<String>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        self.hashtags.is_empty() && self.mentions.is_empty() && self.urls.is_empty()
    }
}

#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<Entities, ExtractError>;
}

/// Deterministic-first extraction with an optional fallback strategy
pub struct EntitySource {
    primary: PatternExtractor,
    fallback: Option<Arc<dyn EntityExtractor>>,
    min_fallback_chars: usize,
}

impl EntitySource {
    pub fn new(min_fallback_chars: usize) -> Self {
        Self {
            primary: PatternExtractor::new(),
            fallback: None,
            min_fallback_chars,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn EntityExtractor>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub async fn extract(&self, text: &str) -> Entities {
        let entities = self.primary.extract_sync(text);

        let Some(fallback) = &self.fallback else {
            return entities;
        };

        if !entities.is_empty() || text.chars().count() <= self.min_fallback_chars {
            return entities;
        }

        match fallback.extract(text).await {
            Ok(found) => found,
            Err(e) => {
                warn!(error = %e, "Fallback extraction skipped");
                entities
            }
        }
    }

    /// Turn fetched casts into records, skipping casts without a hash or author.
    /// Casts without a timestamp are stamped with `now`.
    pub async fn process_casts(&self, casts: &[RawCast], now: DateTime<Utc>) -> Vec<NewRecord> {
        let mut records = Vec::with_capacity(casts.len());

        for cast in casts {
            let Some(author) = &cast.author else {
                debug!(hash = %cast.hash, "Skipping cast without author");
                continue;
            };
            if cast.hash.is_empty() {
                debug!(fid = author.fid, "Skipping cast without hash");
                continue;
            }

            records.push(NewRecord {
                cast_hash: cast.hash.clone(),
                author_id: author.fid,
                author_handle: author.username.clone(),
                content: cast.text.clone(),
                entities: self.extract(&cast.text).await,
                timestamp: cast.timestamp.unwrap_or(now),
            });
        }

        debug!(processed = records.len(), total = casts.len(), "Processed casts");
        records
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CastAuthor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubExtractor {
        calls: AtomicUsize,
        result: Option<Entities>,
    }

    impl StubExtractor {
        fn returning(result: Option<Entities>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                result,
            })
        }
    }

    #[async_trait]
    impl EntityExtractor for StubExtractor {
        async fn extract(&self, _text: &str) -> Result<Entities, ExtractError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .clone()
                .ok_or_else(|| ExtractError::Malformed("stub failure".to_string()))
        }
    }

    fn llm_entities() -> Entities {
        Entities {
            hashtags: vec!["#inferred".to_string()],
            mentions: vec![],
            urls: vec![],
        }
    }

    const LONG_PLAIN: &str = "a long cast with no explicit entities but plenty of words in it";

    #[tokio::test]
    async fn test_deterministic_result_skips_fallback() {
        let stub = StubExtractor::returning(Some(llm_entities()));
        let source = EntitySource::new(40).with_fallback(stub.clone());

        let entities = source.extract("gm #base @dwr https://base.org").await;

        assert_eq!(entities.hashtags, vec!["#base"]);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_used_for_long_plain_text() {
        let stub = StubExtractor::returning(Some(llm_entities()));
        let source = EntitySource::new(40).with_fallback(stub.clone());

        let entities = source.extract(LONG_PLAIN).await;

        assert_eq!(entities, llm_entities());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_short_text_never_reaches_fallback() {
        let stub = StubExtractor::returning(Some(llm_entities()));
        let source = EntitySource::new(40).with_fallback(stub.clone());

        let entities = source.extract("gm").await;

        assert!(entities.is_empty());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fallback_failure_keeps_empty_entities() {
        let stub = StubExtractor::returning(None);
        let source = EntitySource::new(40).with_fallback(stub.clone());

        let entities = source.extract(LONG_PLAIN).await;

        assert!(entities.is_empty());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_process_casts_skips_malformed() {
        let now = Utc::now();
        let author = Some(CastAuthor {
            fid: 12,
            username: Some("fid-12".to_string()),
        });
        let casts = vec![
            RawCast {
                hash: "0xaaa".to_string(),
                text: "hello #base".to_string(),
                timestamp: None,
                author: author.clone(),
            },
            RawCast {
                hash: String::new(),
                text: "no hash".to_string(),
                timestamp: None,
                author: author.clone(),
            },
            RawCast {
                hash: "0xbbb".to_string(),
                text: "no author".to_string(),
                timestamp: None,
                author: None,
            },
        ];

        let records = EntitySource::new(40).process_casts(&casts, now).await;

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].cast_hash, "0xaaa");
        assert_eq!(records[0].author_id, 12);
        assert_eq!(records[0].timestamp, now);
        assert_eq!(records[0].entities.hashtags, vec!["#base"]);
    }
}
