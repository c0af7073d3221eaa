pub mod hub;
pub mod targets;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use hub::{HubClient, HubError};
pub use targets::{resolve_targets, select_targets};

/// A cast as fetched from the network, before entity extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawCast {
    pub hash: String,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub author: Option<CastAuthor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CastAuthor {
    pub fid: u64,
    pub username: Option<String>,
}

#[async_trait]
pub trait CastSource: Send + Sync {
    /// Most recent casts of one author, newest first
    async fn casts_by_fid(&self, fid: u64, limit: usize) -> Result<Vec<RawCast>, HubError>;
}

/// Per-author page size for a total fetch budget
pub fn casts_per_fid(total_limit: usize, fid_count: usize) -> usize {
    if fid_count == 0 {
        return 0;
    }
    (total_limit / fid_count).clamp(2, 10)
}

/// Fetch casts for every target author and drop duplicate hashes.
///
/// A failing author is logged and skipped; the rest of the run continues.
pub async fn fetch_targets(
    source: &dyn CastSource,
    fids: &[u64],
    total_limit: usize,
    concurrency: usize,
    request_delay: Duration,
) -> Vec<RawCast> {
    let per_fid = casts_per_fid(total_limit, fids.len());
    if per_fid == 0 {
        warn!("No target FIDs, nothing to fetch");
        return Vec::new();
    }

    info!(fids = fids.len(), per_fid, "Fetching casts");

    let batches: Vec<Vec<RawCast>> = stream::iter(fids.iter().copied())
        .map(|fid| async move {
            let result = source.casts_by_fid(fid, per_fid).await;
            if !request_delay.is_zero() {
                tokio::time::sleep(request_delay).await;
            }
            match result {
                Ok(casts) => {
                    debug!(fid, count = casts.len(), "Fetched casts");
                    casts
                }
                Err(e) => {
                    warn!(fid, error = %e, "Cast fetch failed");
                    Vec::new()
                }
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let mut seen = HashSet::new();
    let unique: Vec<RawCast> = batches
        .into_iter()
        .flatten()
        .filter(|cast| !cast.hash.is_empty() && seen.insert(cast.hash.clone()))
        .collect();

    info!(count = unique.len(), "Fetched unique casts");
    unique
}
