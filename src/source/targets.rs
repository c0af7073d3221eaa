use crate::config::types::TargetsConfig;
use crate::storage::RecordStore;
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{info, warn};

/// Curated authors first, then recently active ones, without duplicates.
/// Active authors are only added while the list is below `max_fids`.
pub fn select_targets(curated: &[u64], active: &[u64], max_fids: usize) -> Vec<u64> {
    let mut seen = HashSet::new();
    let mut targets = Vec::new();

    for fid in curated {
        if seen.insert(*fid) {
            targets.push(*fid);
        }
    }

    for fid in active {
        if targets.len() >= max_fids {
            break;
        }
        if seen.insert(*fid) {
            targets.push(*fid);
        }
    }

    targets
}

/// Start of the activity lookback. Windows reaching past the representable
/// range fall back to one day.
fn active_since(now: DateTime<Utc>, window: std::time::Duration) -> DateTime<Utc> {
    let fallback = chrono::Duration::hours(24);
    chrono::Duration::from_std(window)
        .ok()
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(now - fallback)
}

/// Build the fetch list from config and the archive's recent activity.
/// A failing activity query falls back to the curated list.
pub async fn resolve_targets(
    store: &dyn RecordStore,
    config: &TargetsConfig,
    now: DateTime<Utc>,
) -> Vec<u64> {
    let active = match store
        .active_authors(active_since(now, config.active_window), config.active_min_casts)
        .await
    {
        Ok(active) => active,
        Err(e) => {
            warn!(error = %e, "Active author detection failed, using curated list only");
            Vec::new()
        }
    };

    let targets = select_targets(&config.curated_fids, &active, config.max_fids);
    info!(
        total = targets.len(),
        curated = config.curated_fids.len(),
        active = active.len(),
        "Resolved target FIDs"
    );
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curated_first_then_active() {
        let targets = select_targets(&[12, 194], &[7, 12, 99], 30);
        assert_eq!(targets, vec![12, 194, 7, 99]);
    }

    #[test]
    fn test_active_capped_by_max() {
        let targets = select_targets(&[1, 2, 3], &[4, 5, 6], 4);
        assert_eq!(targets, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_curated_never_truncated() {
        let targets = select_targets(&[1, 2, 3], &[4], 2);
        assert_eq!(targets, vec![1, 2, 3]);
    }

    #[test]
    fn test_active_since_window() {
        let now = Utc::now();
        let six_hours = std::time::Duration::from_secs(6 * 3600);
        assert_eq!(active_since(now, six_hours), now - chrono::Duration::hours(6));
    }

    #[test]
    fn test_active_since_out_of_range_falls_back_to_a_day() {
        let now = Utc::now();
        let day_ago = now - chrono::Duration::hours(24);

        let ancient = std::time::Duration::from_secs(300_000 * 365 * 86_400);
        assert_eq!(active_since(now, ancient), day_ago);
        assert_eq!(active_since(now, std::time::Duration::MAX), day_ago);
    }

    #[test]
    fn test_duplicate_curated_collapsed() {
        let targets = select_targets(&[5, 5, 6], &[], 30);
        assert_eq!(targets, vec![5, 6]);
    }
}
