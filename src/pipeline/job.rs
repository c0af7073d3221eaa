use super::decision::{should_post, should_post_fixed, PostDecision, SkipReason};
use crate::analysis::{ReportComposer, SignificanceScorer, WindowAggregator, WindowStats};
use crate::batch::{batch_range, BatchCoordinator};
use crate::config::types::{Config, PostingMode, TargetsConfig};
use crate::extract::EntitySource;
use crate::publish::Publisher;
use crate::source::{fetch_targets, resolve_targets, CastSource};
use crate::storage::{RecordFilter, RecordStore};
use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Job parameters taken from the loaded config
#[derive(Debug, Clone)]
pub struct JobSettings {
    pub targets: TargetsConfig,
    pub fetch_limit: usize,
    pub fetch_concurrency: usize,
    pub request_delay: Duration,
    pub window_hours: u64,
    pub mode: PostingMode,
    pub min_patterns: u64,
    pub max_claim: u64,
}

impl JobSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            targets: config.targets.clone(),
            fetch_limit: config.hub.fetch_limit,
            fetch_concurrency: config.hub.concurrency,
            request_delay: config.hub.request_delay,
            window_hours: config.analysis.window_hours,
            mode: config.posting.mode,
            min_patterns: config.posting.min_patterns(),
            max_claim: config.posting.max_claim,
        }
    }
}

/// How a single archive run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    NoCasts,
    NoRecords,
    StoreUnavailable {
        error: String,
    },
    InsufficientData {
        unbatched: u64,
        required: u64,
    },
    NoAnalysisData,
    NotSignificant {
        score: u32,
    },
    NotRequested {
        unbatched: u64,
    },
    BatchFailed {
        error: String,
    },
    DeliveryFailed {
        batch_id: i64,
        error: String,
    },
    Posted {
        batch_id: i64,
        post_hash: String,
        start: u64,
        end: u64,
        claimed: u64,
    },
}

impl JobOutcome {
    pub fn is_posted(&self) -> bool {
        matches!(self, JobOutcome::Posted { .. })
    }

    fn skipped(reason: SkipReason, unbatched: u64) -> Self {
        match reason {
            SkipReason::InsufficientData {
                unbatched,
                required,
            } => JobOutcome::InsufficientData {
                unbatched,
                required,
            },
            SkipReason::NoAnalysisData => JobOutcome::NoAnalysisData,
            SkipReason::NotSignificant { score } => JobOutcome::NotSignificant { score },
            SkipReason::NotRequested => JobOutcome::NotRequested { unbatched },
        }
    }
}

impl fmt::Display for JobOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobOutcome::NoCasts => write!(f, "no casts to process"),
            JobOutcome::NoRecords => write!(f, "no records extracted"),
            JobOutcome::StoreUnavailable { error } => write!(f, "store unavailable: {}", error),
            JobOutcome::InsufficientData {
                unbatched,
                required,
            } => write!(f, "insufficient data ({}/{})", unbatched, required),
            JobOutcome::NoAnalysisData => write!(f, "no analysis data"),
            JobOutcome::NotSignificant { score } => {
                write!(f, "patterns not significant (score {})", score)
            }
            JobOutcome::NotRequested { unbatched } => {
                write!(f, "archive complete, {} un-batched, posting not requested", unbatched)
            }
            JobOutcome::BatchFailed { error } => write!(f, "batch creation failed: {}", error),
            JobOutcome::DeliveryFailed { batch_id, error } => {
                write!(f, "batch {} created but not posted: {}", batch_id, error)
            }
            JobOutcome::Posted {
                batch_id,
                post_hash,
                start,
                end,
                claimed,
            } => write!(
                f,
                "batch {} posted as {} (#{}–#{}, {} records)",
                batch_id, post_hash, start, end, claimed
            ),
        }
    }
}

/// One fetch, extract, archive and maybe post cycle.
///
/// Holds no state between runs; statistics are recomputed on every call.
pub struct ArchiveJob {
    store: Arc<dyn RecordStore>,
    source: Arc<dyn CastSource>,
    entities: EntitySource,
    aggregator: WindowAggregator,
    scorer: SignificanceScorer,
    coordinator: BatchCoordinator,
    composer: ReportComposer,
    publisher: Arc<dyn Publisher>,
    settings: JobSettings,
}

impl ArchiveJob {
    pub fn new(
        store: Arc<dyn RecordStore>,
        source: Arc<dyn CastSource>,
        entities: EntitySource,
        publisher: Arc<dyn Publisher>,
        settings: JobSettings,
    ) -> Self {
        Self {
            aggregator: WindowAggregator::new(store.clone()),
            coordinator: BatchCoordinator::new(store.clone(), settings.max_claim),
            scorer: SignificanceScorer::new(),
            composer: ReportComposer::new(),
            store,
            source,
            entities,
            publisher,
            settings,
        }
    }

    pub fn settings(&self) -> &JobSettings {
        &self.settings
    }

    /// Run the whole cycle. `force` is the manual override: it bypasses the
    /// significance check in pattern mode and requests a post in fixed mode.
    pub async fn run(&self, force: bool) -> JobOutcome {
        info!(force, mode = ?self.settings.mode, "Archive job started");

        let outcome = self.run_inner(force).await;

        match &outcome {
            JobOutcome::StoreUnavailable { .. }
            | JobOutcome::BatchFailed { .. }
            | JobOutcome::DeliveryFailed { .. } => error!(status = %outcome, "Archive job finished"),
            _ => info!(status = %outcome, "Archive job finished"),
        }
        outcome
    }

    async fn run_inner(&self, force: bool) -> JobOutcome {
        let now = Utc::now();

        let fids = resolve_targets(self.store.as_ref(), &self.settings.targets, now).await;
        let casts = fetch_targets(
            self.source.as_ref(),
            &fids,
            self.settings.fetch_limit,
            self.settings.fetch_concurrency,
            self.settings.request_delay,
        )
        .await;
        if casts.is_empty() {
            return JobOutcome::NoCasts;
        }

        let records = self.entities.process_casts(&casts, now).await;
        if records.is_empty() {
            return JobOutcome::NoRecords;
        }

        match self.store.write_records(&records).await {
            Ok(inserted) => info!(inserted, processed = records.len(), "Records archived"),
            Err(e) => {
                return JobOutcome::StoreUnavailable {
                    error: e.to_string(),
                }
            }
        }

        self.post_step(force).await
    }

    /// Gate, claim, render and deliver against what is already archived
    pub async fn post_step(&self, force: bool) -> JobOutcome {
        let unbatched = match self.store.count_records(RecordFilter::Unbatched).await {
            Ok(count) => count,
            Err(e) => {
                return JobOutcome::StoreUnavailable {
                    error: e.to_string(),
                }
            }
        };
        info!(unbatched, "Un-batched records");

        let (decision, stats) = match self.settings.mode {
            PostingMode::Fixed => (
                should_post_fixed(unbatched, self.settings.min_patterns, force),
                None,
            ),
            PostingMode::Pattern => {
                if unbatched < self.settings.min_patterns {
                    (should_post(unbatched, self.settings.min_patterns, None, force), None)
                } else {
                    let stats = self.load_stats().await;
                    let significance = stats.as_ref().map(|s| self.scorer.score(Some(s)));
                    (
                        should_post(
                            unbatched,
                            self.settings.min_patterns,
                            significance.as_ref(),
                            force,
                        ),
                        stats,
                    )
                }
            }
        };

        let reason = match decision {
            PostDecision::Post { reason } => reason,
            PostDecision::Skip(skip) => return JobOutcome::skipped(skip, unbatched),
        };
        info!(reason = %reason, "Posting batch");

        let (start, end) = batch_range(unbatched, self.settings.max_claim);
        let claim = match self.coordinator.create_batch(start, end).await {
            Ok(claim) => claim,
            Err(e) => {
                return JobOutcome::BatchFailed {
                    error: e.to_string(),
                }
            }
        };

        // Rendered from the claim's declared range, never a re-count
        let text = match self.settings.mode {
            PostingMode::Fixed => self.composer.render_fixed(claim.batch_id, claim.start, claim.end),
            PostingMode::Pattern => {
                self.composer
                    .render(stats.as_ref(), claim.batch_id, claim.start, claim.end)
            }
        };

        let post_hash = match self.publisher.publish(&text).await {
            Ok(hash) => hash,
            Err(e) => {
                return JobOutcome::DeliveryFailed {
                    batch_id: claim.batch_id,
                    error: e.to_string(),
                }
            }
        };

        if let Err(e) = self.store.mark_batch_posted(claim.batch_id, &post_hash).await {
            warn!(batch_id = claim.batch_id, error = %e, "Could not record post hash");
        }

        JobOutcome::Posted {
            batch_id: claim.batch_id,
            post_hash,
            start: claim.start,
            end: claim.end,
            claimed: claim.claimed,
        }
    }

    /// Window statistics, with a read failure logged and treated as absent
    async fn load_stats(&self) -> Option<WindowStats> {
        match self.aggregator.analyze(self.settings.window_hours).await {
            Ok(stats) => stats,
            Err(e) => {
                error!(error = %e, "Window analysis failed");
                None
            }
        }
    }
}
