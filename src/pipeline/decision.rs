use crate::analysis::Significance;

/// Whether a run should claim a batch and post it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostDecision {
    Post { reason: String },
    Skip(SkipReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    InsufficientData { unbatched: u64, required: u64 },
    NoAnalysisData,
    NotSignificant { score: u32 },
    /// Fixed mode only posts on explicit request
    NotRequested,
}

/// Pattern-mode gate.
///
/// The minimum count always applies. `force` bypasses only the
/// significance check.
pub fn should_post(
    unbatched: u64,
    min_patterns: u64,
    significance: Option<&Significance>,
    force: bool,
) -> PostDecision {
    if unbatched < min_patterns {
        return PostDecision::Skip(SkipReason::InsufficientData {
            unbatched,
            required: min_patterns,
        });
    }

    if force {
        return PostDecision::Post {
            reason: "manual override".to_string(),
        };
    }

    match significance {
        None => PostDecision::Skip(SkipReason::NoAnalysisData),
        Some(s) if s.is_significant => PostDecision::Post {
            reason: format!(
                "patterns detected (score {}): {}",
                s.score,
                s.reasons.join("; ")
            ),
        },
        Some(s) => PostDecision::Skip(SkipReason::NotSignificant { score: s.score }),
    }
}

/// Fixed-size mode gate: posts only when requested and enough records exist
pub fn should_post_fixed(unbatched: u64, min_patterns: u64, requested: bool) -> PostDecision {
    if !requested {
        return PostDecision::Skip(SkipReason::NotRequested);
    }
    if unbatched < min_patterns {
        return PostDecision::Skip(SkipReason::InsufficientData {
            unbatched,
            required: min_patterns,
        });
    }
    PostDecision::Post {
        reason: "fixed-size batch requested".to_string(),
    }
}
