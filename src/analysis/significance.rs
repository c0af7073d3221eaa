//! Significance rule deciding whether a window is worth a summary post.
//!
//! Seven independent criteria each add a fixed weight and one reason. A
//! window is significant when the weights sum to at least
//! [`SIGNIFICANT_SCORE`] or when at least [`SIGNIFICANT_REASONS`] criteria
//! fired, so a single strong signal or several weak ones both qualify.

use super::window::WindowStats;
use serde::Serialize;

pub const VOLUME_PER_HOUR: f64 = 20.0;
pub const VOLUME_WEIGHT: u32 = 3;

pub const HASHTAG_TRENDING: usize = 15;
pub const HASHTAG_TRENDING_WEIGHT: u32 = 4;
pub const HASHTAG_EMERGING: usize = 8;
pub const HASHTAG_EMERGING_WEIGHT: u32 = 2;

pub const MENTION_FOCUS: usize = 8;
pub const MENTION_WEIGHT: u32 = 3;

/// Share of the window (percent) a single author must exceed
pub const AUTHOR_SHARE_PERCENT: f64 = 25.0;
pub const AUTHOR_WEIGHT: u32 = 2;

pub const DOMAIN_LINKS: usize = 5;
pub const DOMAIN_WEIGHT: u32 = 2;

pub const DIVERSE_TAG_MIN_COUNT: usize = 5;
pub const DIVERSE_TAGS: usize = 3;
pub const DIVERSITY_WEIGHT: u32 = 3;

pub const BROAD_AUTHORS: usize = 20;
pub const BROAD_WEIGHT: u32 = 2;

pub const SIGNIFICANT_SCORE: u32 = 6;
pub const SIGNIFICANT_REASONS: usize = 3;

/// Volume threshold for the optional line in a rendered report
pub const REPORT_VOLUME_PER_HOUR: f64 = 25.0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Significance {
    pub is_significant: bool,
    pub reasons: Vec<String>,
    pub score: u32,
}

impl Significance {
    fn no_data() -> Self {
        Self {
            is_significant: false,
            reasons: vec!["no data".to_string()],
            score: 0,
        }
    }
}

/// Hourly rate as shown in reasons and reports; whole numbers keep one decimal
pub fn format_rate(rate: f64) -> String {
    if rate.fract() == 0.0 {
        format!("{:.1}", rate)
    } else {
        rate.to_string()
    }
}

/// Whether the top author's share of the window exceeds the concentration threshold
pub fn author_concentrated(count: usize, total: usize) -> bool {
    total > 0 && (count as f64 / total as f64) * 100.0 > AUTHOR_SHARE_PERCENT
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SignificanceScorer;

impl SignificanceScorer {
    pub fn new() -> Self {
        Self
    }

    pub fn score(&self, stats: Option<&WindowStats>) -> Significance {
        let Some(stats) = stats else {
            return Significance::no_data();
        };

        let mut reasons = Vec::new();
        let mut score = 0;

        if stats.avg_per_hour >= VOLUME_PER_HOUR {
            reasons.push(format!("high volume ({}/h)", format_rate(stats.avg_per_hour)));
            score += VOLUME_WEIGHT;
        }

        if let Some((tag, count)) = stats.trending_hashtags.first() {
            if *count >= HASHTAG_TRENDING {
                reasons.push(format!("trending: {} ({}x)", tag, count));
                score += HASHTAG_TRENDING_WEIGHT;
            } else if *count >= HASHTAG_EMERGING {
                reasons.push(format!("emerging: {} ({}x)", tag, count));
                score += HASHTAG_EMERGING_WEIGHT;
            }
        }

        if let Some((mention, count)) = stats.trending_mentions.first() {
            if *count >= MENTION_FOCUS {
                reasons.push(format!("focus: {} ({}x)", mention, count));
                score += MENTION_WEIGHT;
            }
        }

        if let Some((fid, count)) = stats.top_authors.first() {
            if author_concentrated(*count, stats.total) {
                reasons.push(format!("fid {} dominant ({} casts)", fid, count));
                score += AUTHOR_WEIGHT;
            }
        }

        if let Some((domain, count)) = stats.top_domains.first() {
            if *count >= DOMAIN_LINKS {
                reasons.push(format!("links: {} ({}x)", domain, count));
                score += DOMAIN_WEIGHT;
            }
        }

        let diverse = stats
            .trending_hashtags
            .iter()
            .filter(|(_, count)| *count >= DIVERSE_TAG_MIN_COUNT)
            .count();
        if diverse >= DIVERSE_TAGS {
            reasons.push(format!("diverse topics ({} themes)", diverse));
            score += DIVERSITY_WEIGHT;
        }

        if stats.unique_authors >= BROAD_AUTHORS {
            reasons.push(format!(
                "broad participation ({} authors)",
                stats.unique_authors
            ));
            score += BROAD_WEIGHT;
        }

        Significance {
            is_significant: score >= SIGNIFICANT_SCORE || reasons.len() >= SIGNIFICANT_REASONS,
            reasons,
            score,
        }
    }
}
