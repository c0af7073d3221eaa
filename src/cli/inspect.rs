use super::run::{open_store, require_config_path};
use crate::analysis::{format_rate, SignificanceScorer, WindowAggregator};
use crate::config::load_config;
use crate::pipeline::{ArchiveStats, Diagnosis};
use std::fmt::Write;
use std::path::PathBuf;

/// `wen patterns [--hours N]`: score the current window without posting
pub async fn patterns(
    config_path: Option<PathBuf>,
    hours: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&require_config_path(config_path)?)?;
    let store = open_store(&config).await?;

    let hours = hours.unwrap_or(config.analysis.window_hours);
    let aggregator = WindowAggregator::new(store);
    let diagnosis = Diagnosis::collect(&aggregator, &SignificanceScorer::new(), hours).await?;

    print!("{}", format_diagnosis(&diagnosis));
    Ok(())
}

/// `wen stats`: archive totals as JSON
pub async fn stats(config_path: Option<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(&require_config_path(config_path)?)?;
    let store = open_store(&config).await?;

    let stats = ArchiveStats::collect(store.as_ref(), config.posting.min_patterns()).await?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn format_diagnosis(diagnosis: &Diagnosis) -> String {
    let mut out = String::new();

    let Some(stats) = &diagnosis.stats else {
        let _ = writeln!(out, "No patterns to analyze (last {}h)", diagnosis.window_hours);
        return out;
    };

    let _ = writeln!(out, "Window: last {}h", stats.timeframe_hours);
    let _ = writeln!(out, "Total patterns: {}", stats.total);
    let _ = writeln!(out, "Avg per hour: {}", format_rate(stats.avg_per_hour));
    let _ = writeln!(out, "Unique authors: {}", stats.unique_authors);

    let _ = writeln!(out, "\nTop hashtags:");
    for (tag, count) in &stats.trending_hashtags {
        let _ = writeln!(out, "  {}: {}", tag, count);
    }
    let _ = writeln!(out, "\nTop mentions:");
    for (mention, count) in &stats.trending_mentions {
        let _ = writeln!(out, "  {}: {}", mention, count);
    }
    let _ = writeln!(out, "\nTop domains:");
    for (domain, count) in &stats.top_domains {
        let _ = writeln!(out, "  {}: {}", domain, count);
    }

    let significance = &diagnosis.significance;
    let _ = writeln!(out, "\nSignificant: {}", significance.is_significant);
    let _ = writeln!(out, "Score: {}", significance.score);
    let _ = writeln!(out, "Reasons:");
    for reason in &significance.reasons {
        let _ = writeln!(out, "  - {}", reason);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Significance, WindowStats};
    use chrono::Utc;

    #[test]
    fn test_format_empty_window() {
        let diagnosis = Diagnosis {
            window_hours: 6,
            stats: None,
            significance: SignificanceScorer::new().score(None),
        };
        assert_eq!(format_diagnosis(&diagnosis), "No patterns to analyze (last 6h)\n");
    }

    #[test]
    fn test_format_lists_reasons() {
        let diagnosis = Diagnosis {
            window_hours: 12,
            stats: Some(WindowStats {
                total: 300,
                avg_per_hour: 25.0,
                unique_authors: 40,
                trending_hashtags: vec![("#base".to_string(), 16)],
                trending_mentions: vec![],
                top_authors: vec![(12, 20)],
                top_domains: vec![],
                timeframe_hours: 12,
                computed_at: Utc::now(),
            }),
            significance: Significance {
                is_significant: true,
                reasons: vec!["high volume (25.0/h)".to_string(), "trending: #base (16x)".to_string()],
                score: 7,
            },
        };

        let text = format_diagnosis(&diagnosis);
        assert!(text.contains("Avg per hour: 25.0\n"));
        assert!(text.contains("  #base: 16\n"));
        assert!(text.contains("Score: 7\n"));
        assert!(text.contains("  - trending: #base (16x)\n"));
    }
}
