use super::significance::{
    author_concentrated, format_rate, DOMAIN_LINKS, HASHTAG_EMERGING, HASHTAG_TRENDING, MENTION_FOCUS,
    REPORT_VOLUME_PER_HOUR,
};
use super::window::WindowStats;

/// Signal lines after the headline
const MAX_SECONDARY: usize = 2;

/// Renders batch summaries as plain text with `\n` separators
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportComposer;

impl ReportComposer {
    pub fn new() -> Self {
        Self
    }

    /// Pattern-mode summary. Without stats only the batch id, size and
    /// entry range are emitted.
    pub fn render(&self, stats: Option<&WindowStats>, batch_id: i64, start: u64, end: u64) -> String {
        let Some(stats) = stats else {
            return format!(
                "文 · batch {}\n\n{} patterns\n#{}–#{}",
                batch_id,
                end.saturating_sub(start),
                start,
                end
            );
        };

        let mut lines = vec![format!("文 · batch {}", batch_id), String::new()];
        lines.extend(signal_lines(stats).into_iter().take(1 + MAX_SECONDARY));

        if stats.avg_per_hour >= REPORT_VOLUME_PER_HOUR {
            lines.push(format!("volume: {}/h", format_rate(stats.avg_per_hour)));
        }

        lines.push(String::new());
        lines.push(format!("#{}–#{}", start, end));
        lines.join("\n")
    }

    /// Fixed-size mode summary, independent of any window statistics
    pub fn render_fixed(&self, batch_id: i64, start: u64, end: u64) -> String {
        format!(
            "文 archive: batch {}\n\nentry #{} → #{}\n{} patterns recorded\n\ncontinuity intact",
            batch_id,
            start,
            end,
            end.saturating_sub(start)
        )
    }
}

/// Triggered signals in headline priority: hashtag, mention, domain, author
fn signal_lines(stats: &WindowStats) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some((tag, count)) = stats.trending_hashtags.first() {
        if *count >= HASHTAG_TRENDING {
            lines.push(format!("dominant: {} ({})", tag, count));
        } else if *count >= HASHTAG_EMERGING {
            lines.push(format!("emerging: {} ({})", tag, count));
        }
    }

    if let Some((mention, count)) = stats.trending_mentions.first() {
        if *count >= MENTION_FOCUS {
            lines.push(format!("focus: {} ({})", mention, count));
        }
    }

    if let Some((domain, count)) = stats.top_domains.first() {
        if *count >= DOMAIN_LINKS {
            lines.push(format!("links: {} ({})", domain, count));
        }
    }

    if let Some((fid, count)) = stats.top_authors.first() {
        if author_concentrated(*count, stats.total) {
            lines.push(format!("fid {} ({})", fid, count));
        }
    }

    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn stats() -> WindowStats {
        WindowStats {
            total: 100,
            avg_per_hour: 8.33,
            unique_authors: 15,
            trending_hashtags: vec![("#gm".to_string(), 3)],
            trending_mentions: vec![("@dwr".to_string(), 2)],
            top_authors: vec![(12, 10)],
            top_domains: vec![("base.org".to_string(), 1)],
            timeframe_hours: 12,
            computed_at: Utc::now(),
        }
    }

    #[test]
    fn test_fallback_without_stats() {
        let text = ReportComposer::new().render(None, 7, 300, 800);
        assert_eq!(text, "文 · batch 7\n\n500 patterns\n#300–#800");
    }

    #[test]
    fn test_no_signals_still_has_header_and_range() {
        let text = ReportComposer::new().render(Some(&stats()), 3, 0, 120);
        assert_eq!(text, "文 · batch 3\n\n\n#0–#120");
    }

    #[test]
    fn test_hashtag_headline() {
        let s = WindowStats {
            trending_hashtags: vec![("#base".to_string(), 16)],
            ..stats()
        };
        let text = ReportComposer::new().render(Some(&s), 1, 0, 100);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[2], "dominant: #base (16)");

        let s = WindowStats {
            trending_hashtags: vec![("#base".to_string(), 9)],
            ..stats()
        };
        let text = ReportComposer::new().render(Some(&s), 1, 0, 100);
        assert!(text.contains("emerging: #base (9)"));
    }

    #[test]
    fn test_mention_headline_when_no_hashtag_signal() {
        let s = WindowStats {
            trending_mentions: vec![("@jesse".to_string(), 8)],
            top_domains: vec![("zora.co".to_string(), 5)],
            ..stats()
        };
        let text = ReportComposer::new().render(Some(&s), 2, 0, 100);
        assert_eq!(
            text,
            "文 · batch 2\n\nfocus: @jesse (8)\nlinks: zora.co (5)\n\n#0–#100"
        );
    }

    #[test]
    fn test_secondary_lines_capped_at_two() {
        let s = WindowStats {
            trending_hashtags: vec![("#base".to_string(), 20)],
            trending_mentions: vec![("@dwr".to_string(), 10)],
            top_domains: vec![("zora.co".to_string(), 6)],
            top_authors: vec![(12, 40)],
            ..stats()
        };
        let text = ReportComposer::new().render(Some(&s), 4, 0, 100);
        assert!(text.contains("dominant: #base (20)"));
        assert!(text.contains("focus: @dwr (10)"));
        assert!(text.contains("links: zora.co (6)"));
        assert!(!text.contains("fid 12"));
    }

    #[test]
    fn test_author_line_uses_share_of_total() {
        let s = WindowStats {
            top_authors: vec![(12, 26)],
            ..stats()
        };
        let text = ReportComposer::new().render(Some(&s), 5, 0, 100);
        assert!(text.contains("fid 12 (26)"));
    }

    #[test]
    fn test_volume_line() {
        let s = WindowStats {
            avg_per_hour: 25.5,
            ..stats()
        };
        let text = ReportComposer::new().render(Some(&s), 6, 10, 110);
        assert!(text.ends_with("volume: 25.5/h\n\n#10–#110"));

        let whole = WindowStats {
            avg_per_hour: 30.0,
            ..stats()
        };
        let text = ReportComposer::new().render(Some(&whole), 6, 10, 110);
        assert!(text.ends_with("volume: 30.0/h\n\n#10–#110"));

        let quiet = WindowStats {
            avg_per_hour: 24.99,
            ..stats()
        };
        let text = ReportComposer::new().render(Some(&quiet), 6, 10, 110);
        assert!(!text.contains("volume"));
    }

    #[test]
    fn test_fixed_mode_text() {
        let text = ReportComposer::new().render_fixed(9, 1000, 1500);
        assert_eq!(
            text,
            "文 archive: batch 9\n\nentry #1000 → #1500\n500 patterns recorded\n\ncontinuity intact"
        );
    }
}
