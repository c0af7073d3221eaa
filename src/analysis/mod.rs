//! Window statistics, significance scoring and report rendering.

pub mod frequency;
pub mod report;
pub mod significance;
pub mod window;

pub use frequency::FrequencyTable;
pub use report::ReportComposer;
pub use significance::{format_rate, Significance, SignificanceScorer};
pub use window::{extract_domain, WindowAggregator, WindowStats};
