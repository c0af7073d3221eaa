pub mod decision;
pub mod job;
pub mod snapshot;

use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use decision::{should_post, should_post_fixed, PostDecision, SkipReason};
pub use job::{ArchiveJob, JobOutcome, JobSettings};
pub use snapshot::{ArchiveStats, Diagnosis};

/// On-demand request for the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    /// Regular run, posting only if the window is significant
    Archive,
    /// Manual override of the significance check
    Post,
}

impl Trigger {
    pub fn force(self) -> bool {
        matches!(self, Trigger::Post)
    }
}

impl FromStr for Trigger {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "archive" => Ok(Trigger::Archive),
            "post" => Ok(Trigger::Post),
            other => Err(format!("invalid action '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trigger_parsing() {
        assert_eq!("archive".parse::<Trigger>(), Ok(Trigger::Archive));
        assert_eq!("post".parse::<Trigger>(), Ok(Trigger::Post));
        assert!("Post".parse::<Trigger>().is_err());
        assert!(Trigger::Post.force());
        assert!(!Trigger::Archive.force());
    }
}
