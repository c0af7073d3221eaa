//! Outbound delivery of batch summaries.

pub mod neynar;

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

pub use neynar::NeynarPublisher;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("publisher returned error status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed publisher response: {0}")]
    Malformed(String),

    #[error("no publisher configured")]
    Disabled,
}

#[async_trait]
pub trait Publisher: Send + Sync {
    /// Post `text` and return the hash of the created cast
    async fn publish(&self, text: &str) -> Result<String, PublishError>;
}

/// Stand-in used when no publisher credentials are configured.
///
/// The text is logged and delivery reports [`PublishError::Disabled`], so the
/// batch is kept without a post hash.
#[derive(Debug, Default)]
pub struct LogOnlyPublisher;

#[async_trait]
impl Publisher for LogOnlyPublisher {
    async fn publish(&self, text: &str) -> Result<String, PublishError> {
        info!(text, "Publisher disabled, summary not posted");
        Err(PublishError::Disabled)
    }
}
