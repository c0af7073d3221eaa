use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub hub: HubConfig,
    #[serde(default)]
    pub targets: TargetsConfig,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub posting: PostingConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub web: Option<WebConfig>,
}

/// Farcaster hub the casts are pulled from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HubConfig {
    #[serde(default = "default_hub_url")]
    pub url: String,
    #[serde(default = "default_hub_timeout", with = "humantime_serde")]
    pub timeout: Duration,
    /// Total casts requested per run, spread over all target FIDs
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: usize,
    /// Pause after each per-FID request
    #[serde(default = "default_request_delay", with = "humantime_serde")]
    pub request_delay: Duration,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_hub_url() -> String {
    "https://hub.pinata.cloud".to_string()
}

fn default_hub_timeout() -> Duration {
    Duration::from_secs(15)
}

fn default_fetch_limit() -> usize {
    50
}

fn default_request_delay() -> Duration {
    Duration::from_millis(300)
}

fn default_concurrency() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetsConfig {
    #[serde(default)]
    pub curated_fids: Vec<u64>,
    #[serde(default = "default_max_fids")]
    pub max_fids: usize,
    /// Look-back used to auto-detect active authors
    #[serde(default = "default_active_window", with = "humantime_serde")]
    pub active_window: Duration,
    #[serde(default = "default_active_min_casts")]
    pub active_min_casts: u64,
}

impl Default for TargetsConfig {
    fn default() -> Self {
        Self {
            curated_fids: Vec::new(),
            max_fids: default_max_fids(),
            active_window: default_active_window(),
            active_min_casts: default_active_min_casts(),
        }
    }
}

fn default_max_fids() -> usize {
    30
}

fn default_active_window() -> Duration {
    Duration::from_secs(24 * 3600)
}

fn default_active_min_casts() -> u64 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Texts must be longer than this (in chars) before the LLM fallback is tried
    #[serde(default = "default_min_fallback_chars")]
    pub min_fallback_chars: usize,
    #[serde(default)]
    pub llm: Option<LlmConfig>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            min_fallback_chars: default_min_fallback_chars(),
            llm: None,
        }
    }
}

fn default_min_fallback_chars() -> usize {
    40
}

/// OpenAI-compatible chat completion endpoint used for fallback extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_url")]
    pub url: String,
    pub api_key: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_llm_url() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_llm_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_llm_timeout() -> Duration {
    Duration::from_secs(20)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_window_hours")]
    pub window_hours: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
        }
    }
}

fn default_window_hours() -> u64 {
    12
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostingMode {
    /// Post only when the window shows significant patterns
    Pattern,
    /// Legacy mode: post a fixed-size batch on manual trigger only
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostingConfig {
    #[serde(default = "default_posting_mode")]
    pub mode: PostingMode,
    /// Minimum un-batched records before a batch may be created.
    /// Defaults to 100 in pattern mode and 500 in fixed mode.
    #[serde(default)]
    pub min_patterns: Option<u64>,
    #[serde(default = "default_max_claim")]
    pub max_claim: u64,
    #[serde(default)]
    pub publisher: Option<PublisherConfig>,
}

impl PostingConfig {
    pub fn min_patterns(&self) -> u64 {
        self.min_patterns.unwrap_or(match self.mode {
            PostingMode::Pattern => 100,
            PostingMode::Fixed => 500,
        })
    }
}

impl Default for PostingConfig {
    fn default() -> Self {
        Self {
            mode: default_posting_mode(),
            min_patterns: None,
            max_claim: default_max_claim(),
            publisher: None,
        }
    }
}

fn default_posting_mode() -> PostingMode {
    PostingMode::Pattern
}

fn default_max_claim() -> u64 {
    500
}

/// Neynar cast API credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    #[serde(default = "default_publisher_url")]
    pub url: String,
    pub api_key: String,
    pub signer_uuid: String,
    #[serde(default = "default_publisher_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_publisher_url() -> String {
    "https://api.neynar.com/v2/farcaster/cast".to_string()
}

fn default_publisher_timeout() -> Duration {
    Duration::from_secs(15)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: default_interval(),
        }
    }
}

fn default_interval() -> Duration {
    Duration::from_secs(12 * 3600)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub listen: String,
    /// Bearer token required by the trigger endpoint; triggers are refused when unset
    #[serde(default)]
    pub admin_token: Option<String>,
}
