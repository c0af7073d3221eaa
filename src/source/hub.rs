use super::{CastAuthor, CastSource, RawCast};
use crate::config::types::HubConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Farcaster timestamps count seconds from 2021-01-01T00:00:00Z
const FARCASTER_EPOCH: i64 = 1_609_459_200;

#[derive(Debug, Error)]
pub enum HubError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("hub returned error status {status}: {message}")]
    Status { status: u16, message: String },
}

/// HTTP client for a Farcaster hub's `castsByFid` endpoint
#[derive(Debug)]
pub struct HubClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct CastsResponse {
    #[serde(default)]
    messages: Vec<HubMessage>,
}

#[derive(Debug, Deserialize)]
struct HubMessage {
    #[serde(default)]
    hash: String,
    #[serde(default)]
    data: Option<MessageData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageData {
    #[serde(default)]
    fid: u64,
    #[serde(default)]
    timestamp: Option<i64>,
    #[serde(default)]
    cast_add_body: Option<CastAddBody>,
}

#[derive(Debug, Deserialize)]
struct CastAddBody {
    #[serde(default)]
    text: String,
}

impl HubClient {
    pub fn new(config: &HubConfig) -> Result<Self, HubError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl CastSource for HubClient {
    async fn casts_by_fid(&self, fid: u64, limit: usize) -> Result<Vec<RawCast>, HubError> {
        let url = format!("{}/v1/castsByFid", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("fid", fid.to_string()),
                ("pageSize", limit.to_string()),
                ("reverse", "true".to_string()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(HubError::Status {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: CastsResponse = response.json().await?;
        Ok(body.messages.into_iter().map(to_raw_cast).collect())
    }
}

fn to_raw_cast(message: HubMessage) -> RawCast {
    let data = message.data;
    let fid = data.as_ref().map(|d| d.fid).unwrap_or_default();

    RawCast {
        hash: message.hash,
        text: data
            .as_ref()
            .and_then(|d| d.cast_add_body.as_ref())
            .map(|body| body.text.clone())
            .unwrap_or_default(),
        timestamp: data
            .as_ref()
            .and_then(|d| d.timestamp)
            .and_then(farcaster_time),
        author: (fid != 0).then(|| CastAuthor {
            fid,
            username: Some(format!("fid-{}", fid)),
        }),
    }
}

fn farcaster_time(seconds: i64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(FARCASTER_EPOCH.checked_add(seconds)?, 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hub_messages() {
        let json = r#"{
            "messages": [
                {
                    "hash": "0xabc",
                    "data": {
                        "type": "MESSAGE_TYPE_CAST_ADD",
                        "fid": 194,
                        "timestamp": 100,
                        "castAddBody": { "text": "gm #base", "mentions": [] }
                    }
                },
                { "hash": "0xdef", "data": { "fid": 0 } }
            ],
            "nextPageToken": ""
        }"#;

        let body: CastsResponse = serde_json::from_str(json).unwrap();
        let casts: Vec<RawCast> = body.messages.into_iter().map(to_raw_cast).collect();

        assert_eq!(casts.len(), 2);
        assert_eq!(casts[0].hash, "0xabc");
        assert_eq!(casts[0].text, "gm #base");
        assert_eq!(casts[0].author.as_ref().unwrap().fid, 194);
        assert_eq!(
            casts[0].author.as_ref().unwrap().username.as_deref(),
            Some("fid-194")
        );
        assert_eq!(
            casts[0].timestamp,
            DateTime::from_timestamp(FARCASTER_EPOCH + 100, 0)
        );
        // fid 0 means the hub did not tell us who wrote it
        assert!(casts[1].author.is_none());
        assert_eq!(casts[1].text, "");
    }
}
