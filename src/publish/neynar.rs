use super::{PublishError, Publisher};
use crate::config::types::PublisherConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Client for the Neynar cast API
#[derive(Debug)]
pub struct NeynarPublisher {
    url: String,
    api_key: String,
    signer_uuid: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct CastRequest<'a> {
    signer_uuid: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct CastResponse {
    cast: Option<PublishedCast>,
}

#[derive(Debug, Deserialize)]
struct PublishedCast {
    hash: String,
}

impl NeynarPublisher {
    pub fn new(config: &PublisherConfig) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            signer_uuid: config.signer_uuid.clone(),
            client,
        })
    }
}

#[async_trait]
impl Publisher for NeynarPublisher {
    async fn publish(&self, text: &str) -> Result<String, PublishError> {
        debug!(url = %self.url, chars = text.chars().count(), "Publishing cast");

        let response = self
            .client
            .post(&self.url)
            .header("accept", "application/json")
            .header("api_key", &self.api_key)
            .json(&CastRequest {
                signer_uuid: &self.signer_uuid,
                text,
            })
            .send()
            .await?;

        // Only 200 counts as posted
        if response.status() != reqwest::StatusCode::OK {
            return Err(PublishError::Status {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body = response.text().await?;
        let hash = parse_cast_hash(&body)?;
        info!(hash = %hash, "Cast published");
        Ok(hash)
    }
}

fn parse_cast_hash(body: &str) -> Result<String, PublishError> {
    let parsed: CastResponse =
        serde_json::from_str(body).map_err(|e| PublishError::Malformed(e.to_string()))?;

    parsed
        .cast
        .map(|cast| cast.hash)
        .filter(|hash| !hash.is_empty())
        .ok_or_else(|| PublishError::Malformed("response has no cast hash".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cast_hash() {
        let body = r#"{"success": true, "cast": {"hash": "0xabc123", "author": {"fid": 1}}}"#;
        assert_eq!(parse_cast_hash(body).unwrap(), "0xabc123");
    }

    #[test]
    fn test_parse_rejects_missing_hash() {
        assert!(matches!(
            parse_cast_hash(r#"{"success": true}"#),
            Err(PublishError::Malformed(_))
        ));
        assert!(matches!(
            parse_cast_hash("<html>ok</html>"),
            Err(PublishError::Malformed(_))
        ));
    }
}
