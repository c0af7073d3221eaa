use super::{Entities, EntityExtractor, ExtractError};
use crate::config::types::LlmConfig;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const SYSTEM_PROMPT: &str = r#"You are 文 (Wen), a passive archival agent.

Extract entities from Farcaster casts. No interpretation.

Output only valid JSON:
{
  "hashtags": ["tag1"],
  "mentions": ["@user"],
  "urls": ["https://..."]
}

If none found, return empty arrays."#;

/// Chat-completion client used as the fallback entity extractor
#[derive(Debug)]
pub struct LlmExtractor {
    url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: String,
}

impl LlmExtractor {
    pub fn new(config: &LlmConfig) -> Result<Self, ExtractError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            url: config.url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            client,
        })
    }
}

#[async_trait]
impl EntityExtractor for LlmExtractor {
    async fn extract(&self, text: &str) -> Result<Entities, ExtractError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: text,
                },
            ],
            temperature: 0.0,
            max_tokens: 300,
        };

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ExtractError::Status {
                status: response.status().as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }

        let body: ChatResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ExtractError::Malformed("no choices in response".to_string()))?;

        parse_entities(&content)
    }
}

/// Parse the model's JSON answer; missing keys become empty lists
fn parse_entities(content: &str) -> Result<Entities, ExtractError> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(trimmed).map_err(|e| ExtractError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_answer() {
        let entities = parse_entities(
            r##"{"hashtags": ["#base"], "mentions": ["@dwr"], "urls": ["https://base.org"]}"##,
        )
        .unwrap();
        assert_eq!(entities.hashtags, vec!["#base"]);
        assert_eq!(entities.mentions, vec!["@dwr"]);
        assert_eq!(entities.urls, vec!["https://base.org"]);
    }

    #[test]
    fn test_parse_missing_keys_default_to_empty() {
        let entities = parse_entities(r#"{"mentions": ["@a"]}"#).unwrap();
        assert!(entities.hashtags.is_empty());
        assert_eq!(entities.mentions, vec!["@a"]);
    }

    #[test]
    fn test_parse_fenced_answer() {
        let entities = parse_entities("```json\n{\"hashtags\": [\"#x\"]}\n```").unwrap();
        assert_eq!(entities.hashtags, vec!["#x"]);
    }

    #[test]
    fn test_parse_garbage_is_malformed() {
        assert!(matches!(
            parse_entities("I could not find anything"),
            Err(ExtractError::Malformed(_))
        ));
    }
}
