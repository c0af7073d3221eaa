use super::{Entities, EntityExtractor, ExtractError};
use async_trait::async_trait;
use regex::Regex;

/// Regex-based extractor for hashtags, mentions and URLs
#[derive(Debug, Clone)]
pub struct PatternExtractor {
    hashtag: Regex,
    mention: Regex,
    url: Regex,
}

impl PatternExtractor {
    pub fn new() -> Self {
        Self {
            hashtag: Regex::new(r"#\w+").expect("hashtag pattern is a valid regex"),
            mention: Regex::new(r"@\w+").expect("mention pattern is a valid regex"),
            url: Regex::new(r"https?://\S+").expect("url pattern is a valid regex"),
        }
    }

    pub fn extract_sync(&self, text: &str) -> Entities {
        let find_all = |re: &Regex| -> Vec<String> {
            re.find_iter(text).map(|m| m.as_str().to_string()).collect()
        };

        Entities {
            hashtags: find_all(&self.hashtag),
            mentions: find_all(&self.mention),
            urls: find_all(&self.url),
        }
    }
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityExtractor for PatternExtractor {
    async fn extract(&self, text: &str) -> Result<Entities, ExtractError> {
        Ok(self.extract_sync(text))
    }
}
