use super::types::*;
use crate::config::{expand_env_vars, expand_tilde, ENV_VAR_PATTERN};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Largest claim size a single batch may take; the store binds it as a signed LIMIT
const MAX_CLAIM_LIMIT: u64 = i64::MAX as u64;

/// Longest lookback for active-author detection
const MAX_ACTIVE_WINDOW: std::time::Duration = std::time::Duration::from_secs(365 * 86_400);

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation failed:\n{}", .0.join("\n"))]
    ValidationList(Vec<String>),

    #[error("validation failed: {0}")]
    Validation(String),
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let yaml_string = fs::read_to_string(path).map_err(|e| {
        ConfigError::Io(std::io::Error::new(
            e.kind(),
            format!("failed to read config file '{}': {}", path.display(), e),
        ))
    })?;

    let mut config = parse_config(&yaml_string).map_err(|e| match e {
        ConfigError::YamlParse(e) => ConfigError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("in file '{}': {}", path.display(), e),
        )),
        other => other,
    })?;

    config.storage.path = expand_tilde(&config.storage.path);

    Ok(config)
}

/// Parse and validate a config document that has not been read from disk
pub fn parse_config(yaml: &str) -> Result<Config, ConfigError> {
    let yaml = expand_env_vars(yaml);
    check_unexpanded_vars(&yaml)?;

    let config: Config = serde_yaml::from_str(&yaml)?;
    validate_config(&config)?;

    Ok(config)
}

/// Checks for unexpanded environment variables and returns a helpful error
fn check_unexpanded_vars(yaml_string: &str) -> Result<(), ConfigError> {
    let re = Regex::new(ENV_VAR_PATTERN).expect("env var pattern is a valid regex");
    // Commented-out lines never reach the parser
    let mut unexpanded_vars: Vec<String> = yaml_string
        .lines()
        .filter(|line| !line.trim_start().starts_with('#'))
        .flat_map(|line| re.captures_iter(line))
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect();

    if unexpanded_vars.is_empty() {
        return Ok(());
    }

    unexpanded_vars.sort();
    unexpanded_vars.dedup();

    let error_msg = if unexpanded_vars.len() == 1 {
        format!(
            "Environment variable $env{{{0}}} is not set.\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variable: export {0}=...\n\
             2. Replace $env{{{0}}} in the config file with an actual value\n\
             3. Remove the optional section that references it",
            unexpanded_vars[0]
        )
    } else {
        format!(
            "Environment variables are not set: {}\n\
             \n\
             To fix this, either:\n\
             1. Set the environment variables (e.g., export NEYNAR_API_KEY=...)\n\
             2. Replace the variables in the config file with actual values",
            unexpanded_vars.join(", ")
        )
    };

    Err(ConfigError::Validation(error_msg))
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let mut errors = Vec::new();

    validate_hub(&config.hub, &mut errors);
    validate_targets(&config.targets, &mut errors);

    if config.analysis.window_hours == 0 {
        errors.push("analysis.window_hours must be at least 1".to_string());
    }

    if config.posting.max_claim == 0 {
        errors.push("posting.max_claim must be at least 1".to_string());
    } else if config.posting.max_claim > MAX_CLAIM_LIMIT {
        errors.push(format!(
            "posting.max_claim must be at most {}",
            MAX_CLAIM_LIMIT
        ));
    }

    if config.posting.min_patterns() == 0 {
        errors.push("posting.min_patterns must be at least 1".to_string());
    }

    if let Some(publisher) = &config.posting.publisher {
        if publisher.api_key.trim().is_empty() {
            errors.push("posting.publisher.api_key cannot be empty".to_string());
        }
        if publisher.signer_uuid.trim().is_empty() {
            errors.push("posting.publisher.signer_uuid cannot be empty".to_string());
        }
    }

    if let Some(llm) = &config.extractor.llm {
        if llm.api_key.trim().is_empty() {
            errors.push("extractor.llm.api_key cannot be empty".to_string());
        }
    }

    if config.schedule.interval.is_zero() {
        errors.push("schedule.interval must be greater than zero".to_string());
    }

    if let Some(web) = &config.web {
        if web.listen.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!("web.listen '{}' is not a valid socket address", web.listen));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::ValidationList(errors))
    }
}

fn validate_hub(hub: &HubConfig, errors: &mut Vec<String>) {
    if !hub.url.starts_with("http://") && !hub.url.starts_with("https://") {
        errors.push(format!("hub.url '{}' must be an http(s) URL", hub.url));
    }
    if hub.fetch_limit == 0 {
        errors.push("hub.fetch_limit must be at least 1".to_string());
    }
    if hub.concurrency == 0 {
        errors.push("hub.concurrency must be at least 1".to_string());
    }
}

fn validate_targets(targets: &TargetsConfig, errors: &mut Vec<String>) {
    if targets.max_fids == 0 {
        errors.push("targets.max_fids must be at least 1".to_string());
    }
    if targets.active_window > MAX_ACTIVE_WINDOW {
        errors.push(format!(
            "targets.active_window must be at most {} days",
            MAX_ACTIVE_WINDOW.as_secs() / 86_400
        ));
    }

    let mut seen = HashSet::new();
    for fid in &targets.curated_fids {
        if *fid == 0 {
            errors.push("targets.curated_fids: fid 0 is not a valid author".to_string());
        } else if !seen.insert(fid) {
            errors.push(format!("targets.curated_fids: duplicate fid {}", fid));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
hub: {}
storage:
  path: /tmp/wen.duckdb
"#;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config(MINIMAL).unwrap();
        assert_eq!(config.hub.url, "https://hub.pinata.cloud");
        assert_eq!(config.analysis.window_hours, 12);
        assert_eq!(config.posting.mode, PostingMode::Pattern);
        assert_eq!(config.posting.min_patterns(), 100);
        assert_eq!(config.posting.max_claim, 500);
        assert_eq!(config.schedule.interval, std::time::Duration::from_secs(12 * 3600));
        assert!(config.web.is_none());
        assert!(config.extractor.llm.is_none());
    }

    #[test]
    fn test_fixed_mode_defaults_to_500() {
        let yaml = format!("{}posting:\n  mode: fixed\n", MINIMAL);
        let config = parse_config(&yaml).unwrap();
        assert_eq!(config.posting.min_patterns(), 500);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let yaml = r#"
hub:
  url: ftp://example.com
  concurrency: 0
targets:
  curated_fids: [12, 12]
storage:
  path: /tmp/wen.duckdb
analysis:
  window_hours: 0
"#;
        let err = parse_config(yaml).unwrap_err();
        match err {
            ConfigError::ValidationList(errors) => {
                assert_eq!(errors.len(), 4, "{:?}", errors);
                assert!(errors.iter().any(|e| e.contains("hub.url")));
                assert!(errors.iter().any(|e| e.contains("duplicate fid 12")));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_unset_env_var_is_reported() {
        let yaml = format!(
            "{}posting:\n  publisher:\n    api_key: $env{{WEN_TEST_UNSET_KEY}}\n    signer_uuid: abc\n",
            MINIMAL
        );
        let err = parse_config(&yaml).unwrap_err();
        assert!(err.to_string().contains("WEN_TEST_UNSET_KEY"));
    }

    #[test]
    fn test_commented_env_var_is_ignored() {
        let yaml = format!(
            "# api keys look like $env{{WEN_TEST_DOC_KEY}}\n{}posting:\n  # publisher:\n  #   api_key: $env{{WEN_TEST_COMMENTED_KEY}}\n  max_claim: 50\n",
            MINIMAL
        );
        let config = parse_config(&yaml).unwrap();
        assert_eq!(config.posting.max_claim, 50);
    }

    #[test]
    fn test_max_claim_must_fit_store_limit() {
        let yaml = format!("{}posting:\n  max_claim: {}\n", MINIMAL, u64::MAX);
        match parse_config(&yaml).unwrap_err() {
            ConfigError::ValidationList(errors) => {
                assert_eq!(errors.len(), 1, "{:?}", errors);
                assert!(errors[0].contains("posting.max_claim"));
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_active_window_is_bounded() {
        let yaml = format!("{}targets:\n  active_window: 300000y\n", MINIMAL);
        match parse_config(&yaml).unwrap_err() {
            ConfigError::ValidationList(errors) => {
                assert_eq!(errors.len(), 1, "{:?}", errors);
                assert!(errors[0].contains("targets.active_window"));
            }
            other => panic!("unexpected error: {}", other),
        }

        let yaml = format!("{}targets:\n  active_window: 30days\n", MINIMAL);
        assert!(parse_config(&yaml).is_ok());
    }
}
