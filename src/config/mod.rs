//! Session configuration — model endpoint, stream bounds, render cadence.
//!
//! Project-level config: `.persona-panels/config.yaml` (optional, safe to commit
//! as long as `api_key` is left out).
//!
//! Resolution: built-in defaults → config file → env vars → CLI overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default project config location, relative to the working directory.
pub const PROJECT_CONFIG_PATH: &str = ".persona-panels/config.yaml";

/// Upper bound on concurrent personas (one palette colour each).
pub const MAX_AGENTS: usize = 7;

/// Upper bound on the render loop frequency (1 ms period).
pub const MAX_REFRESH_HZ: u32 = 1000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid YAML in {}: {source}", path.display())]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("number of agents must be between 1 and {max} (got {0})", max = MAX_AGENTS)]
    InvalidAgentCount(usize),

    #[error("refresh rate must be between 1 and {max} Hz (got {0})", max = MAX_REFRESH_HZ)]
    InvalidRefreshRate(u32),
}

/// Everything a session needs besides the topic and persona count.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Model ID sent with every request.
    pub model: String,
    /// Base URL of the OpenAI-compatible API (no trailing slash).
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Upper bound on tokens per persona response.
    pub max_tokens: u32,
    /// Render loop frequency.
    pub refresh_hz: u32,
    /// Per-producer bound on the whole stream. `None` waits forever.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub producer_timeout_secs: Option<u64>,
    /// Where finished responses are persisted, one JSON file per topic.
    pub cache_dir: PathBuf,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".into(),
            base_url: "https://api.openai.com/v1".into(),
            api_key: None,
            max_tokens: 300,
            refresh_hz: 20,
            producer_timeout_secs: Some(120),
            cache_dir: PathBuf::from(".cache"),
        }
    }
}

impl SessionConfig {
    /// Load config: defaults, then the YAML file, then the environment.
    ///
    /// With `path == None` the project file is optional. An explicit path
    /// must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => {
                let default_path = Path::new(PROJECT_CONFIG_PATH);
                if default_path.exists() {
                    Self::from_file(default_path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Parse a YAML config file. Missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content)
    }

    /// Overlay `OPENAI_API_KEY` and `OPENAI_BASE_URL`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL").filter(|u| !u.is_empty()) {
            self.base_url = url.trim_end_matches('/').to_string();
        }
    }

    /// Interval between render loop frames.
    pub fn refresh_period(&self) -> Result<Duration, ConfigError> {
        if !(1..=MAX_REFRESH_HZ).contains(&self.refresh_hz) {
            return Err(ConfigError::InvalidRefreshRate(self.refresh_hz));
        }
        Ok(Duration::from_nanos(1_000_000_000 / u64::from(self.refresh_hz)))
    }

    pub fn producer_timeout(&self) -> Option<Duration> {
        self.producer_timeout_secs.map(Duration::from_secs)
    }
}

/// Check the requested persona count against `1..=MAX_AGENTS`.
pub fn validate_agent_count(agents: usize) -> Result<usize, ConfigError> {
    if (1..=MAX_AGENTS).contains(&agents) {
        Ok(agents)
    } else {
        Err(ConfigError::InvalidAgentCount(agents))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_original_session() {
        let config = SessionConfig::default();
        assert_eq!(config.model, "gpt-4o-mini");
        assert_eq!(config.max_tokens, 300);
        assert_eq!(config.refresh_hz, 20);
        assert_eq!(config.refresh_period().unwrap(), Duration::from_millis(50));
    }

    #[test]
    fn load_from_yaml_string() {
        let yaml = r#"
model: gpt-4o
refresh_hz: 10
producer_timeout_secs: 30
cache_dir: /tmp/personas
"#;
        let config = SessionConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.model, "gpt-4o");
        assert_eq!(config.refresh_period().unwrap(), Duration::from_millis(100));
        assert_eq!(config.producer_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.cache_dir, PathBuf::from("/tmp/personas"));
        // Untouched fields keep defaults
        assert_eq!(config.max_tokens, 300);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn empty_yaml_is_default() {
        let config = SessionConfig::from_yaml("  \n").unwrap();
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn env_overrides_file() {
        let mut config = SessionConfig::from_yaml("api_key: from-file\n").unwrap();
        config.apply_env(|key| match key {
            "OPENAI_API_KEY" => Some("from-env".into()),
            "OPENAI_BASE_URL" => Some("http://localhost:8080/v1/".into()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("from-env"));
        assert_eq!(config.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn empty_env_values_ignored() {
        let mut config = SessionConfig::default();
        config.apply_env(|_| Some(String::new()));
        assert!(config.api_key.is_none());
        assert_eq!(config.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn missing_explicit_file_errors() {
        let err = SessionConfig::load(Some(Path::new("/nonexistent/config.yaml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn zero_refresh_rejected() {
        let config = SessionConfig {
            refresh_hz: 0,
            ..SessionConfig::default()
        };
        assert!(matches!(
            config.refresh_period(),
            Err(ConfigError::InvalidRefreshRate(0))
        ));
    }

    #[test]
    fn refresh_rate_is_capped() {
        let at_cap = SessionConfig {
            refresh_hz: MAX_REFRESH_HZ,
            ..SessionConfig::default()
        };
        assert_eq!(at_cap.refresh_period().unwrap(), Duration::from_millis(1));

        let too_fast = SessionConfig {
            refresh_hz: 2_000_000_000,
            ..SessionConfig::default()
        };
        let err = too_fast.refresh_period().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidRefreshRate(2_000_000_000)));
        assert!(err.to_string().contains("between 1 and 1000"));
    }

    #[test]
    fn agent_count_bounds() {
        assert_eq!(validate_agent_count(1).unwrap(), 1);
        assert_eq!(validate_agent_count(7).unwrap(), 7);
        assert!(validate_agent_count(0).is_err());
        let err = validate_agent_count(8).unwrap_err();
        assert!(err.to_string().contains("between 1 and 7"));
    }
}
