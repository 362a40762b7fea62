//! TOML configuration for the search client.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! reference setup: 2 s between requests, five attempts, 2 s × 3ⁿ backoff.

use crate::error::ConfigError;
use crate::types::TimeWindow;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

pub const USER_AGENT_ENV: &str = "BIRDWATCH_USER_AGENT";
pub const SUBREDDIT_ENV: &str = "BIRDWATCH_SUBREDDIT";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BirdwatchConfig {
    pub reddit: RedditSettings,
    pub throttle: ThrottleSettings,
    pub retry: RetrySettings,
    pub search: SearchSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedditSettings {
    pub base_url: String,
    pub subreddit: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
}

impl Default for RedditSettings {
    fn default() -> Self {
        Self {
            base_url: "https://www.reddit.com".to_string(),
            subreddit: "wlu".to_string(),
            user_agent: "BirdWatch/1.0.0".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThrottleSettings {
    pub min_interval_ms: u64,
}

impl Default for ThrottleSettings {
    fn default() -> Self {
        Self {
            min_interval_ms: 2000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts, the first one included
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
    /// 0.0 to 1.0
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 2000,
            backoff_multiplier: 3.0,
            max_delay_ms: 300_000,
            jitter_factor: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub general_query: String,
    pub default_limit: u32,
    pub default_time_window: TimeWindow,
    pub course_limit: u32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            general_query: "bird course".to_string(),
            default_limit: 100,
            default_time_window: TimeWindow::Year,
            course_limit: 25,
        }
    }
}

impl BirdwatchConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a config file, applies environment overrides and validates.
    /// Without a path the defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
                    path: path.display().to_string(),
                })?;
                info!("Loaded configuration from {}", path.display());
                toml::from_str(&raw)?
            }
            None => {
                debug!("No configuration file given, using defaults");
                Self::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        if let Ok(user_agent) = std::env::var(USER_AGENT_ENV) {
            debug!("Overriding user agent from {}", USER_AGENT_ENV);
            self.reddit.user_agent = user_agent;
        }
        if let Ok(subreddit) = std::env::var(SUBREDDIT_ENV) {
            debug!("Overriding subreddit from {}", SUBREDDIT_ENV);
            self.reddit.subreddit = subreddit;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reddit.user_agent.trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "reddit.user_agent must not be empty".to_string(),
            });
        }
        if self.reddit.subreddit.trim().is_empty() {
            return Err(ConfigError::ValidationFailed {
                reason: "reddit.subreddit must not be empty".to_string(),
            });
        }
        if url::Url::parse(&self.reddit.base_url).is_err() {
            return Err(ConfigError::InvalidValue {
                field: "reddit.base_url".to_string(),
                value: self.reddit.base_url.clone(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                value: "0".to_string(),
            });
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.backoff_multiplier".to_string(),
                value: self.retry.backoff_multiplier.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.retry.jitter_factor) {
            return Err(ConfigError::InvalidValue {
                field: "retry.jitter_factor".to_string(),
                value: self.retry.jitter_factor.to_string(),
            });
        }
        Ok(())
    }
}
