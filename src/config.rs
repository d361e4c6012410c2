//! Application configuration
//!
//! Defaults merged with `eatlock.toml` and `EATLOCK_*` environment
//! variables, in that order.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::repository::RepositoryLimits;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LimitsConfig {
    pub max_content_chars: usize,
    pub max_feedback_input_chars: usize,
    pub cache_capacity: usize,
    pub cache_ttl_secs: u64,
    pub stats_refresh_secs: u64,
    pub batch_concurrency: usize,
    pub feedback_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_content_chars: 500,
            max_feedback_input_chars: 200,
            cache_capacity: 100,
            cache_ttl_secs: 30,
            stats_refresh_secs: 30,
            batch_concurrency: 8,
            feedback_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EatLockConfig {
    pub data_dir: String,
    #[serde(default)]
    pub limits: LimitsConfig,
}

impl Default for EatLockConfig {
    fn default() -> Self {
        Self {
            data_dir: "eatlock_data".to_string(),
            limits: LimitsConfig::default(),
        }
    }
}

impl EatLockConfig {
    pub fn repository_limits(&self) -> RepositoryLimits {
        RepositoryLimits {
            max_content_chars: self.limits.max_content_chars,
            cache_capacity: self.limits.cache_capacity,
            cache_ttl: Duration::from_secs(self.limits.cache_ttl_secs),
            batch_concurrency: self.limits.batch_concurrency,
            feedback_timeout: Duration::from_secs(self.limits.feedback_timeout_secs),
        }
    }

    pub fn stats_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.limits.stats_refresh_secs)
    }
}

pub fn load_config() -> Result<EatLockConfig, figment::Error> {
    let figment = Figment::from(Serialized::defaults(EatLockConfig::default()))
        .merge(Toml::file("eatlock.toml"))
        .merge(Env::prefixed("EATLOCK_").split("__"));

    let config: EatLockConfig = figment.extract()?;

    if config.data_dir.trim().is_empty() {
        return Err(figment::Error::from("data_dir must be set".to_string()));
    }
    if config.limits.batch_concurrency == 0 {
        return Err(figment::Error::from(
            "limits.batch_concurrency must be at least 1".to_string(),
        ));
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_constants() {
        let config = EatLockConfig::default();
        assert_eq!(config.limits.max_content_chars, 500);
        assert_eq!(config.limits.max_feedback_input_chars, 200);
        assert_eq!(config.limits.cache_capacity, 100);
        assert_eq!(config.limits.cache_ttl_secs, 30);
        assert_eq!(config.limits.batch_concurrency, 8);
    }

    #[test]
    fn repository_limits_conversion() {
        let config = EatLockConfig::default();
        let limits = config.repository_limits();
        assert_eq!(limits.max_content_chars, 500);
        assert_eq!(limits.cache_ttl, Duration::from_secs(30));
        assert_eq!(limits.feedback_timeout, Duration::from_secs(10));
    }
}
