//! Crawl-level configuration.
//!
//! Settings arrive already resolved: the engine never reads files or the
//! environment itself. Keys use the upper-case names familiar from
//! scrapy-style projects (`CONCURRENCY`, `DOWNLOAD_TIMEOUT`, ...), so a
//! spider's `custom_settings` can be written as a small JSON object and laid
//! over the process-wide settings with [`Settings::merge`].
//!
//! Boolean keys also accept `0`/`1` and the strings `"true"`/`"false"` (any
//! case), which is how such values usually arrive from command lines and
//! environment-derived settings.
//!
//! `DOWNLOADER` names the transport backend. Only `"reqwest"` exists today;
//! the key is reserved for further backends and any other name is rejected
//! when the settings are parsed. A custom transport can still be plugged in
//! with [`crate::CrawlerBuilder::downloader`].

use crate::concurrency::MAX_CONCURRENCY;
use crate::error::SpiderError;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Which transport backend `build_downloader` constructs. Further variants
/// are reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloaderKind {
    #[default]
    Reqwest,
}

/// Resolved crawl settings. Missing keys take the values of [`Settings::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", default)]
pub struct Settings {
    /// Maximum number of units in flight at once.
    pub concurrency: usize,
    /// Default level for [`crate::logging::init_logging`].
    pub log_level: String,
    /// Per-fetch timeout in seconds.
    pub download_timeout: u64,
    #[serde(deserialize_with = "lenient_bool")]
    pub verify_ssl: bool,
    /// Build a fresh HTTP client for every request instead of sharing one.
    #[serde(deserialize_with = "lenient_bool")]
    pub new_session: bool,
    pub downloader: DownloaderKind,
    /// Upper bound on how long the crawler loop waits for a pending request.
    pub queue_wait_ms: u64,
}

fn lenient_bool<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Ok(flag),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(de::Error::custom(format!("expected 0 or 1, got {}", n))),
        },
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(de::Error::custom(format!("expected a boolean, got \"{}\"", text))),
        },
        other => Err(de::Error::custom(format!("expected a boolean, got {}", other))),
    }
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            concurrency: 16,
            log_level: "INFO".to_string(),
            download_timeout: 60,
            verify_ssl: false,
            new_session: false,
            downloader: DownloaderKind::Reqwest,
            queue_wait_ms: 100,
        }
    }
}

impl Settings {
    /// Parses settings from a JSON object; missing keys keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SpiderError> {
        let settings: Settings = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Overlays the keys of `overrides` (a JSON object) on these settings.
    pub fn merge(&mut self, overrides: &Value) -> Result<(), SpiderError> {
        let extra = match overrides {
            Value::Null => return Ok(()),
            Value::Object(extra) => extra,
            _ => {
                return Err(SpiderError::ConfigurationError(
                    "settings overrides must be a JSON object".to_string(),
                ));
            }
        };

        let mut current = serde_json::to_value(&*self)?;
        if let Value::Object(base) = &mut current {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        let merged: Settings = serde_json::from_value(current)?;
        merged.validate()?;
        *self = merged;
        Ok(())
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), SpiderError> {
        if self.concurrency == 0 {
            return Err(SpiderError::ConfigurationError(
                "CONCURRENCY must be greater than 0.".to_string(),
            ));
        }
        if self.concurrency > MAX_CONCURRENCY {
            return Err(SpiderError::ConfigurationError(format!(
                "CONCURRENCY must be at most {}.",
                MAX_CONCURRENCY
            )));
        }
        if self.download_timeout == 0 {
            return Err(SpiderError::ConfigurationError(
                "DOWNLOAD_TIMEOUT must be greater than 0.".to_string(),
            ));
        }
        if self.queue_wait_ms == 0 {
            return Err(SpiderError::ConfigurationError(
                "QUEUE_WAIT_MS must be greater than 0.".to_string(),
            ));
        }
        Ok(())
    }

    /// `DOWNLOAD_TIMEOUT` as a duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout)
    }

    /// `QUEUE_WAIT_MS` as a duration.
    pub fn queue_wait(&self) -> Duration {
        Duration::from_millis(self.queue_wait_ms)
    }
}
