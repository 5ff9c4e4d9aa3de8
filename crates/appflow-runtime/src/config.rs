//! Runtime configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::autosave::AutoSaveConfig;
use crate::error::{Result, RuntimeError};

/// Settings for one runtime session.
///
/// Every field has a default, so a config file only needs the values it
/// changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// App root, e.g. `https://ttd.apps.altinn.no/ttd/my-app`.
    pub base_url: String,

    /// Instance as `{partyId}/{instanceGuid}`. Absent for stateless apps.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance: Option<String>,

    /// Language of the text resources to fetch.
    pub language: String,

    pub auto_save: AutoSaveConfig,

    pub poll: PollConfig,

    /// Block submission when validation reports warnings.
    pub stop_on_warnings: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            instance: None,
            language: "nb".to_string(),
            auto_save: AutoSaveConfig::default(),
            poll: PollConfig::default(),
            stop_on_warnings: false,
        }
    }
}

impl RuntimeConfig {
    /// Load a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let config_error = |reason: String| RuntimeError::Config {
            path: path.display().to_string(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        let config: Self = serde_json::from_str(&text).map_err(|e| config_error(e.to_string()))?;
        tracing::debug!(path = %path.display(), base_url = %config.base_url, "loaded runtime config");
        Ok(config)
    }
}

/// Backoff for polling the process after an external change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay before each of the first `fixed_attempts` attempts.
    pub initial_interval_ms: u64,
    pub fixed_attempts: u32,
    /// Total attempts before giving up.
    pub max_attempts: u32,
    /// Upper bound for the doubled delay.
    pub max_interval_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: 500,
            fixed_attempts: 3,
            max_attempts: 20,
            max_interval_ms: 8000,
        }
    }
}

impl PollConfig {
    /// Delay before attempt `attempt` (zero-based).
    ///
    /// Fixed for the first `fixed_attempts`, then doubling per attempt up
    /// to `max_interval_ms`.
    pub fn delay(&self, attempt: u32) -> Duration {
        if attempt < self.fixed_attempts {
            return Duration::from_millis(self.initial_interval_ms);
        }
        let exponent = (attempt - self.fixed_attempts + 1).min(32);
        let millis = self
            .initial_interval_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_interval_ms);
        Duration::from_millis(millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_poll_delays() {
        let poll = PollConfig::default();
        let delays: Vec<u64> = (0..8).map(|attempt| poll.delay(attempt).as_millis() as u64).collect();
        assert_eq!(delays, vec![500, 500, 500, 1000, 2000, 4000, 8000, 8000]);
    }

    #[test]
    fn test_load_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{ "base_url": "https://example.test/org/app", "instance": "512/abc", "poll": {{ "max_attempts": 5 }} }}"#
        )
        .unwrap();

        let config = RuntimeConfig::load(file.path()).unwrap();
        assert_eq!(config.base_url, "https://example.test/org/app");
        assert_eq!(config.instance.as_deref(), Some("512/abc"));
        assert_eq!(config.language, "nb");
        assert_eq!(config.poll.max_attempts, 5);
        assert_eq!(config.poll.initial_interval_ms, 500);
        assert!(config.auto_save.enabled);
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();
        assert!(matches!(
            RuntimeConfig::load(file.path()),
            Err(RuntimeError::Config { .. })
        ));
    }
}
