//! Auto-save configuration.

use serde::{Deserialize, Serialize};

/// Configuration for auto-save behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    /// Whether field updates schedule a save.
    pub enabled: bool,

    /// Debounce delay in milliseconds.
    ///
    /// After a change, the runtime waits this long before saving.
    /// Additional changes reset the timer.
    pub debounce_ms: u64,

    /// Maximum delay before forcing a save.
    ///
    /// If changes keep coming, save after this many milliseconds
    /// since the first unsaved change.
    pub max_delay_ms: u64,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            debounce_ms: 400,
            max_delay_ms: 5000,
        }
    }
}

impl AutoSaveConfig {
    /// Create a disabled auto-save config.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }

    /// Check if auto-save should trigger given the time since last change
    /// and time since first unsaved change.
    pub fn should_save(&self, since_last_change_ms: u64, since_first_unsaved_ms: u64) -> bool {
        if !self.enabled {
            return false;
        }
        since_last_change_ms >= self.debounce_ms || since_first_unsaved_ms >= self.max_delay_ms
    }
}
