//! Dirty state tracking for auto-save.

use std::time::Duration;

use tokio::time::Instant;

use super::AutoSaveConfig;

/// Tracks form data changes not yet saved to the backend.
///
/// Uses the tokio clock so a paused test runtime controls the debounce.
#[derive(Debug, Clone, Default)]
pub struct DirtyTracker {
    dirty: bool,

    /// When the most recent change was made.
    last_change: Option<Instant>,

    /// When the first unsaved change was made. Reset when saved.
    first_unsaved_change: Option<Instant>,

    saving: bool,
}

impl DirtyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[inline]
    pub fn is_saving(&self) -> bool {
        self.saving
    }

    /// Record a change to the form data.
    pub fn mark_dirty(&mut self) {
        let now = Instant::now();
        self.dirty = true;
        self.last_change = Some(now);
        if self.first_unsaved_change.is_none() {
            self.first_unsaved_change = Some(now);
        }
    }

    pub fn start_save(&mut self) {
        self.saving = true;
    }

    pub fn save_complete(&mut self) {
        self.dirty = false;
        self.saving = false;
        self.last_change = None;
        self.first_unsaved_change = None;
    }

    /// Keep the changes marked dirty so the next save retries them.
    pub fn save_failed(&mut self) {
        self.saving = false;
    }

    pub fn ms_since_last_change(&self) -> Option<u64> {
        self.last_change.map(|t| t.elapsed().as_millis() as u64)
    }

    pub fn ms_since_first_unsaved(&self) -> Option<u64> {
        self.first_unsaved_change
            .map(|t| t.elapsed().as_millis() as u64)
    }

    /// Check if auto-save should trigger now.
    pub fn should_auto_save(&self, config: &AutoSaveConfig) -> bool {
        if !self.dirty || self.saving || !config.enabled {
            return false;
        }
        match (self.ms_since_last_change(), self.ms_since_first_unsaved()) {
            (Some(since_last), Some(since_first)) => config.should_save(since_last, since_first),
            _ => false,
        }
    }

    /// When the pending auto-save becomes due, if one is pending.
    pub fn deadline(&self, config: &AutoSaveConfig) -> Option<Instant> {
        if !self.dirty || !config.enabled {
            return None;
        }
        let debounced = self.last_change? + Duration::from_millis(config.debounce_ms);
        let forced = self.first_unsaved_change? + Duration::from_millis(config.max_delay_ms);
        Some(debounced.min(forced))
    }
}
