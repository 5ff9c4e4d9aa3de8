//! Debounced auto-save of form data.
//!
//! Provides:
//! - `DirtyTracker` - tracks unsaved changes with debounce
//! - `AutoSaveConfig` - debounce and forced-save delays

mod config;
mod tracker;

pub use config::AutoSaveConfig;
pub use tracker::DirtyTracker;
