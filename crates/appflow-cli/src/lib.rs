//! CLI library components for the app runner.

pub mod logging;
pub mod report;
