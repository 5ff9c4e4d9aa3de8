//! Runtime for app instances: loading, process flow and submission.
//!
//! [`Runtime`] owns the state of one session and exposes typed commands:
//!
//! - [`Runtime::initialize`] loads application metadata, texts, the
//!   instance and its process
//! - [`Runtime::start_queue_for_current_task`] runs the resource queue of
//!   the current task and applies what it loaded
//! - [`Runtime::update_field`] and [`Runtime::delete_group_row`] edit the
//!   form data
//! - [`Runtime::save`] and [`Runtime::submit`] persist the data and move
//!   the process on
//! - [`Runtime::check_if_updated`] polls the process with backoff
//!
//! All backend calls go through a [`Fetcher`]; [`HttpFetcher`] is the
//! reqwest implementation.

pub mod autosave;
pub mod config;
pub mod error;
pub mod fetch;
pub mod process;
pub mod queue;
pub mod state;
pub mod submit;
pub mod urls;

pub use autosave::{AutoSaveConfig, DirtyTracker};
pub use config::{PollConfig, RuntimeConfig};
pub use error::{FetchError, FetchResult, QueueError, Result, RuntimeError};
pub use fetch::{Fetcher, HttpFetcher};
pub use process::ProcessMachine;
pub use queue::{Loaded, Member, QueueEvent, QueueKind, QueueState, QueueSupervisor};
pub use state::{AppState, PendingValidation, Runtime};
pub use submit::{SaveOutcome, SubmitOutcome};
pub use urls::AppUrls;
