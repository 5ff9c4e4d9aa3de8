//! Process state machine.
//!
//! The backend owns the process. The client only moves to a new task when
//! a process document says so: the first fetch, an advance call, or a
//! poll that sees a change.

use appflow_model::{ModelError, ProcessResponse, ProcessState, TaskType};
use serde_json::Value;

use crate::config::PollConfig;
use crate::error::{Result, RuntimeError};
use crate::fetch::Fetcher;
use crate::urls::AppUrls;

/// Holds the client's view of the instance process.
#[derive(Debug, Clone, Default)]
pub struct ProcessMachine {
    state: ProcessState,
}

impl ProcessMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ProcessState {
        &self.state
    }

    pub fn task_type(&self) -> TaskType {
        self.state.task_type
    }

    /// Apply a process document. Returns whether the task changed.
    pub fn apply(&mut self, response: &ProcessResponse) -> bool {
        let next = ProcessState::from_response(response);
        let changed = next.task_type != self.state.task_type || next.task_id != self.state.task_id;
        if changed {
            tracing::info!(
                from = %self.state.task_type,
                to = %next.task_type,
                task = next.task_id.as_deref().unwrap_or("-"),
                "process transition"
            );
        }
        self.state = next;
        changed
    }

    /// Fetch the process and apply it.
    pub async fn fetch<F: Fetcher>(&mut self, fetcher: &F, urls: &AppUrls) -> Result<&ProcessState> {
        let url = urls
            .process()
            .ok_or(RuntimeError::MissingContext { what: "instance" })?;
        match fetcher.get(&url).await {
            Ok(document) => {
                let response = decode(document)?;
                self.apply(&response);
                Ok(&self.state)
            }
            Err(err) => {
                self.state.error = Some(err.message.clone());
                Err(err.into())
            }
        }
    }

    /// Ask the backend to complete the current task and apply the answer.
    pub async fn advance<F: Fetcher>(&mut self, fetcher: &F, urls: &AppUrls) -> Result<&ProcessState> {
        let url = urls
            .process_next()
            .ok_or(RuntimeError::MissingContext { what: "instance" })?;
        let document = fetcher.put(&url, &Value::Null).await.inspect_err(|err| {
            tracing::warn!(error = %err, "process advance rejected");
        })?;
        let response = decode(document)?;
        self.apply(&response);
        Ok(&self.state)
    }

    /// Poll until the task type changes or the process ends.
    ///
    /// Waits before every attempt per `poll`. Failed requests count as
    /// attempts. When the attempts run out the last known state is
    /// returned unchanged.
    pub async fn check_if_updated<F: Fetcher>(
        &mut self,
        fetcher: &F,
        urls: &AppUrls,
        poll: &PollConfig,
    ) -> Result<&ProcessState> {
        let url = urls
            .process()
            .ok_or(RuntimeError::MissingContext { what: "instance" })?;
        let current = self.state.task_type;

        for attempt in 0..poll.max_attempts {
            tokio::time::sleep(poll.delay(attempt)).await;
            let response = match fetcher.get(&url).await.map_err(RuntimeError::from).and_then(decode) {
                Ok(response) => response,
                Err(err) => {
                    tracing::debug!(attempt, error = %err, "process poll failed");
                    continue;
                }
            };
            let next = ProcessState::from_response(&response);
            if next.task_type != current || next.is_archived() {
                tracing::debug!(attempt, "process poll saw a change");
                self.apply(&response);
                return Ok(&self.state);
            }
            tracing::trace!(attempt, task = %current, "process unchanged");
        }

        tracing::info!(attempts = poll.max_attempts, task = %current, "process poll gave up");
        Ok(&self.state)
    }
}

fn decode(document: Value) -> Result<ProcessResponse> {
    serde_json::from_value(document).map_err(|e| ModelError::decode("process", e).into())
}
