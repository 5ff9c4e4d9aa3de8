//! Process task types and state as declared by the backend.
//!
//! The backend is the only source of truth for which task an instance is
//! in. [`ProcessState`] is built from a [`ProcessResponse`] and never
//! derived from form content.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Phase of an instance's process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaskType {
    /// Form data entry.
    Data,
    /// Confirmation of previously entered data.
    Confirm,
    /// Waiting for feedback from the service owner.
    Feedback,
    /// Process has ended.
    Archived,
    /// No process information received yet.
    #[default]
    Unknown,
}

impl TaskType {
    /// Map the backend's `altinnTaskType` value.
    pub fn from_altinn_task_type(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "data" => Self::Data,
            "confirmation" | "confirm" => Self::Confirm,
            "feedback" => Self::Feedback,
            _ => Self::Unknown,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Data => "Data",
            Self::Confirm => "Confirm",
            Self::Feedback => "Feedback",
            Self::Archived => "Archived",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// `currentTask` object in the process document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrentTask {
    pub element_id: String,
    #[serde(default)]
    pub altinn_task_type: String,
}

/// Process document returned by the process endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessResponse {
    #[serde(default)]
    pub current_task: Option<CurrentTask>,
    /// Timestamp set once the process has ended.
    #[serde(default)]
    pub ended: Option<String>,
}

/// Client view of the process, owned by the process state machine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessState {
    pub task_type: TaskType,
    pub task_id: Option<String>,
    pub error: Option<String>,
}

impl ProcessState {
    /// Derive the state from a server response.
    ///
    /// An ended process is always `Archived` with no task id.
    pub fn from_response(response: &ProcessResponse) -> Self {
        if response.ended.is_some() {
            return Self {
                task_type: TaskType::Archived,
                task_id: None,
                error: None,
            };
        }
        match &response.current_task {
            Some(task) => Self {
                task_type: TaskType::from_altinn_task_type(&task.altinn_task_type),
                task_id: Some(task.element_id.clone()),
                error: None,
            },
            None => Self::default(),
        }
    }

    pub fn is_archived(&self) -> bool {
        self.task_type == TaskType::Archived
    }
}
