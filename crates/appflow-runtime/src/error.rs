//! Error types for the runtime.

use appflow_binding::BindingError;
use appflow_model::ModelError;
use appflow_validate::SchemaError;
use serde_json::Value;
use thiserror::Error;

/// A rejected request from the fetch layer.
///
/// Carries the HTTP status and parsed body when the server answered.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct FetchError {
    pub status: Option<u16>,
    pub data: Option<Value>,
    pub message: String,
}

impl FetchError {
    /// Transport failure with no response.
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            data: None,
            message: message.into(),
        }
    }

    /// The server answered with a non-success status.
    pub fn status(status: u16, data: Option<Value>) -> Self {
        Self {
            status: Some(status),
            data,
            message: format!("request failed with status {status}"),
        }
    }

    pub fn is_status(&self, status: u16) -> bool {
        self.status == Some(status)
    }

    /// New data element id from a `303 See Other` answer to a data save.
    pub fn redirect_target(&self) -> Option<&str> {
        if !self.is_status(303) {
            return None;
        }
        self.data.as_ref()?.get("id")?.as_str()
    }
}

/// Result type alias for fetch operations.
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Why a resource queue could not complete.
#[derive(Debug, Clone, PartialEq, Error)]
#[non_exhaustive]
pub enum QueueError {
    /// A resource the queue cannot run without does not exist.
    #[error("{resource} not found")]
    NotFound { resource: &'static str },

    /// The user may not read the form data of this instance.
    #[error("missing roles to read {resource}")]
    MissingRoles { resource: &'static str },

    /// A member fetch was rejected.
    #[error("failed to fetch {resource}: {source}")]
    Member {
        resource: &'static str,
        #[source]
        source: FetchError,
    },

    /// A member fetch returned a document that could not be used.
    #[error("invalid {resource}: {reason}")]
    Invalid { resource: &'static str, reason: String },

    /// Information the queue needs is not loaded yet.
    #[error("cannot start queue: {what} is not known")]
    MissingContext { what: &'static str },
}

impl QueueError {
    /// Message suitable for a top-level error page.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingRoles { .. } => "You do not have access to this form.",
            Self::NotFound { .. } => "The form could not be found.",
            Self::Member { .. } => "Could not load the form. Please try again.",
            Self::Invalid { .. } | Self::MissingContext { .. } => "The form is not set up correctly.",
        }
    }

    /// Whether starting the queue again might succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Member { .. })
    }
}

/// Errors raised by runtime commands.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RuntimeError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Queue(#[from] QueueError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error(transparent)]
    Binding(#[from] BindingError),

    #[error(transparent)]
    Model(#[from] ModelError),

    /// A command ran before the data it needs was loaded.
    #[error("{what} is not loaded")]
    MissingContext { what: &'static str },

    /// An update addressed a field the data model does not have.
    #[error("field '{path}' is not part of the data model")]
    UnknownField { path: String },

    /// The configuration file could not be read.
    #[error("invalid configuration in {path}: {reason}")]
    Config { path: String, reason: String },
}

impl RuntimeError {
    /// Message suitable for a top-level form error.
    pub fn user_message(&self) -> String {
        match self {
            Self::Fetch(_) => "Could not reach the server. Please try again.".to_string(),
            Self::Queue(err) => err.user_message().to_string(),
            Self::Schema(err) => err.user_message(),
            Self::Config { .. } => format!("Configuration error: {self}"),
            Self::Binding(_) | Self::Model(_) | Self::MissingContext { .. } | Self::UnknownField { .. } => {
                "An unexpected error occurred.".to_string()
            }
        }
    }

    /// Whether retrying the command might succeed.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Fetch(err) => err.status.is_none_or(|status| status >= 500),
            Self::Queue(err) => err.is_recoverable(),
            Self::Binding(err) => err.is_recoverable(),
            _ => false,
        }
    }
}

/// Result type alias for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
