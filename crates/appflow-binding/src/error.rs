//! Binding error types.

use thiserror::Error;

/// Errors raised by the data-binding layer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum BindingError {
    /// A form data key did not decompose into field/index segments.
    #[error("invalid data binding '{path}': {reason}")]
    InvalidPath {
        /// The offending key.
        path: String,
        /// Why it could not be parsed.
        reason: &'static str,
    },

    /// No group with this id exists in the layout.
    #[error("group '{id}' not found in layout")]
    UnknownGroup {
        /// Group instance id as given by the caller.
        id: String,
    },

    /// The component exists but does not repeat.
    #[error("component '{id}' is not a repeating group")]
    NotRepeating {
        /// Component id.
        id: String,
    },

    /// Row index beyond the rendered rows of a group.
    #[error("row {index} out of range for group '{id}' ({count} rows)")]
    RowOutOfRange {
        /// Group instance id.
        id: String,
        /// Requested row.
        index: usize,
        /// Rows currently rendered.
        count: usize,
    },

    /// The data model schema has no node for this field.
    #[error("field '{path}' does not exist in the data model")]
    UnknownField {
        /// Schema-relative path that failed to resolve.
        path: String,
    },
}

impl BindingError {
    pub(crate) fn invalid(path: &str, reason: &'static str) -> Self {
        Self::InvalidPath {
            path: path.to_string(),
            reason,
        }
    }

    /// Check if the caller can correct the input and retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RowOutOfRange { .. } | Self::UnknownField { .. })
    }

    /// Get a hint for fixing this error.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::InvalidPath { .. } => {
                Some("Bindings use dot-separated field names with optional [n] indices.")
            }
            Self::UnknownGroup { .. } | Self::NotRepeating { .. } => {
                Some("Check that the group id refers to a repeating group in the current layout.")
            }
            Self::UnknownField { .. } => Some("Check the binding against the data model schema."),
            Self::RowOutOfRange { .. } => None,
        }
    }
}

/// Result type alias for binding operations.
pub type Result<T> = std::result::Result<T, BindingError>;
