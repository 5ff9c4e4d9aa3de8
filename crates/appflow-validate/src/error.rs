//! Schema compilation errors.

use thiserror::Error;

/// Errors raised while compiling a data model schema.
///
/// A compile failure is fatal for the validation run that needed the
/// schema. Per-field failures are reported as validation messages instead.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SchemaError {
    /// A `$ref` points at nothing in the document.
    #[error("schema reference '{reference}' does not resolve")]
    InvalidRef {
        /// The unresolved reference.
        reference: String,
    },

    /// A `pattern` keyword is not a valid regular expression.
    #[error("invalid pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The pattern as written in the schema.
        pattern: String,
        /// Regex compile error.
        #[source]
        source: regex::Error,
    },

    /// The root element path points at nothing.
    #[error("schema root element '{path}' not found")]
    MissingRoot {
        /// Root path derived from the schema.
        path: String,
    },
}

impl SchemaError {
    /// Message suitable for a top-level form error.
    pub fn user_message(&self) -> String {
        format!("The data model could not be loaded: {self}")
    }

    /// Schema errors come from the app definition and cannot be fixed by
    /// the user filling in the form.
    pub fn is_recoverable(&self) -> bool {
        false
    }
}

/// Result type alias for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;
