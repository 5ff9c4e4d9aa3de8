//! Model parsing errors.

use thiserror::Error;

/// Errors raised while decoding backend documents into model types.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModelError {
    /// The layout document did not have a recognised shape.
    #[error("invalid layout document: {reason}")]
    InvalidLayout {
        /// What was wrong with the document.
        reason: String,
    },

    /// A document failed to deserialize.
    #[error("failed to decode {document}: {source}")]
    Decode {
        /// Which document was being decoded.
        document: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ModelError {
    /// Wrap a serde error with the name of the document being decoded.
    pub fn decode(document: &'static str, source: serde_json::Error) -> Self {
        Self::Decode { document, source }
    }
}

/// Result type alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
