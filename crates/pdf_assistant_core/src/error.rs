//! crates/pdf_assistant_core/src/error.rs
//!
//! Failure taxonomy of the document session manager.

use crate::ports::PortError;

/// The message shown when an operation needs a document and none is loaded.
pub const NO_DOCUMENT_MESSAGE: &str = "Please upload a PDF file first.";

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("Please upload a PDF file first.")]
    NoDocument,

    /// No document-typed blob in the store matched the request.
    #[error("PDF file not found: {0}")]
    NotFound(String),

    #[error("PDF content is empty: {0}")]
    EmptyContent(String),

    #[error("PDF could not be read: {0}")]
    InvalidDocument(String),

    /// The content store failed while listing or downloading.
    #[error("Storage error: {0}")]
    Store(#[source] PortError),

    #[error("{operation} failed: {source}")]
    GenerationFailure {
        operation: &'static str,
        #[source]
        source: PortError,
    },

    /// The conversational context failed and the recovery attempt failed too.
    #[error("Chat session could not be recovered: {0}")]
    SessionExpired(#[source] PortError),
}

impl AssistantError {
    pub fn generation(operation: &'static str, source: PortError) -> Self {
        Self::GenerationFailure { operation, source }
    }

    /// Whether the failure was caused by the caller rather than a remote service.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::NoDocument | Self::NotFound(_))
    }
}

/// A convenience type alias for `Result<T, AssistantError>`.
pub type AssistantResult<T> = Result<T, AssistantError>;
