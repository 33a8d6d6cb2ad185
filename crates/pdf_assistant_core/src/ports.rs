//! crates/pdf_assistant_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the object store, the database and the model provider.

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{
    CallerContext, GeneratedContent, GenerationPayload, PdfRecord, QaRecord, Turn,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The remote service understood the request and refused it.
    #[error("Request rejected: {0}")]
    Rejected(String),
    /// The call never completed: connection, timeout or an invalidated remote session.
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Blob storage holding the uploaded PDFs and images.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Lists the object names stored in `bucket`, in store order.
    async fn list_blobs(&self, bucket: &str) -> PortResult<Vec<String>>;

    async fn download(&self, bucket: &str, name: &str) -> PortResult<Vec<u8>>;

    /// Stores `data` under `name`, replacing any existing object with that name.
    async fn upload(
        &self,
        bucket: &str,
        name: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> PortResult<()>;

    /// Creates `bucket` if it does not exist yet.
    async fn ensure_bucket(&self, bucket: &str) -> PortResult<()>;
}

/// A hosted large-language-model endpoint.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// A stateless single-shot call.
    async fn generate(&self, payload: &GenerationPayload) -> PortResult<String>;

    /// A call made in the context of the prior `history`.
    async fn converse(&self, history: &[Turn], payload: &GenerationPayload)
        -> PortResult<String>;
}

#[async_trait]
pub trait DatabaseService: Send + Sync {
    // --- PDF Catalog ---
    async fn list_pdfs(&self) -> PortResult<Vec<PdfRecord>>;

    async fn get_pdf_by_id(&self, pdf_id: Uuid) -> PortResult<PdfRecord>;

    /// Inserts a catalog row for `file_name`, or touches `updated_at` if one exists.
    async fn upsert_pdf(&self, file_name: &str, file_path: &str) -> PortResult<PdfRecord>;

    async fn save_image_record(&self, file_name: &str, file_path: &str) -> PortResult<()>;

    // --- Generated Output ---
    async fn save_qa_record(&self, record: QaRecord) -> PortResult<()>;

    async fn save_generated_content(&self, record: GeneratedContent) -> PortResult<()>;

    // --- Caller Context ---
    async fn get_caller_context(&self, context_id: Uuid) -> PortResult<Option<CallerContext>>;

    async fn save_caller_context(&self, context: &CallerContext) -> PortResult<()>;
}
