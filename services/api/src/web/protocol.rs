//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the API server.

use chrono::{DateTime, Utc};
use pdf_assistant_core::domain::PdfRecord;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client
//=========================================================================================

#[derive(Deserialize, Debug, ToSchema)]
pub struct SelectPdfRequest {
    pub pdf_id: Uuid,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct LoadStatusQuery {
    pub pdf_id: Uuid,
}

/// The multipart form accepted by `POST /pdfs`.
#[derive(Debug, ToSchema)]
pub struct UploadPdfForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
}

/// What the `/chat` endpoint should do with the loaded PDF.
#[derive(Deserialize, Serialize, Debug, Clone, Copy, Default, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ChatMode {
    #[default]
    Chat,
    GenerateQuiz,
    GenerateSummary,
    ExtractKeyConcepts,
}

impl ChatMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "" | "chat" => Some(Self::Chat),
            "generate_quiz" => Some(Self::GenerateQuiz),
            "generate_summary" => Some(Self::GenerateSummary),
            "extract_key_concepts" => Some(Self::ExtractKeyConcepts),
            _ => None,
        }
    }
}

/// The JSON form of a `/chat` request. Multipart requests carry the same fields
/// plus an optional `image` file part.
#[derive(Deserialize, Debug, Default, ToSchema)]
pub struct ChatRequest {
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub mode: Option<String>,
    pub num_questions: Option<u32>,
    pub detail_level: Option<String>,
}

//=========================================================================================
// Messages Sent FROM the Server
//=========================================================================================

/// A catalog entry as shown to the client.
#[derive(Serialize, Debug, ToSchema)]
pub struct PdfSummary {
    pub id: Uuid,
    pub file_name: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PdfRecord> for PdfSummary {
    fn from(record: PdfRecord) -> Self {
        Self {
            id: record.id,
            file_name: record.file_name,
            title: record.title,
            description: record.description,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct SelectPdfResponse {
    pub success: bool,
    pub pdf_id: Uuid,
    pub pdf_name: String,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum LoadStatus {
    Ready,
    Error,
    NotFound,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct LoadStatusResponse {
    pub success: bool,
    pub status: LoadStatus,
    pub message: String,
}

impl LoadStatusResponse {
    pub fn new(status: LoadStatus, message: impl Into<String>) -> Self {
        Self {
            success: status == LoadStatus::Ready,
            status,
            message: message.into(),
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ChatResponse {
    pub success: bool,
    pub answer: String,
    pub mode: ChatMode,
}

/// The body of every non-2xx response.
#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}
