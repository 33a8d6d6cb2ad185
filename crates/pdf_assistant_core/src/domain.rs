//! crates/pdf_assistant_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database, storage or model backend.

use chrono::{DateTime, Utc};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// MIME type used for every document payload sent to the generation backend.
pub const PDF_MIME_TYPE: &str = "application/pdf";

//=========================================================================================
// Loaded Document
//=========================================================================================

/// One image embedded in a page of the loaded document.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub page_index: usize,
    pub image_index: usize,
    pub image: DynamicImage,
}

/// Everything the assistant knows about the currently loaded PDF.
///
/// `raw_bytes` is the single source of truth; every other field is derived from it
/// during a load.
#[derive(Debug, Clone)]
pub struct DocumentSession {
    pub id: Uuid,
    pub title: String,
    /// Name of the blob that was actually downloaded from the content store.
    pub stored_name: String,
    pub raw_bytes: Vec<u8>,
    pub full_text: String,
    pub page_texts: Vec<String>,
    pub page_images: Vec<Vec<ExtractedImage>>,
}

impl DocumentSession {
    pub fn page_count(&self) -> usize {
        self.page_texts.len()
    }

    pub fn image_count(&self) -> usize {
        self.page_images.iter().map(Vec::len).sum()
    }
}

//=========================================================================================
// Conversation
//=========================================================================================

/// Who authored a turn of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
}

/// Inline binary content sent alongside a prompt (the PDF itself, or a user image).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub mime_type: String,
    #[serde(with = "base64_bytes")]
    pub data: Vec<u8>,
}

impl Attachment {
    pub fn new(mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data,
        }
    }

    pub fn pdf(data: Vec<u8>) -> Self {
        Self::new(PDF_MIME_TYPE, data)
    }
}

impl std::fmt::Debug for Attachment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attachment")
            .field("mime_type", &self.mime_type)
            .field("len", &self.data.len())
            .finish()
    }
}

/// A single entry of the conversation history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<Attachment>,
}

impl Turn {
    pub fn user(text: impl Into<String>, image: Option<Attachment>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            image,
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: Role::Model,
            text: text.into(),
            image: None,
        }
    }
}

//=========================================================================================
// Generation Requests
//=========================================================================================

/// Requested length of a generated summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl DetailLevel {
    /// Parses a user-supplied level; anything unrecognised falls back to `Medium`.
    pub fn parse_lossy(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            _ => Self::Medium,
        }
    }

    /// The length wording inserted into the summary prompt.
    pub fn length_phrase(self) -> &'static str {
        match self {
            Self::Low => "short (1-2 paragraphs)",
            Self::Medium => "medium length (3-4 paragraphs)",
            Self::High => "detailed (5+ paragraphs)",
        }
    }
}

/// One of the four content-generation operations the assistant supports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationRequest {
    Question {
        text: String,
        image: Option<Attachment>,
    },
    Quiz {
        question_count: u32,
    },
    Summary {
        detail: DetailLevel,
    },
    KeyConcepts,
}

/// Kind of non-conversational content persisted to the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Quiz,
    Summary,
    KeyConcepts,
}

impl ContentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Quiz => "quiz",
            Self::Summary => "summary",
            Self::KeyConcepts => "key_concepts",
        }
    }
}

impl GenerationRequest {
    /// The record-store content type for non-conversational requests.
    pub fn content_kind(&self) -> Option<ContentKind> {
        match self {
            Self::Question { .. } => None,
            Self::Quiz { .. } => Some(ContentKind::Quiz),
            Self::Summary { .. } => Some(ContentKind::Summary),
            Self::KeyConcepts => Some(ContentKind::KeyConcepts),
        }
    }
}

/// How strictly the backend should apply its content-safety filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyMode {
    /// Disable the harassment, hate-speech, sexual and dangerous-content blocks.
    Permissive,
    /// Whatever the provider applies when no overrides are sent.
    ProviderDefault,
}

/// A single prompt with its inline attachments, ready for the generation backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPayload {
    pub attachments: Vec<Attachment>,
    pub prompt: String,
    pub safety: SafetyMode,
}

//=========================================================================================
// Record Store Entities
//=========================================================================================

/// A catalog entry describing an uploaded PDF.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PdfRecord {
    pub id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Description given to every catalog entry.
pub const CATALOG_DESCRIPTION: &str = "PDF file";

impl PdfRecord {
    /// Catalog title for a stored file: its name without the `.pdf` extension.
    pub fn title_for(file_name: &str) -> &str {
        match file_name.len().checked_sub(4) {
            Some(cut)
                if file_name.is_char_boundary(cut)
                    && file_name[cut..].eq_ignore_ascii_case(".pdf") =>
            {
                &file_name[..cut]
            }
            _ => file_name,
        }
    }
}

/// A single question-and-answer exchange about a document.
#[derive(Debug, Clone)]
pub struct QaRecord {
    pub id: Uuid,
    pub pdf_id: Uuid,
    pub question: String,
    pub answer: String,
}

/// A generated quiz, summary or key-concept list.
#[derive(Debug, Clone)]
pub struct GeneratedContent {
    pub id: Uuid,
    pub pdf_id: Uuid,
    pub kind: ContentKind,
    pub content: String,
}

/// The per-caller state carried between requests.
#[derive(Debug, Clone)]
pub struct CallerContext {
    pub id: Uuid,
    pub pdf_id: Uuid,
    pub title: String,
    pub history: Vec<Turn>,
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_level_falls_back_to_medium() {
        assert_eq!(DetailLevel::parse_lossy("HIGH"), DetailLevel::High);
        assert_eq!(DetailLevel::parse_lossy(" low "), DetailLevel::Low);
        assert_eq!(DetailLevel::parse_lossy("extreme"), DetailLevel::Medium);
        assert_eq!(DetailLevel::parse_lossy(""), DetailLevel::Medium);
    }

    #[test]
    fn detail_level_wording() {
        assert!(DetailLevel::High.length_phrase().contains("5+ paragraphs"));
        assert!(DetailLevel::Medium.length_phrase().contains("3-4 paragraphs"));
        assert!(DetailLevel::Low.length_phrase().contains("1-2 paragraphs"));
    }

    #[test]
    fn history_with_image_survives_json() {
        let history = vec![
            Turn::model("A short synopsis."),
            Turn::user("What is this?", Some(Attachment::new("image/png", vec![1, 2, 3]))),
        ];
        let json = serde_json::to_string(&history).unwrap();
        assert!(json.contains("\"role\":\"model\""));
        assert!(json.contains("AQID"));

        let restored: Vec<Turn> = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, history);
    }

    #[test]
    fn content_kind_only_for_one_shot_requests() {
        let question = GenerationRequest::Question {
            text: "why?".into(),
            image: None,
        };
        assert_eq!(question.content_kind(), None);
        assert_eq!(
            GenerationRequest::KeyConcepts.content_kind().map(ContentKind::as_str),
            Some("key_concepts")
        );
    }

    #[test]
    fn catalog_title_drops_the_pdf_extension() {
        assert_eq!(PdfRecord::title_for("report.pdf"), "report");
        assert_eq!(PdfRecord::title_for("Annual.PDF"), "Annual");
        assert_eq!(PdfRecord::title_for("notes.pdf.txt"), "notes.pdf.txt");
        assert_eq!(PdfRecord::title_for("pdf"), "pdf");
    }
}
