pub mod assistant;
pub mod domain;
pub mod error;
pub mod pdf;
pub mod ports;
pub mod prompts;
pub mod resolve;

pub use assistant::{AssistantSettings, ChatState, PdfAssistant, DEFAULT_QUIZ_QUESTIONS};
pub use domain::{
    Attachment, CallerContext, ContentKind, DetailLevel, DocumentSession, GeneratedContent,
    GenerationPayload, GenerationRequest, PdfRecord, QaRecord, Role, SafetyMode, Turn,
    CATALOG_DESCRIPTION, PDF_MIME_TYPE,
};
pub use error::{AssistantError, AssistantResult, NO_DOCUMENT_MESSAGE};
pub use pdf::{fit_for_transmission, DEFAULT_MAX_PAYLOAD_BYTES};
pub use ports::{ContentStore, DatabaseService, GenerationService, PortError, PortResult};
pub use resolve::MatchPolicy;
