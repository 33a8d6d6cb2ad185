//! crates/pdf_assistant_core/src/assistant.rs
//!
//! The document session manager. A `PdfAssistant` owns one loaded PDF and the
//! conversation about it, and dispatches the four content-generation operations
//! to the generation backend.
//!
//! Instances are cheap and meant to be built per request; the conversation
//! history is handed back to the caller (`history`/`into_history`) so it can be
//! persisted and passed to `resume` on the next request.

use std::sync::Arc;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    domain::{
        Attachment, DetailLevel, DocumentSession, GenerationPayload, GenerationRequest,
        SafetyMode, Turn,
    },
    error::{AssistantError, AssistantResult},
    pdf::{fit_for_transmission, parse_pdf, DEFAULT_MAX_PAYLOAD_BYTES},
    ports::{ContentStore, GenerationService, PortError},
    prompts,
    resolve::{resolve_blob, MatchKind, MatchPolicy},
};

pub const DEFAULT_QUIZ_QUESTIONS: u32 = 5;

//=========================================================================================
// Settings
//=========================================================================================

#[derive(Debug, Clone)]
pub struct AssistantSettings {
    /// Bucket of the content store that holds the PDFs.
    pub bucket: String,
    /// Budget passed to `fit_for_transmission` before every backend call.
    pub max_payload_bytes: usize,
    pub match_policy: MatchPolicy,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            bucket: "pdfs".to_string(),
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            match_policy: MatchPolicy::AllowAnyDocument,
        }
    }
}

//=========================================================================================
// Chat Context State Machine
//=========================================================================================

/// Lifecycle of the conversational context held with the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatState {
    /// Opened from the accumulated history, nothing sent yet.
    Fresh,
    /// At least one exchange succeeded in this context.
    Active,
    /// The backend failed and recovery did not succeed; the next question
    /// reopens the context from the history.
    Expired,
}

/// Classifies a failed recovery attempt. Transport failures mean the context
/// could not be re-established; anything else is the backend refusing the request.
fn recovery_failure(e: PortError) -> AssistantError {
    match e {
        PortError::Transport(_) => AssistantError::SessionExpired(e),
        other => AssistantError::generation("Question asking", other),
    }
}

//=========================================================================================
// The Session Manager
//=========================================================================================

pub struct PdfAssistant {
    store: Arc<dyn ContentStore>,
    generator: Arc<dyn GenerationService>,
    settings: AssistantSettings,
    document: Option<DocumentSession>,
    history: Vec<Turn>,
    chat_state: ChatState,
}

impl PdfAssistant {
    pub fn new(
        store: Arc<dyn ContentStore>,
        generator: Arc<dyn GenerationService>,
        settings: AssistantSettings,
    ) -> Self {
        Self {
            store,
            generator,
            settings,
            document: None,
            history: Vec::new(),
            chat_state: ChatState::Fresh,
        }
    }

    pub fn document(&self) -> Option<&DocumentSession> {
        self.document.as_ref()
    }

    pub fn history(&self) -> &[Turn] {
        &self.history
    }

    pub fn into_history(self) -> Vec<Turn> {
        self.history
    }

    pub fn chat_state(&self) -> ChatState {
        self.chat_state
    }

    /// Loads a document from the content store and opens a new conversation about it.
    ///
    /// The conversation starts with a model-authored synopsis of the document. The
    /// load is all-or-nothing: on any error the previously loaded document (if any)
    /// and its history are left untouched.
    pub async fn load(&mut self, document_id: Uuid, display_name: &str) -> AssistantResult<()> {
        let document = self.fetch_document(document_id, display_name).await?;
        let synopsis = self.synopsis(&document.raw_bytes).await?;
        self.install(document, vec![Turn::model(synopsis)]);
        info!("PDF content analyzed.");
        Ok(())
    }

    /// Loads a document and continues a previously persisted conversation about it,
    /// skipping the synopsis call.
    pub async fn resume(
        &mut self,
        document_id: Uuid,
        display_name: &str,
        history: Vec<Turn>,
    ) -> AssistantResult<()> {
        let document = self.fetch_document(document_id, display_name).await?;
        self.install(document, history);
        Ok(())
    }

    fn install(&mut self, document: DocumentSession, history: Vec<Turn>) {
        self.chat_state = ChatState::Fresh;
        self.history = history;
        self.document = Some(document);
    }

    async fn fetch_document(
        &self,
        document_id: Uuid,
        display_name: &str,
    ) -> AssistantResult<DocumentSession> {
        info!("PDF loading: {} (ID: {})", display_name, document_id);
        let bucket = &self.settings.bucket;

        let stored = self
            .store
            .list_blobs(bucket)
            .await
            .map_err(AssistantError::Store)?;
        debug!(bucket = %bucket, files = stored.len(), "bucket listed");

        let matched = resolve_blob(display_name, &stored, self.settings.match_policy)
            .ok_or_else(|| AssistantError::NotFound(display_name.to_string()))?;
        match matched.kind {
            MatchKind::Fallback => warn!(
                requested = display_name,
                serving = %matched.name,
                "no stored PDF matches the request, falling back to an unrelated document"
            ),
            kind => debug!(?kind, name = %matched.name, "stored PDF resolved"),
        }

        let raw_bytes = self
            .store
            .download(bucket, &matched.name)
            .await
            .map_err(|e| match e {
                PortError::NotFound(msg) => AssistantError::NotFound(msg),
                other => AssistantError::Store(other),
            })?;
        if raw_bytes.is_empty() {
            return Err(AssistantError::EmptyContent(matched.name));
        }
        info!("PDF content downloaded, size: {} byte.", raw_bytes.len());

        let parsed =
            parse_pdf(&raw_bytes).map_err(|e| AssistantError::InvalidDocument(e.to_string()))?;
        info!(
            pages = parsed.page_texts.len(),
            images = parsed.page_images.iter().map(Vec::len).sum::<usize>(),
            "PDF content extracted"
        );

        Ok(DocumentSession {
            id: document_id,
            title: display_name.to_string(),
            stored_name: matched.name,
            raw_bytes,
            full_text: parsed.full_text,
            page_texts: parsed.page_texts,
            page_images: parsed.page_images,
        })
    }

    async fn synopsis(&self, raw_bytes: &[u8]) -> AssistantResult<String> {
        let mut payload = GenerationPayload {
            attachments: vec![self.fitted_document(raw_bytes)],
            prompt: prompts::SYNOPSIS_PROMPT.to_string(),
            safety: SafetyMode::Permissive,
        };

        match self.generator.generate(&payload).await {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!("Safety settings error: {}, trying without safety settings...", e);
                payload.safety = SafetyMode::ProviderDefault;
                self.generator
                    .generate(&payload)
                    .await
                    .map_err(|e| AssistantError::generation("PDF content analysis", e))
            }
        }
    }

    fn fitted_document(&self, raw_bytes: &[u8]) -> Attachment {
        Attachment::pdf(fit_for_transmission(raw_bytes, self.settings.max_payload_bytes).into_owned())
    }

    fn loaded_document(&self) -> AssistantResult<Attachment> {
        let document = self.document.as_ref().ok_or(AssistantError::NoDocument)?;
        Ok(self.fitted_document(&document.raw_bytes))
    }

    //=====================================================================================
    // Content Generation
    //=====================================================================================

    /// Runs whichever operation `request` names.
    pub async fn run(&mut self, request: GenerationRequest) -> AssistantResult<String> {
        match request {
            GenerationRequest::Question { text, image } => self.ask_question(&text, image).await,
            GenerationRequest::Quiz { question_count } => self.generate_quiz(question_count).await,
            GenerationRequest::Summary { detail } => self.generate_summary(detail).await,
            GenerationRequest::KeyConcepts => self.extract_key_concepts().await,
        }
    }

    /// Asks a question about the document in the running conversation.
    ///
    /// If the backend fails, the conversation context is reopened from the
    /// accumulated history and the question is retried once without safety overrides.
    pub async fn ask_question(
        &mut self,
        question: &str,
        image: Option<Attachment>,
    ) -> AssistantResult<String> {
        let mut attachments = vec![self.loaded_document()?];
        if let Some(image) = &image {
            attachments.push(image.clone());
        }
        let mut payload = GenerationPayload {
            attachments,
            prompt: prompts::question_prompt(question, image.is_some()),
            safety: SafetyMode::Permissive,
        };

        let first_attempt = self.generator.converse(&self.history, &payload).await;
        let answer = match first_attempt {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Chat session error: {}. Creating new chat session and retrying...", e);
                self.chat_state = ChatState::Expired;
                payload.safety = SafetyMode::ProviderDefault;
                let retried = self
                    .generator
                    .converse(&self.history, &payload)
                    .await
                    .map_err(|e| {
                        error!("Question asking error: {}", e);
                        recovery_failure(e)
                    })?;
                info!("New chat session started.");
                retried
            }
        };

        let question_turn = Turn::user(question, image);
        let answer_turn = Turn::model(answer.clone());
        self.chat_state = ChatState::Active;
        self.history.push(question_turn);
        self.history.push(answer_turn);
        Ok(answer)
    }

    pub async fn generate_quiz(&self, question_count: u32) -> AssistantResult<String> {
        self.one_shot("Quiz generation", prompts::quiz_prompt(question_count))
            .await
    }

    pub async fn generate_summary(&self, detail: DetailLevel) -> AssistantResult<String> {
        self.one_shot("Summary generation", prompts::summary_prompt(detail))
            .await
    }

    pub async fn extract_key_concepts(&self) -> AssistantResult<String> {
        self.one_shot("Concept extraction", prompts::KEY_CONCEPTS_PROMPT.to_string())
            .await
    }

    /// A stateless call that never touches the conversation.
    async fn one_shot(&self, operation: &'static str, prompt: String) -> AssistantResult<String> {
        let payload = GenerationPayload {
            attachments: vec![self.loaded_document()?],
            prompt,
            safety: SafetyMode::Permissive,
        };
        self.generator.generate(&payload).await.map_err(|e| {
            error!("{} error: {}", operation, e);
            AssistantError::generation(operation, e)
        })
    }
}

//=========================================================================================
// Tests
//=========================================================================================
