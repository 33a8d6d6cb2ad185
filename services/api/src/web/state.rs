//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use pdf_assistant_core::{
    ports::{ContentStore, DatabaseService, GenerationService},
    resolve::MatchPolicy,
    AssistantSettings, PdfAssistant,
};
use std::sync::Arc;

use crate::config::Config;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn DatabaseService>,
    pub store: Arc<dyn ContentStore>,
    pub generator: Arc<dyn GenerationService>,
    pub image_bucket: String,
    pub assistant_settings: AssistantSettings,
}

impl AppState {
    pub fn new(
        config: &Config,
        db: Arc<dyn DatabaseService>,
        store: Arc<dyn ContentStore>,
        generator: Arc<dyn GenerationService>,
    ) -> Self {
        let match_policy = if config.allow_any_document_fallback {
            MatchPolicy::AllowAnyDocument
        } else {
            MatchPolicy::Strict
        };
        Self {
            db,
            store,
            generator,
            image_bucket: config.image_bucket.clone(),
            assistant_settings: AssistantSettings {
                bucket: config.pdf_bucket.clone(),
                max_payload_bytes: config.max_payload_bytes,
                match_policy,
            },
        }
    }

    pub fn pdf_bucket(&self) -> &str {
        &self.assistant_settings.bucket
    }

    /// A fresh session manager; callers load or resume a document on it.
    pub fn assistant(&self) -> PdfAssistant {
        PdfAssistant::new(
            self.store.clone(),
            self.generator.clone(),
            self.assistant_settings.clone(),
        )
    }
}
