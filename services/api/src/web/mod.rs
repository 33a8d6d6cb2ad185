pub mod files;
pub mod protocol;
pub mod rest;
pub mod session;
pub mod state;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

pub use rest::{
    chat_handler, list_pdfs_handler, load_status_handler, select_pdf_handler, upload_pdf_handler,
    ApiDoc,
};
pub use state::AppState;

/// Builds the application routes. Layers (CORS, tracing, body limits) are added by the binary.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/pdfs", get(list_pdfs_handler).post(upload_pdf_handler))
        .route("/pdfs/select", post(select_pdf_handler))
        .route("/pdfs/status", get(load_status_handler))
        .route("/chat", post(chat_handler))
        .with_state(state)
}
