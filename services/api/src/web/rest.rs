//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::{
    files::{self, IMAGE_EXTENSIONS, PDF_EXTENSIONS},
    protocol::{
        ChatMode, ChatRequest, ChatResponse, ErrorResponse, LoadStatus, LoadStatusQuery,
        LoadStatusResponse, PdfSummary, SelectPdfRequest, SelectPdfResponse, UploadPdfForm,
    },
    session,
    state::AppState,
};
use axum::{
    extract::{FromRequest, Multipart, Query, Request, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use chrono::Utc;
use pdf_assistant_core::{
    domain::{
        Attachment, CallerContext, ContentKind, DetailLevel, GeneratedContent, GenerationRequest,
        PdfRecord, QaRecord, PDF_MIME_TYPE,
    },
    ports::{DatabaseService, PortError, PortResult},
    resolve::is_document_name,
    AssistantError, DEFAULT_QUIZ_QUESTIONS,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_pdfs_handler,
        upload_pdf_handler,
        select_pdf_handler,
        load_status_handler,
        chat_handler,
    ),
    components(
        schemas(
            PdfSummary,
            SelectPdfRequest,
            SelectPdfResponse,
            UploadPdfForm,
            LoadStatus,
            LoadStatusResponse,
            ChatMode,
            ChatRequest,
            ChatResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "PDF Assistant API", description = "Chat with, quiz on and summarize uploaded PDF documents.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Failure Responses
//=========================================================================================

pub type Failure = (StatusCode, Json<ErrorResponse>);
type HandlerResult<T> = Result<T, Failure>;

fn failure(status: StatusCode, message: impl Into<String>) -> Failure {
    (
        status,
        Json(ErrorResponse {
            success: false,
            error: message.into(),
        }),
    )
}

fn port_failure(context: &str, e: PortError) -> Failure {
    error!("{}: {:?}", context, e);
    match e {
        PortError::NotFound(_) => failure(StatusCode::NOT_FOUND, "PDF not found."),
        _ => failure(StatusCode::INTERNAL_SERVER_ERROR, context),
    }
}

fn assistant_failure(e: AssistantError) -> Failure {
    let status = match &e {
        AssistantError::NoDocument => StatusCode::BAD_REQUEST,
        AssistantError::NotFound(_) => StatusCode::NOT_FOUND,
        AssistantError::EmptyContent(_) | AssistantError::InvalidDocument(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AssistantError::Store(_)
        | AssistantError::GenerationFailure { .. }
        | AssistantError::SessionExpired(_) => StatusCode::BAD_GATEWAY,
    };
    if e.is_client_error() {
        warn!("Request failed: {}", e);
    } else {
        error!("Request failed: {}", e);
    }
    failure(status, e.to_string())
}

fn multipart_failure(e: axum::extract::multipart::MultipartError) -> Failure {
    failure(e.status(), format!("Failed to read multipart data: {}", e.body_text()))
}

//=========================================================================================
// Caller Context Helpers
//=========================================================================================

async fn caller_context(app_state: &AppState, headers: &HeaderMap) -> HandlerResult<Option<CallerContext>> {
    let Some(id) = session::caller_id(headers) else {
        return Ok(None);
    };
    app_state
        .db
        .get_caller_context(id)
        .await
        .map_err(|e| port_failure("Failed to read the caller context", e))
}

/// Makes `record` the caller's current PDF, starting a new conversation.
async fn select_for_caller(
    app_state: &AppState,
    headers: &HeaderMap,
    record: &PdfRecord,
) -> HandlerResult<impl IntoResponse> {
    let context = CallerContext {
        id: session::caller_id(headers).unwrap_or_else(Uuid::new_v4),
        pdf_id: record.id,
        title: record.file_name.clone(),
        history: Vec::new(),
    };
    app_state
        .db
        .save_caller_context(&context)
        .await
        .map_err(|e| port_failure("Failed to store the selection", e))?;
    info!("PDF selected: {} (ID: {})", record.file_name, record.id);

    let body = SelectPdfResponse {
        success: true,
        pdf_id: record.id,
        pdf_name: record.file_name.clone(),
    };
    Ok((
        [(header::SET_COOKIE, session::session_cookie(context.id))],
        Json(body),
    ))
}

/// Imports every PDF already in the bucket into an empty catalog.
async fn import_stored_pdfs(app_state: &AppState) -> PortResult<Vec<PdfRecord>> {
    let bucket = app_state.pdf_bucket();
    let names = app_state.store.list_blobs(bucket).await?;
    let mut imported = Vec::new();
    for name in names.iter().filter(|name| is_document_name(name)) {
        let record = app_state
            .db
            .upsert_pdf(name, &format!("{}/{}", bucket, name))
            .await?;
        imported.push(record);
    }
    info!(count = imported.len(), "stored PDFs imported into the catalog");
    Ok(imported)
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List the PDF catalog.
#[utoipa::path(
    get,
    path = "/pdfs",
    responses(
        (status = 200, description = "All known PDFs, newest first", body = [PdfSummary]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_pdfs_handler(
    State(app_state): State<Arc<AppState>>,
) -> HandlerResult<Json<Vec<PdfSummary>>> {
    let mut pdfs = app_state
        .db
        .list_pdfs()
        .await
        .map_err(|e| port_failure("Failed to list PDFs", e))?;

    if pdfs.is_empty() {
        pdfs = import_stored_pdfs(&app_state)
            .await
            .map_err(|e| port_failure("Failed to import stored PDFs", e))?;
    }

    Ok(Json(pdfs.into_iter().map(PdfSummary::from).collect()))
}

/// Upload a PDF and select it.
///
/// Accepts a multipart/form-data request with a `file` part. A stored PDF with
/// the same (sanitized) name is replaced.
#[utoipa::path(
    post,
    path = "/pdfs",
    request_body(content = UploadPdfForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "PDF uploaded and selected", body = SelectPdfResponse),
        (status = 400, description = "Missing file or not a PDF", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn upload_pdf_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> HandlerResult<impl IntoResponse> {
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(multipart_failure)? {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let data = field.bytes().await.map_err(multipart_failure)?;
        upload = Some((file_name, data));
        break;
    }

    let Some((file_name, data)) = upload.filter(|(name, _)| !name.is_empty()) else {
        return Err(failure(StatusCode::BAD_REQUEST, "No file selected."));
    };
    let safe_name = files::sanitize_file_name(&file_name);
    if !files::has_extension(&safe_name, PDF_EXTENSIONS) {
        return Err(failure(
            StatusCode::BAD_REQUEST,
            "Invalid file type. Please upload a PDF.",
        ));
    }
    if data.is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, "The uploaded file is empty."));
    }

    let bucket = app_state.pdf_bucket();
    app_state
        .store
        .upload(bucket, &safe_name, data.to_vec(), PDF_MIME_TYPE)
        .await
        .map_err(|e| port_failure("Upload to storage failed.", e))?;
    let record = app_state
        .db
        .upsert_pdf(&safe_name, &format!("{}/{}", bucket, safe_name))
        .await
        .map_err(|e| port_failure("Failed to record the upload.", e))?;

    select_for_caller(&app_state, &headers, &record).await
}

/// Select an existing PDF.
#[utoipa::path(
    post,
    path = "/pdfs/select",
    request_body = SelectPdfRequest,
    responses(
        (status = 200, description = "PDF selected", body = SelectPdfResponse),
        (status = 404, description = "Unknown PDF", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn select_pdf_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<SelectPdfRequest>,
) -> HandlerResult<impl IntoResponse> {
    let record = app_state
        .db
        .get_pdf_by_id(request.pdf_id)
        .await
        .map_err(|e| port_failure("Database query error", e))?;
    select_for_caller(&app_state, &headers, &record).await
}

/// Load the selected PDF and report whether it is ready for questions.
///
/// Loading downloads the document and generates its synopsis, which becomes the
/// first entry of the caller's conversation.
#[utoipa::path(
    get,
    path = "/pdfs/status",
    params(LoadStatusQuery),
    responses(
        (status = 200, description = "Load outcome", body = LoadStatusResponse),
        (status = 400, description = "Missing or malformed pdf_id")
    )
)]
pub async fn load_status_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<LoadStatusQuery>,
) -> HandlerResult<Json<LoadStatusResponse>> {
    let context = caller_context(&app_state, &headers).await?;
    let Some(mut context) = context.filter(|c| c.pdf_id == query.pdf_id) else {
        return Ok(Json(LoadStatusResponse::new(
            LoadStatus::NotFound,
            "PDF not selected or session expired",
        )));
    };

    let record = match app_state.db.get_pdf_by_id(query.pdf_id).await {
        Ok(record) => record,
        Err(PortError::NotFound(_)) => {
            return Ok(Json(LoadStatusResponse::new(
                LoadStatus::NotFound,
                "PDF not found in database",
            )))
        }
        Err(e) => {
            error!("Status check error: {}", e);
            return Ok(Json(LoadStatusResponse::new(
                LoadStatus::Error,
                format!("Status check error: {}", e),
            )));
        }
    };

    let mut assistant = app_state.assistant();
    if let Err(e) = assistant.load(record.id, &record.file_name).await {
        error!("PDF loading error: {}", e);
        return Ok(Json(LoadStatusResponse::new(
            LoadStatus::Error,
            format!("PDF loading error: {}", e),
        )));
    }

    context.history = assistant.into_history();
    if let Err(e) = app_state.db.save_caller_context(&context).await {
        warn!("Failed to store the conversation: {}", e);
    }
    Ok(Json(LoadStatusResponse::new(
        LoadStatus::Ready,
        format!("PDF loaded: {}", record.file_name),
    )))
}

//=========================================================================================
// Chat
//=========================================================================================

/// An image attached to a question.
pub struct ImageUpload {
    pub file_name: String,
    pub data: Vec<u8>,
}

/// A `/chat` request, sent either as JSON or as multipart form data.
pub struct ChatInput {
    pub request: ChatRequest,
    pub image: Option<ImageUpload>,
}

impl<S: Send + Sync> FromRequest<S> for ChatInput {
    type Rejection = Failure;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_multipart = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("multipart/form-data"));

        if !is_multipart {
            let Json(request) = Json::<ChatRequest>::from_request(req, state)
                .await
                .map_err(|e| failure(StatusCode::BAD_REQUEST, e.body_text()))?;
            return Ok(Self {
                request,
                image: None,
            });
        }

        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| failure(StatusCode::BAD_REQUEST, e.body_text()))?;
        let mut request = ChatRequest::default();
        let mut image = None;

        while let Some(field) = multipart.next_field().await.map_err(multipart_failure)? {
            let name = field.name().unwrap_or_default().to_string();
            if name == "image" {
                let file_name = field.file_name().unwrap_or_default().to_string();
                let data = field.bytes().await.map_err(multipart_failure)?;
                if !file_name.is_empty() && !data.is_empty() {
                    image = Some(ImageUpload {
                        file_name,
                        data: data.to_vec(),
                    });
                }
                continue;
            }

            let value = field.text().await.map_err(multipart_failure)?;
            match name.as_str() {
                "question" => request.question = value,
                "mode" => request.mode = Some(value),
                "detail_level" => request.detail_level = Some(value),
                "num_questions" if !value.trim().is_empty() => {
                    let count = value.trim().parse().map_err(|_| {
                        failure(
                            StatusCode::BAD_REQUEST,
                            "num_questions must be a positive integer.",
                        )
                    })?;
                    request.num_questions = Some(count);
                }
                _ => {}
            }
        }

        Ok(Self { request, image })
    }
}

/// Stores a question image and returns it as an attachment. Invalid or
/// unstorable images are dropped and the question goes ahead without them.
async fn store_question_image(app_state: &AppState, upload: ImageUpload) -> Option<Attachment> {
    let safe_name = files::sanitize_file_name(&upload.file_name);
    if safe_name.is_empty() || !files::has_extension(&safe_name, IMAGE_EXTENSIONS) {
        warn!("Ignoring image with unsupported name: {}", upload.file_name);
        return None;
    }

    let mime_type = files::image_mime_type(&safe_name);
    let key = format!("{}_{}", Utc::now().timestamp(), safe_name);
    let bucket = &app_state.image_bucket;
    if let Err(e) = app_state
        .store
        .upload(bucket, &key, upload.data.clone(), mime_type)
        .await
    {
        warn!("Image upload error: {}", e);
        return None;
    }
    if let Err(e) = app_state
        .db
        .save_image_record(&safe_name, &format!("{}/{}", bucket, key))
        .await
    {
        warn!("Failed to record the uploaded image: {}", e);
    }
    Some(Attachment::new(mime_type, upload.data))
}

fn persist_in_background(
    db: Arc<dyn DatabaseService>,
    pdf_id: Uuid,
    kind: Option<ContentKind>,
    question: String,
    answer: String,
) {
    tokio::spawn(async move {
        let outcome = match kind {
            None => {
                db.save_qa_record(QaRecord {
                    id: Uuid::new_v4(),
                    pdf_id,
                    question,
                    answer,
                })
                .await
            }
            Some(kind) => {
                db.save_generated_content(GeneratedContent {
                    id: Uuid::new_v4(),
                    pdf_id,
                    kind,
                    content: answer,
                })
                .await
            }
        };
        if let Err(e) = outcome {
            warn!("Failed to save generated output for PDF {}: {}", pdf_id, e);
        }
    });
}

/// Ask a question about, or generate content from, the selected PDF.
///
/// `mode` is one of `chat` (default), `generate_quiz`, `generate_summary` or
/// `extract_key_concepts`. Multipart requests may attach an `image` to a question.
#[utoipa::path(
    post,
    path = "/chat",
    request_body(content = ChatRequest, description = "JSON, or multipart/form-data with the same fields and an optional `image` file."),
    responses(
        (status = 200, description = "Generated answer", body = ChatResponse),
        (status = 400, description = "No PDF selected, empty question or invalid mode", body = ErrorResponse),
        (status = 404, description = "The selected PDF is missing", body = ErrorResponse),
        (status = 502, description = "The generation backend failed", body = ErrorResponse)
    )
)]
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    headers: HeaderMap,
    input: ChatInput,
) -> HandlerResult<Json<ChatResponse>> {
    let mut context = caller_context(&app_state, &headers)
        .await?
        .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "You need to select a PDF first."))?;

    let ChatInput { request, image } = input;
    let mode = match request.mode.as_deref() {
        None => ChatMode::Chat,
        Some(raw) => ChatMode::parse(raw)
            .ok_or_else(|| failure(StatusCode::BAD_REQUEST, "Invalid mode."))?,
    };
    if mode == ChatMode::Chat && request.question.trim().is_empty() {
        return Err(failure(StatusCode::BAD_REQUEST, "Question cannot be empty."));
    }

    let image = match image {
        Some(upload) => store_question_image(&app_state, upload).await,
        None => None,
    };

    let generation = match mode {
        ChatMode::Chat => GenerationRequest::Question {
            text: request.question.clone(),
            image,
        },
        ChatMode::GenerateQuiz => GenerationRequest::Quiz {
            question_count: request.num_questions.unwrap_or(DEFAULT_QUIZ_QUESTIONS).max(1),
        },
        ChatMode::GenerateSummary => GenerationRequest::Summary {
            detail: request
                .detail_level
                .as_deref()
                .map(DetailLevel::parse_lossy)
                .unwrap_or_default(),
        },
        ChatMode::ExtractKeyConcepts => GenerationRequest::KeyConcepts,
    };
    let kind = generation.content_kind();

    let record = app_state
        .db
        .get_pdf_by_id(context.pdf_id)
        .await
        .map_err(|e| port_failure("Database query error", e))?;

    let mut assistant = app_state.assistant();
    let prepared = if context.history.is_empty() {
        assistant.load(record.id, &record.file_name).await
    } else {
        let history = std::mem::take(&mut context.history);
        assistant.resume(record.id, &record.file_name, history).await
    };
    prepared.map_err(assistant_failure)?;

    let outcome = assistant.run(generation).await;
    context.history = assistant.into_history();
    if let Err(e) = app_state.db.save_caller_context(&context).await {
        warn!("Failed to store the conversation: {}", e);
    }
    let answer = outcome.map_err(assistant_failure)?;

    persist_in_background(
        app_state.db.clone(),
        record.id,
        kind,
        request.question,
        answer.clone(),
    );

    Ok(Json(ChatResponse {
        success: true,
        answer,
        mode,
    }))
}
