//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `DatabaseService` port from the `core` crate. It handles all interactions
//! with the PostgreSQL record store using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pdf_assistant_core::domain::{
    CallerContext, GeneratedContent, PdfRecord, QaRecord, Turn, CATALOG_DESCRIPTION,
};
use pdf_assistant_core::ports::{DatabaseService, PortError, PortResult};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `DatabaseService` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the record-store tables if they are missing.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct PdfRow {
    id: Uuid,
    file_name: String,
    file_path: String,
    title: String,
    description: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl PdfRow {
    fn to_domain(self) -> PdfRecord {
        PdfRecord {
            id: self.id,
            file_name: self.file_name,
            file_path: self.file_path,
            title: self.title,
            description: self.description,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct CallerContextRow {
    id: Uuid,
    pdf_id: Uuid,
    title: String,
    history: Json<Vec<Turn>>,
}
impl CallerContextRow {
    fn to_domain(self) -> CallerContext {
        CallerContext {
            id: self.id,
            pdf_id: self.pdf_id,
            title: self.title,
            history: self.history.0,
        }
    }
}

const PDF_COLUMNS: &str = "id, file_name, file_path, title, description, created_at, updated_at";

//=========================================================================================
// `DatabaseService` Trait Implementation
//=========================================================================================

#[async_trait]
impl DatabaseService for DbAdapter {
    async fn list_pdfs(&self) -> PortResult<Vec<PdfRecord>> {
        let rows: Vec<PdfRow> = sqlx::query_as(&format!(
            "SELECT {} FROM pdfs ORDER BY created_at DESC",
            PDF_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(rows.into_iter().map(PdfRow::to_domain).collect())
    }

    async fn get_pdf_by_id(&self, pdf_id: Uuid) -> PortResult<PdfRecord> {
        let row: PdfRow = sqlx::query_as(&format!("SELECT {} FROM pdfs WHERE id = $1", PDF_COLUMNS))
            .bind(pdf_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => PortError::NotFound(format!("PDF {} not found", pdf_id)),
                _ => unexpected(e),
            })?;
        Ok(row.to_domain())
    }

    async fn upsert_pdf(&self, file_name: &str, file_path: &str) -> PortResult<PdfRecord> {
        let row: PdfRow = sqlx::query_as(&format!(
            "INSERT INTO pdfs (id, file_name, file_path, title, description) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (file_name) DO UPDATE SET file_path = EXCLUDED.file_path, updated_at = now() \
             RETURNING {}",
            PDF_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(file_name)
        .bind(file_path)
        .bind(PdfRecord::title_for(file_name))
        .bind(CATALOG_DESCRIPTION)
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(row.to_domain())
    }

    async fn save_image_record(&self, file_name: &str, file_path: &str) -> PortResult<()> {
        sqlx::query("INSERT INTO images (id, file_name, file_path) VALUES ($1, $2, $3)")
            .bind(Uuid::new_v4())
            .bind(file_name)
            .bind(file_path)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn save_qa_record(&self, record: QaRecord) -> PortResult<()> {
        sqlx::query("INSERT INTO qa_sessions (id, pdf_id, question, answer) VALUES ($1, $2, $3, $4)")
            .bind(record.id)
            .bind(record.pdf_id)
            .bind(record.question)
            .bind(record.answer)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn save_generated_content(&self, record: GeneratedContent) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO generated_content (id, pdf_id, content_type, content) VALUES ($1, $2, $3, $4)",
        )
        .bind(record.id)
        .bind(record.pdf_id)
        .bind(record.kind.as_str())
        .bind(record.content)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_caller_context(&self, context_id: Uuid) -> PortResult<Option<CallerContext>> {
        let row: Option<CallerContextRow> =
            sqlx::query_as("SELECT id, pdf_id, title, history FROM caller_contexts WHERE id = $1")
                .bind(context_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(unexpected)?;
        Ok(row.map(CallerContextRow::to_domain))
    }

    async fn save_caller_context(&self, context: &CallerContext) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO caller_contexts (id, pdf_id, title, history) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET pdf_id = EXCLUDED.pdf_id, title = EXCLUDED.title, \
             history = EXCLUDED.history, updated_at = now()",
        )
        .bind(context.id)
        .bind(context.pdf_id)
        .bind(&context.title)
        .bind(Json(&context.history))
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }
}
