//! services/api/src/test_support.rs
//!
//! In-memory port implementations and PDF builders shared by the service tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use lopdf::{content::Content, content::Operation, dictionary, Document, Object, Stream};
use pdf_assistant_core::domain::{
    CallerContext, GeneratedContent, GenerationPayload, PdfRecord, QaRecord, Turn,
    CATALOG_DESCRIPTION,
};
use pdf_assistant_core::ports::{
    ContentStore, DatabaseService, GenerationService, PortError, PortResult,
};
use uuid::Uuid;

/// A PDF with one page per entry of `pages`, each showing that text.
pub fn pdf_with_text(pages: &[&str]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

//=========================================================================================
// Content Store
//=========================================================================================

#[derive(Default)]
pub struct MemoryStore {
    /// (bucket, name, data, content type) in insertion order.
    pub objects: Mutex<Vec<(String, String, Vec<u8>, String)>>,
    pub buckets: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn with_objects(objects: Vec<(&str, &str, Vec<u8>)>) -> Self {
        let store = Self::default();
        *store.objects.lock().unwrap() = objects
            .into_iter()
            .map(|(b, n, d)| (b.to_string(), n.to_string(), d, "application/pdf".to_string()))
            .collect();
        store
    }

    pub fn names_in(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(b, ..)| b == bucket)
            .map(|(_, n, ..)| n.clone())
            .collect()
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn list_blobs(&self, bucket: &str) -> PortResult<Vec<String>> {
        Ok(self.names_in(bucket))
    }

    async fn download(&self, bucket: &str, name: &str) -> PortResult<Vec<u8>> {
        self.objects
            .lock()
            .unwrap()
            .iter()
            .find(|(b, n, ..)| b == bucket && n == name)
            .map(|(_, _, data, _)| data.clone())
            .ok_or_else(|| PortError::NotFound(name.to_string()))
    }

    async fn upload(&self, bucket: &str, name: &str, data: Vec<u8>, content_type: &str) -> PortResult<()> {
        let mut objects = self.objects.lock().unwrap();
        objects.retain(|(b, n, ..)| !(b == bucket && n == name));
        objects.push((bucket.to_string(), name.to_string(), data, content_type.to_string()));
        Ok(())
    }

    async fn ensure_bucket(&self, bucket: &str) -> PortResult<()> {
        self.buckets.lock().unwrap().push(bucket.to_string());
        Ok(())
    }
}

//=========================================================================================
// Record Store
//=========================================================================================

#[derive(Default)]
pub struct MemoryDb {
    pub pdfs: Mutex<Vec<PdfRecord>>,
    pub images: Mutex<Vec<(String, String)>>,
    pub qa: Mutex<Vec<QaRecord>>,
    pub generated: Mutex<Vec<GeneratedContent>>,
    pub contexts: Mutex<HashMap<Uuid, CallerContext>>,
    /// Makes Q&A and generated-content writes fail.
    pub fail_output_writes: AtomicBool,
    /// Makes caller-context writes fail.
    pub fail_context_writes: AtomicBool,
    pub failed_writes: AtomicUsize,
}

impl MemoryDb {
    fn refuse_if(&self, flag: &AtomicBool, what: &str) -> PortResult<()> {
        if flag.load(Ordering::SeqCst) {
            self.failed_writes.fetch_add(1, Ordering::SeqCst);
            return Err(PortError::Unexpected(format!("{} write refused", what)));
        }
        Ok(())
    }
}

#[async_trait]
impl DatabaseService for MemoryDb {
    async fn list_pdfs(&self) -> PortResult<Vec<PdfRecord>> {
        Ok(self.pdfs.lock().unwrap().clone())
    }

    async fn get_pdf_by_id(&self, pdf_id: Uuid) -> PortResult<PdfRecord> {
        self.pdfs
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == pdf_id)
            .cloned()
            .ok_or_else(|| PortError::NotFound(format!("PDF {} not found", pdf_id)))
    }

    async fn upsert_pdf(&self, file_name: &str, file_path: &str) -> PortResult<PdfRecord> {
        let mut pdfs = self.pdfs.lock().unwrap();
        if let Some(existing) = pdfs.iter_mut().find(|p| p.file_name == file_name) {
            existing.file_path = file_path.to_string();
            existing.updated_at = Utc::now();
            return Ok(existing.clone());
        }
        let now = Utc::now();
        let record = PdfRecord {
            id: Uuid::new_v4(),
            file_name: file_name.to_string(),
            file_path: file_path.to_string(),
            title: PdfRecord::title_for(file_name).to_string(),
            description: CATALOG_DESCRIPTION.to_string(),
            created_at: now,
            updated_at: now,
        };
        pdfs.push(record.clone());
        Ok(record)
    }

    async fn save_image_record(&self, file_name: &str, file_path: &str) -> PortResult<()> {
        self.images
            .lock()
            .unwrap()
            .push((file_name.to_string(), file_path.to_string()));
        Ok(())
    }

    async fn save_qa_record(&self, record: QaRecord) -> PortResult<()> {
        self.refuse_if(&self.fail_output_writes, "qa")?;
        self.qa.lock().unwrap().push(record);
        Ok(())
    }

    async fn save_generated_content(&self, record: GeneratedContent) -> PortResult<()> {
        self.refuse_if(&self.fail_output_writes, "generated content")?;
        self.generated.lock().unwrap().push(record);
        Ok(())
    }

    async fn get_caller_context(&self, context_id: Uuid) -> PortResult<Option<CallerContext>> {
        Ok(self.contexts.lock().unwrap().get(&context_id).cloned())
    }

    async fn save_caller_context(&self, context: &CallerContext) -> PortResult<()> {
        self.refuse_if(&self.fail_context_writes, "caller context")?;
        self.contexts
            .lock()
            .unwrap()
            .insert(context.id, context.clone());
        Ok(())
    }
}

//=========================================================================================
// Generation Backend
//=========================================================================================

/// Answers every call with a short echo of the prompt's first line.
#[derive(Default)]
pub struct EchoGenerator {
    pub calls: Mutex<Vec<(usize, GenerationPayload)>>,
}

impl EchoGenerator {
    fn reply(&self, history_len: usize, payload: &GenerationPayload) -> PortResult<String> {
        self.calls
            .lock()
            .unwrap()
            .push((history_len, payload.clone()));
        let first_line = payload.prompt.lines().next().unwrap_or_default();
        Ok(format!("echo: {}", first_line))
    }
}

#[async_trait]
impl GenerationService for EchoGenerator {
    async fn generate(&self, payload: &GenerationPayload) -> PortResult<String> {
        self.reply(0, payload)
    }

    async fn converse(&self, history: &[Turn], payload: &GenerationPayload) -> PortResult<String> {
        self.reply(history.len(), payload)
    }
}
