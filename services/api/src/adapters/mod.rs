pub mod db;
pub mod gemini;
pub mod openai_llm;
pub mod storage;

pub use db::DbAdapter;
pub use gemini::{GeminiAdapter, GeminiConfig};
pub use openai_llm::OpenAiGenerationAdapter;
pub use storage::{provision_buckets, S3ContentStore};
