//! services/api/src/adapters/gemini.rs
//!
//! The primary generation backend: Google's Gemini `generateContent` REST endpoint.
//! It implements the `GenerationService` port from the `core` crate.

use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use pdf_assistant_core::{
    domain::{Attachment, GenerationPayload, Role, SafetyMode, Turn},
    ports::{GenerationService, PortError, PortResult},
    prompts::SYNOPSIS_PROMPT,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const TEMPERATURE: f32 = 0.4;
const MAX_OUTPUT_TOKENS: u32 = 8192;

/// The harm categories switched off in `SafetyMode::Permissive`.
const HARM_CATEGORIES: [&str; 4] = [
    "HARM_CATEGORY_HARASSMENT",
    "HARM_CATEGORY_HATE_SPEECH",
    "HARM_CATEGORY_SEXUALLY_EXPLICIT",
    "HARM_CATEGORY_DANGEROUS_CONTENT",
];

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub timeout: Duration,
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    safety_settings: Vec<SafetySetting>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl Content {
    fn new(role: &str, parts: Vec<Part>) -> Self {
        Self {
            role: Some(role.to_string()),
            parts,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

impl Part {
    fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn inline(attachment: &Attachment) -> Self {
        Self {
            inline_data: Some(InlineData {
                mime_type: attachment.mime_type.clone(),
                data: BASE64.encode(&attachment.data),
            }),
            ..Default::default()
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct GeminiAdapter {
    client: Client,
    config: GeminiConfig,
}

impl GeminiAdapter {
    pub fn new(config: GeminiConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// For testing: point the adapter at a mock server.
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.to_string();
        self
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.base_url.trim_end_matches('/'),
            self.config.model
        )
    }

    fn build_request(history: &[Turn], payload: &GenerationPayload) -> GenerateContentRequest {
        let mut contents = Vec::with_capacity(history.len() + 2);

        // Conversations must open with a user turn; a history seeded with the
        // document synopsis gets the prompt that produced it.
        if history.first().is_some_and(|turn| turn.role == Role::Model) {
            contents.push(Content::new("user", vec![Part::text(SYNOPSIS_PROMPT)]));
        }
        contents.extend(history.iter().map(turn_to_content));

        let mut parts: Vec<Part> = payload.attachments.iter().map(Part::inline).collect();
        parts.push(Part::text(payload.prompt.clone()));
        contents.push(Content::new("user", parts));

        let safety_settings = match payload.safety {
            SafetyMode::Permissive => HARM_CATEGORIES
                .into_iter()
                .map(|category| SafetySetting {
                    category,
                    threshold: "BLOCK_NONE",
                })
                .collect(),
            SafetyMode::ProviderDefault => Vec::new(),
        };

        GenerateContentRequest {
            contents,
            generation_config: GenerationConfig {
                temperature: TEMPERATURE,
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
            safety_settings,
        }
    }

    async fn send(&self, request: &GenerateContentRequest) -> PortResult<String> {
        debug!(
            contents = request.contents.len(),
            model = %self.config.model,
            "sending generateContent request"
        );
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status, body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed Gemini response: {}", e)))?;
        extract_text(parsed)
    }
}

fn turn_to_content(turn: &Turn) -> Content {
    match turn.role {
        Role::User => {
            let mut parts = vec![Part::text(turn.text.clone())];
            if let Some(image) = &turn.image {
                parts.push(Part::inline(image));
            }
            Content::new("user", parts)
        }
        Role::Model => Content::new("model", vec![Part::text(turn.text.clone())]),
    }
}

fn classify_status(status: StatusCode, body: String) -> PortError {
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        PortError::Transport(format!("HTTP {}: {}", status, body))
    } else if status == StatusCode::NOT_FOUND {
        PortError::NotFound(format!("HTTP {}: {}", status, body))
    } else {
        PortError::Rejected(format!("HTTP {}: {}", status, body))
    }
}

fn extract_text(response: GenerateContentResponse) -> PortResult<String> {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        warn!(reason = %reason, "prompt blocked by Gemini");
        return Err(PortError::Rejected(format!("prompt blocked: {}", reason)));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| PortError::Rejected("response has no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(PortError::Rejected(format!(
            "response has no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }
    Ok(text)
}

//=========================================================================================
// `GenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationService for GeminiAdapter {
    async fn generate(&self, payload: &GenerationPayload) -> PortResult<String> {
        self.send(&Self::build_request(&[], payload)).await
    }

    async fn converse(&self, history: &[Turn], payload: &GenerationPayload) -> PortResult<String> {
        self.send(&Self::build_request(history, payload)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const ENDPOINT: &str = "/models/gemini-1.5-flash:generateContent";

    fn adapter(server: &MockServer) -> GeminiAdapter {
        GeminiAdapter::new(GeminiConfig {
            api_key: "test-key".to_string(),
            model: "gemini-1.5-flash".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
        .with_base_url(&server.uri())
    }

    fn payload(safety: SafetyMode) -> GenerationPayload {
        GenerationPayload {
            attachments: vec![Attachment::pdf(vec![1, 2, 3])],
            prompt: "Summarize.".to_string(),
            safety,
        }
    }

    fn answer(text: &str) -> Value {
        json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": text }] },
                "finishReason": "STOP"
            }]
        })
    }

    async fn sent_body(server: &MockServer) -> Value {
        let requests = server.received_requests().await.unwrap();
        requests[0].body_json::<Value>().unwrap()
    }

    #[tokio::test]
    async fn generate_sends_document_prompt_and_settings() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("A synopsis.")))
            .expect(1)
            .mount(&server)
            .await;

        let text = adapter(&server)
            .generate(&payload(SafetyMode::Permissive))
            .await
            .unwrap();
        assert_eq!(text, "A synopsis.");

        let body = sent_body(&server).await;
        let parts = &body["contents"][0]["parts"];
        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(parts[0]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[0]["inlineData"]["data"], "AQID");
        assert_eq!(parts[1]["text"], "Summarize.");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 8192);
        assert_eq!(body["safetySettings"].as_array().unwrap().len(), 4);
        assert_eq!(body["safetySettings"][0]["threshold"], "BLOCK_NONE");
    }

    #[tokio::test]
    async fn provider_default_sends_no_safety_overrides() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("ok")))
            .mount(&server)
            .await;

        adapter(&server)
            .generate(&payload(SafetyMode::ProviderDefault))
            .await
            .unwrap();

        assert!(sent_body(&server).await.get("safetySettings").is_none());
    }

    #[tokio::test]
    async fn converse_replays_history_before_the_question() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(answer("Second answer.")))
            .mount(&server)
            .await;

        let history = vec![
            Turn::model("synopsis"),
            Turn::user("first?", Some(Attachment::new("image/png", vec![7]))),
            Turn::model("first answer"),
        ];
        let text = adapter(&server)
            .converse(&history, &payload(SafetyMode::Permissive))
            .await
            .unwrap();
        assert_eq!(text, "Second answer.");

        let body = sent_body(&server).await;
        let roles: Vec<&str> = body["contents"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, ["user", "model", "user", "model", "user"]);
        assert_eq!(body["contents"][0]["parts"][0]["text"], SYNOPSIS_PROMPT);
        assert_eq!(body["contents"][2]["parts"][1]["inlineData"]["data"], "Bw==");
        assert_eq!(body["contents"][4]["parts"][1]["text"], "Summarize.");
    }

    #[tokio::test]
    async fn http_failures_are_classified() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad payload"))
            .mount(&server)
            .await;

        let gemini = adapter(&server);
        let first = gemini.generate(&payload(SafetyMode::Permissive)).await;
        assert!(matches!(first, Err(PortError::Transport(msg)) if msg.contains("slow down")));
        let second = gemini.generate(&payload(SafetyMode::Permissive)).await;
        assert!(matches!(second, Err(PortError::Rejected(msg)) if msg.contains("bad payload")));
    }

    #[tokio::test]
    async fn blocked_prompt_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [],
                "promptFeedback": { "blockReason": "SAFETY" }
            })))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .generate(&payload(SafetyMode::Permissive))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Rejected(msg) if msg.contains("SAFETY")));
    }

    #[tokio::test]
    async fn empty_candidate_reports_finish_reason() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENDPOINT))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "finishReason": "MAX_TOKENS" }]
            })))
            .mount(&server)
            .await;

        let err = adapter(&server)
            .generate(&payload(SafetyMode::Permissive))
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Rejected(msg) if msg.contains("MAX_TOKENS")));
    }
}
