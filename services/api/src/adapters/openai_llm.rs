//! services/api/src/adapters/openai_llm.rs
//!
//! An alternative generation backend for any OpenAI-compatible chat endpoint.
//! It implements the `GenerationService` port from the `core` crate.
//!
//! Chat completions take no inline PDFs, so document attachments are sent as
//! their extracted page text; image attachments travel as data URLs.

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs, ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use pdf_assistant_core::{
    domain::{Attachment, GenerationPayload, Role, Turn, PDF_MIME_TYPE},
    pdf::parse_pdf,
    ports::{GenerationService, PortError, PortResult},
};

const SYSTEM_INSTRUCTIONS: &str = "You are a study assistant. Answer using the PDF document provided by the user, \
including what its pages and images show.";

const TEMPERATURE: f32 = 0.4;
const MAX_COMPLETION_TOKENS: u32 = 8192;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

#[derive(Clone)]
pub struct OpenAiGenerationAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    timeout: Duration,
}

impl OpenAiGenerationAdapter {
    pub fn new(client: Client<OpenAIConfig>, model: String, timeout: Duration) -> Self {
        Self {
            client,
            model,
            timeout,
        }
    }

    async fn complete(&self, messages: Vec<ChatCompletionRequestMessage>) -> PortResult<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(TEMPERATURE)
            .max_completion_tokens(MAX_COMPLETION_TOKENS)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| PortError::Transport(format!("no response within {:?}", self.timeout)))?
            .map_err(map_openai_error)?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| PortError::Rejected("chat completion contained no text content".to_string()))
    }
}

fn map_openai_error(e: OpenAIError) -> PortError {
    match e {
        OpenAIError::Reqwest(inner) => PortError::Transport(inner.to_string()),
        OpenAIError::ApiError(api) => PortError::Rejected(api.to_string()),
        other => PortError::Unexpected(other.to_string()),
    }
}

//=========================================================================================
// Message Building
//=========================================================================================

fn text_part(text: String) -> PortResult<ChatCompletionRequestUserMessageContentPart> {
    let part = ChatCompletionRequestMessageContentPartTextArgs::default()
        .text(text)
        .build()
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
    Ok(ChatCompletionRequestUserMessageContentPart::Text(part))
}

fn attachment_part(attachment: &Attachment) -> PortResult<ChatCompletionRequestUserMessageContentPart> {
    if attachment.mime_type == PDF_MIME_TYPE {
        let parsed = parse_pdf(&attachment.data)
            .map_err(|e| PortError::Rejected(format!("unreadable PDF attachment: {}", e)))?;
        return text_part(format!("PDF DOCUMENT:{}", parsed.full_text));
    }

    let url = format!(
        "data:{};base64,{}",
        attachment.mime_type,
        BASE64.encode(&attachment.data)
    );
    let image_url = ImageUrlArgs::default()
        .url(url)
        .build()
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
    let part = ChatCompletionRequestMessageContentPartImageArgs::default()
        .image_url(image_url)
        .build()
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
    Ok(ChatCompletionRequestUserMessageContentPart::ImageUrl(part))
}

fn user_message(
    parts: Vec<ChatCompletionRequestUserMessageContentPart>,
) -> PortResult<ChatCompletionRequestMessage> {
    Ok(ChatCompletionRequestUserMessageArgs::default()
        .content(parts)
        .build()
        .map_err(|e| PortError::Unexpected(e.to_string()))?
        .into())
}

fn turn_message(turn: &Turn) -> PortResult<ChatCompletionRequestMessage> {
    match turn.role {
        Role::User => {
            let mut parts = vec![text_part(turn.text.clone())?];
            if let Some(image) = &turn.image {
                parts.push(attachment_part(image)?);
            }
            user_message(parts)
        }
        Role::Model => Ok(ChatCompletionRequestAssistantMessageArgs::default()
            .content(turn.text.clone())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into()),
    }
}

fn build_messages(
    history: &[Turn],
    payload: &GenerationPayload,
) -> PortResult<Vec<ChatCompletionRequestMessage>> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(
        ChatCompletionRequestSystemMessageArgs::default()
            .content(SYSTEM_INSTRUCTIONS)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?
            .into(),
    );
    for turn in history {
        messages.push(turn_message(turn)?);
    }

    let mut parts = payload
        .attachments
        .iter()
        .map(attachment_part)
        .collect::<PortResult<Vec<_>>>()?;
    parts.push(text_part(payload.prompt.clone())?);
    messages.push(user_message(parts)?);
    Ok(messages)
}

//=========================================================================================
// `GenerationService` Trait Implementation
//=========================================================================================

#[async_trait]
impl GenerationService for OpenAiGenerationAdapter {
    async fn generate(&self, payload: &GenerationPayload) -> PortResult<String> {
        self.complete(build_messages(&[], payload)?).await
    }

    async fn converse(&self, history: &[Turn], payload: &GenerationPayload) -> PortResult<String> {
        self.complete(build_messages(history, payload)?).await
    }
}
