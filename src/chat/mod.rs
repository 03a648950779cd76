// Remote chat client for the Ark OpenAI-compatible API
// Also home of the message model shared by conversation memory and the
// orchestration layer.


use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::{RagError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One content block of a multimodal message, in the OpenAI wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// Message content is either plain text or a list of multimodal parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    #[inline]
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    #[inline]
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    #[inline]
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }

    #[inline]
    pub fn user_parts(parts: Vec<ContentPart>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(parts),
        }
    }
}

/// Seam for the remote chat model so the orchestration layer can be
/// exercised without a network.
pub trait ChatBackend: Send + Sync {
    /// Send the full working message sequence and return the reply text.
    fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Like [`complete`](Self::complete) but constrained to the given JSON
    /// schema; the reply is decoded and validated to parse as JSON.
    fn complete_structured(
        &self,
        messages: &[ChatMessage],
        name: &str,
        schema: &Value,
    ) -> Result<Value>;
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: JsonSchemaFormat<'a>,
}

#[derive(Serialize)]
struct JsonSchemaFormat<'a> {
    name: &'a str,
    schema: &'a Value,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Blocking client for the remote chat completion endpoint.
///
/// No explicit timeout is configured here; the chat call rides on the
/// transport default, unlike the embedding client's fixed deadline.
#[derive(Debug, Clone)]
pub struct ArkChatClient {
    agent: ureq::Agent,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl ArkChatClient {
    #[inline]
    pub fn new(config: &Config) -> Self {
        let endpoint = format!(
            "{}/chat/completions",
            config.base_url.trim_end_matches('/')
        );
        Self {
            agent: ureq::Agent::config_builder().build().into(),
            endpoint,
            model: config.chat_model.clone(),
            api_key: config.api_key.clone(),
        }
    }

    fn credential(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| RagError::Config("Missing ARK_API_KEY for chat".to_string()))
    }

    fn invoke(&self, request: &ChatCompletionRequest<'_>) -> Result<String> {
        let api_key = self.credential()?;
        let body = serde_json::to_string(request)
            .map_err(|err| RagError::Format(format!("failed to serialize chat request: {err}")))?;

        debug!(
            "Chat completion request to {} (model {}, {} messages)",
            self.endpoint,
            self.model,
            request.messages.len()
        );

        let raw = self
            .agent
            .post(self.endpoint.as_str())
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {api_key}"))
            .send(&body)
            .and_then(|mut resp| resp.body_mut().read_to_string())
            .map_err(|err| RagError::Transport(format!("chat completion failed: {err}")))?;

        let response: ChatCompletionResponse = serde_json::from_str(&raw)
            .map_err(|_| RagError::Format(format!("unexpected chat response: {raw}")))?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::Format("chat response contained no choices".to_string()))
    }
}

impl ChatBackend for ArkChatClient {
    #[inline]
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.invoke(&ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: 0.0,
            response_format: None,
        })
    }

    #[inline]
    fn complete_structured(
        &self,
        messages: &[ChatMessage],
        name: &str,
        schema: &Value,
    ) -> Result<Value> {
        let content = self.invoke(&ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: 0.0,
            response_format: Some(ResponseFormat {
                kind: "json_schema",
                json_schema: JsonSchemaFormat { name, schema },
            }),
        })?;

        serde_json::from_str(&content).map_err(|err| {
            RagError::Format(format!("structured reply is not valid JSON ({err}): {content}"))
        })
    }
}
