//! Language model collaborator and its Messages-API client.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use argo_core::config::ModelConfig;
use argo_core::types::Role;

use crate::error::ChatError;

/// One content block of a multi-part message.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentPart {
    Text { text: String },
    Document { source: DocumentSource },
}

/// Inline base64 document payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentSource {
    #[serde(rename = "type")]
    pub encoding: String,
    pub media_type: String,
    pub data: String,
}

impl DocumentSource {
    pub fn base64(media_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            encoding: "base64".to_string(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }
}

/// Message content: a plain string or a list of parts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageContent {
    /// Concatenated text of all text parts.
    pub fn text(&self) -> String {
        match self {
            Self::Text(t) => t.clone(),
            Self::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Document { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ModelMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }
}

/// A single stateless completion request.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelRequest {
    pub system: Option<String>,
    pub messages: Vec<ModelMessage>,
    pub max_tokens: u32,
}

/// Hosted language model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Run one completion and return the first text block.
    async fn complete(&self, request: &ModelRequest) -> Result<String, ChatError>;
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: &'a [ModelMessage],
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ResponseBlock>,
}

#[derive(Deserialize)]
struct ResponseBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model_id: String,
    api_version: String,
}

impl AnthropicClient {
    /// Build from config, reading the API key from the configured
    /// environment variable.
    pub fn from_config(config: &ModelConfig) -> Result<Self, ChatError> {
        let api_key = config.api_key()?;
        Self::new(config, api_key)
    }

    pub fn new(config: &ModelConfig, api_key: String) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ChatError::Configuration(format!("HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model_id: config.model_id.clone(),
            api_version: config.api_version.clone(),
        })
    }
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn complete(&self, request: &ModelRequest) -> Result<String, ChatError> {
        let body = MessagesRequest {
            model: &self.model_id,
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: &request.messages,
        };

        debug!(
            model = %self.model_id,
            messages = request.messages.len(),
            max_tokens = request.max_tokens,
            "model request"
        );

        let resp = self
            .http
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Model(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(ChatError::Model(format!("status {}: {}", status, text)));
        }

        let data: MessagesResponse = resp
            .json()
            .await
            .map_err(|e| ChatError::Model(format!("invalid response body: {}", e)))?;

        data.content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or_else(|| ChatError::Model("response has no text content".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_content_serializes_as_string() {
        let msg = ModelMessage::user("hello");
        let v = serde_json::to_value(&msg).unwrap();
        assert_eq!(v["role"], "user");
        assert_eq!(v["content"], "hello");
    }

    #[test]
    fn test_document_part_wire_format() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text {
                text: "Analyze this document.".into(),
            },
            ContentPart::Document {
                source: DocumentSource::base64("application/pdf", "JVBERi0="),
            },
        ]);
        let v = serde_json::to_value(&content).unwrap();
        assert_eq!(v[0]["type"], "text");
        assert_eq!(v[1]["type"], "document");
        assert_eq!(v[1]["source"]["type"], "base64");
        assert_eq!(v[1]["source"]["media_type"], "application/pdf");
        assert_eq!(v[1]["source"]["data"], "JVBERi0=");
    }

    #[test]
    fn test_content_text_skips_documents() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text { text: "a".into() },
            ContentPart::Document {
                source: DocumentSource::base64("application/pdf", "x"),
            },
        ]);
        assert_eq!(content.text(), "a");
    }

    #[test]
    fn test_request_omits_missing_system() {
        let messages = vec![ModelMessage::user("hi")];
        let body = MessagesRequest {
            model: "m",
            max_tokens: 100,
            system: None,
            messages: &messages,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert!(v.get("system").is_none());
        assert_eq!(v["max_tokens"], 100);
    }

    #[test]
    fn test_response_first_block() {
        let raw = r#"{"id":"msg_1","content":[{"type":"text","text":"Hi there"}],"stop_reason":"end_turn"}"#;
        let resp: MessagesResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(resp.content[0].text.as_deref(), Some("Hi there"));
    }
}
