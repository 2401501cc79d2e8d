//! Chat-completion wire types and the HTTP transport.

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::AiConfig;
use crate::AiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_with_image(text: impl Into<String>, image_url: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Parts(vec![
                ContentPart::Text { text: text.into() },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_url.into(),
                    },
                },
            ]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: AssistantMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssistantMessage {
    #[serde(default)]
    pub content: Option<String>,
}

impl ChatResponse {
    /// Text of the first choice, if any.
    pub fn content(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

/// Sends one chat-completion request.
#[async_trait]
pub trait CompletionTransport: Send + Sync {
    async fn complete(&self, api_key: &str, request: &ChatRequest)
        -> Result<ChatResponse, AiError>;
}

#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(config: &AiConfig) -> Result<Self, AiError> {
        let mut endpoint =
            Url::parse(&config.base_url).map_err(|e| AiError::InvalidUrl(e.to_string()))?;
        endpoint
            .path_segments_mut()
            .map_err(|_| AiError::InvalidUrl(config.base_url.clone()))?
            .pop_if_empty()
            .extend(["chat", "completions"]);
        let http = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl CompletionTransport for HttpTransport {
    async fn complete(
        &self,
        api_key: &str,
        request: &ChatRequest,
    ) -> Result<ChatResponse, AiError> {
        debug!(
            model = %request.model,
            messages = request.messages.len(),
            "chat completion request"
        );
        let resp = self
            .http
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(request)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AiError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vision_message_serializes_as_parts() {
        let msg = ChatMessage::user_with_image("find tickers", "data:image/png;base64,AAA");
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "role": "user",
                "content": [
                    {"type": "text", "text": "find tickers"},
                    {"type": "image_url", "image_url": {"url": "data:image/png;base64,AAA"}}
                ]
            })
        );
    }

    #[test]
    fn plain_message_serializes_as_string() {
        let value = serde_json::to_value(ChatMessage::system("be terse")).unwrap();
        assert_eq!(value, json!({"role": "system", "content": "be terse"}));
    }

    #[test]
    fn response_content_tolerates_missing_fields() {
        let full: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":"MU, AAPL"}}]}"#).unwrap();
        assert_eq!(full.content(), Some("MU, AAPL"));
        let empty: ChatResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert_eq!(empty.content(), None);
        let null: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert_eq!(null.content(), None);
    }

    #[test]
    fn endpoint_appends_completion_path() {
        let t = HttpTransport::new(&AiConfig::default()).unwrap();
        assert_eq!(
            t.endpoint().as_str(),
            "https://api.perplexity.ai/chat/completions"
        );
        let t = HttpTransport::new(&AiConfig::default().with_base_url("http://localhost:9/v1/"))
            .unwrap();
        assert_eq!(t.endpoint().as_str(), "http://localhost:9/v1/chat/completions");
    }
}
