use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("API key rejected")]
    Unauthorized,

    #[error("API returned error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("API request failed: {0}")]
    Request(String),

    #[error("Malformed response: {0}")]
    Malformed(String),

    #[error("Response contained no message content")]
    EmptyContent,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ContentPart {
    Text {
        #[serde(rename = "type")]
        content_type: String,
        text: String,
    },
    ImageUrl {
        #[serde(rename = "type")]
        content_type: String,
        image_url: ImageData,
    },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ImageData {
    pub url: String,
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    /// User message carrying an instruction and an image data URL.
    pub fn user_with_image(text: impl Into<String>, data_url: String) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    content_type: "text".to_string(),
                    text: text.into(),
                },
                ContentPart::ImageUrl {
                    content_type: "image_url".to_string(),
                    image_url: ImageData { url: data_url },
                },
            ]),
        }
    }
}

/// Provider-independent description of one completion call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub max_tokens: Option<u32>,
    pub json_mode: bool,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Chat-completion capability shared by translation, vision and the
/// generative nutrient tier.
#[async_trait::async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the trimmed text content of the first choice.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError>;

    fn model(&self) -> &str;
}

/// OpenAI-compatible chat-completions client (OpenRouter by default).
pub struct OpenRouterService {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenRouterService {
    pub fn new(api_key: String, model: String) -> Self {
        Self::with_base_url(api_key, model, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn build_body(&self, request: &CompletionRequest) -> serde_json::Result<serde_json::Value> {
        let body = ChatRequest {
            model: &self.model,
            messages: &request.messages,
            max_tokens: request.max_tokens,
            response_format: request.json_mode.then(|| ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        };
        serde_json::to_value(&body)
    }
}

/// Pull the first choice's message text out of a raw response body.
pub fn extract_content(body: &str) -> Result<String, CompletionError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| CompletionError::Malformed(e.to_string()))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message)
        .and_then(|message| message.content)
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
        .ok_or(CompletionError::EmptyContent)
}

#[async_trait::async_trait]
impl CompletionClient for OpenRouterService {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionError> {
        let body = self
            .build_body(&request)
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        log::info!("🤖 Sending completion request with model: {}", self.model);
        log::debug!("📤 Request payload size: {} bytes", body.to_string().len());

        let response = self
            .client
            .post(self.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("HTTP-Referer", "https://github.com/nutrition-tracker")
            .header("X-Title", "Nutrition Tracker")
            .json(&body)
            .send()
            .await
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        let status = response.status();
        log::debug!("📥 Completion response status: {}", status);

        let text = response
            .text()
            .await
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        if status == reqwest::StatusCode::UNAUTHORIZED {
            log::error!("❌ Completion API rejected the API key");
            return Err(CompletionError::Unauthorized);
        }

        if !status.is_success() {
            log::error!("❌ Completion API error ({}): {}", status, text);
            return Err(CompletionError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let content = extract_content(&text)?;
        log::debug!("💬 Completion content: {}", content);
        Ok(content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
