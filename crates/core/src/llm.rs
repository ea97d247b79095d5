use crate::error::LlmError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// The text-generation capability: role-tagged messages in, generated text out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

/// The embedding capability: text in, fixed-dimension vector out.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError>;

    fn dimensions(&self) -> usize;
}

/// Client for an OpenAI-compatible gateway (LiteLLM proxy or similar) that
/// fronts both the completion and embedding models.
pub struct LiteLlmClient {
    base_url: Url,
    api_key: Option<String>,
    model: String,
    embedding_model: String,
    dimensions: usize,
    client: reqwest::Client,
}

impl LiteLlmClient {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        model: impl Into<String>,
        embedding_model: impl Into<String>,
        dimensions: usize,
    ) -> Result<Self, LlmError> {
        Ok(Self {
            base_url: Url::parse(base_url)?,
            api_key,
            model: model.into(),
            embedding_model: embedding_model.into(),
            dimensions,
            client: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, LlmError> {
        // Joining against "…/v1" would drop the last path segment.
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/{path}"))?)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
    dimensions: usize,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingRow>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingRow {
    embedding: Vec<f32>,
}

#[async_trait]
impl TextGenerator for LiteLlmClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
            temperature: 0.0,
        };

        let response = self
            .authorized(self.client.post(self.endpoint("chat/completions")?))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LlmError::Gateway {
                status: response.status().as_u16(),
                details: response.text().await.unwrap_or_default(),
            });
        }

        let payload: CompletionResponse = response.json().await?;
        payload
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::MissingField("choices[0].message.content"))
    }
}

#[async_trait]
impl Embedder for LiteLlmClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        let request = EmbeddingRequest {
            model: &self.embedding_model,
            input: text,
            dimensions: self.dimensions,
        };

        let response = self
            .authorized(self.client.post(self.endpoint("embeddings")?))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(LlmError::Gateway {
                status: response.status().as_u16(),
                details: response.text().await.unwrap_or_default(),
            });
        }

        let payload: EmbeddingResponse = response.json().await?;
        payload
            .data
            .into_iter()
            .next()
            .map(|row| row.embedding)
            .ok_or(LlmError::MissingField("data[0].embedding"))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
