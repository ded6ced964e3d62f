//! HTTP clients for Vertex AI PaLM 2 models.
//!
//! Both chat (`chat-bison`) and embedding (`textembedding-gecko`) models
//! are served by the same `:predict` endpoint shape; only the instance and
//! prediction bodies differ.

use crate::auth::TokenProvider;
use crate::provider::{
    Author, ChatRequest, ChatResponse, ChatService, EmbeddingService, LlmError, ServiceFuture,
    TextEmbedding,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const DEFAULT_CHAT_MODEL: &str = "chat-bison@001";
pub const DEFAULT_EMBEDDING_MODEL: &str = "textembedding-gecko@001";
pub const DEFAULT_LOCATION: &str = "us-central1";

/// Project + region a model is served from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VertexEndpoint {
    pub project: String,
    pub location: String,
    base_url: String,
}

impl VertexEndpoint {
    /// Build for the given project and region, with an optional base URL override.
    pub fn new(project: String, location: String, base_url: Option<String>) -> Self {
        let base = base_url
            .unwrap_or_else(|| format!("https://{location}-aiplatform.googleapis.com/v1"));
        Self {
            project,
            location,
            base_url: base.trim_end_matches('/').to_owned(),
        }
    }

    pub fn predict_url(&self, model: &str) -> String {
        format!(
            "{}/projects/{}/locations/{}/publishers/google/models/{}:predict",
            self.base_url, self.project, self.location, model
        )
    }
}

// ── Chat request/response types ──

#[derive(Serialize)]
struct ChatPredictRequest {
    instances: Vec<ChatInstance>,
    parameters: ChatParameters,
}

#[derive(Serialize)]
struct ChatInstance {
    context: String,
    examples: Vec<serde_json::Value>,
    messages: Vec<WireMessage>,
}

#[derive(Serialize)]
struct WireMessage {
    author: Author,
    content: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatParameters {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct ChatPredictResponse {
    #[serde(default)]
    predictions: Vec<ChatPrediction>,
}

#[derive(Deserialize)]
struct ChatPrediction {
    #[serde(default)]
    candidates: Vec<ChatCandidate>,
}

#[derive(Deserialize)]
struct ChatCandidate {
    #[serde(default)]
    content: String,
}

// ── Embedding request/response types ──

#[derive(Serialize)]
struct EmbedPredictRequest {
    instances: Vec<EmbedInstance>,
}

#[derive(Serialize)]
struct EmbedInstance {
    content: String,
}

#[derive(Deserialize)]
struct EmbedPredictResponse {
    #[serde(default)]
    predictions: Vec<EmbedPrediction>,
}

#[derive(Deserialize)]
struct EmbedPrediction {
    embeddings: EmbedValues,
}

#[derive(Deserialize)]
struct EmbedValues {
    values: Vec<f64>,
    statistics: Option<EmbedStatistics>,
}

#[derive(Deserialize)]
struct EmbedStatistics {
    token_count: Option<f64>,
    #[serde(default)]
    truncated: bool,
}

/// Map a non-success status to the error taxonomy callers match on.
fn check_error(status: reqwest::StatusCode, body: String) -> LlmError {
    match status.as_u16() {
        401 | 403 => LlmError::Authentication(format!("{status}: {body}")),
        429 => LlmError::QuotaExceeded(format!("{status}: {body}")),
        _ => LlmError::RequestFailed(format!("{status}: {body}")),
    }
}

/// Shared plumbing: authenticated POST of a predict body, decoded as `R`.
struct PredictClient {
    endpoint: VertexEndpoint,
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl PredictClient {
    async fn predict<B: Serialize, R: DeserializeOwned>(&self, model: &str, body: &B) -> Result<R, LlmError> {
        let token = self.tokens.token().await?;
        let resp = self.client
            .post(self.endpoint.predict_url(model))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            tracing::warn!(model, %status, "vertex predict failed");
            return Err(check_error(status, text));
        }

        resp.json().await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))
    }
}

/// Vertex AI chat model (`chat-bison` family).
pub struct VertexChatModel {
    model: String,
    inner: PredictClient,
}

impl VertexChatModel {
    pub fn new(
        model: String,
        endpoint: VertexEndpoint,
        client: reqwest::Client,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self { model, inner: PredictClient { endpoint, client, tokens } }
    }

    fn build_body(request: ChatRequest) -> ChatPredictRequest {
        let mut messages: Vec<WireMessage> = request.history.into_iter().map(|t| WireMessage {
            author: t.author,
            content: t.content,
        }).collect();
        messages.push(WireMessage { author: Author::User, content: request.message });

        ChatPredictRequest {
            instances: vec![ChatInstance {
                context: request.context,
                examples: vec![],
                messages,
            }],
            parameters: ChatParameters {
                temperature: request.temperature,
                max_output_tokens: request.max_output_tokens,
            },
        }
    }

    async fn send(&self, request: ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = Self::build_body(request);
        let api: ChatPredictResponse = self.inner.predict(&self.model, &body).await?;

        let text = api.predictions.into_iter().next()
            .and_then(|p| p.candidates.into_iter().next())
            .map(|c| c.content)
            .ok_or_else(|| LlmError::InvalidResponse("no chat candidates returned".into()))?;
        Ok(ChatResponse { text })
    }
}

impl ChatService for VertexChatModel {
    fn name(&self) -> &str {
        &self.model
    }

    fn predict(&self, request: ChatRequest) -> ServiceFuture<'_, ChatResponse> {
        Box::pin(self.send(request))
    }
}

/// Vertex AI text embedding model (`textembedding-gecko` family).
pub struct VertexEmbeddingModel {
    model: String,
    inner: PredictClient,
}

impl VertexEmbeddingModel {
    pub fn new(
        model: String,
        endpoint: VertexEndpoint,
        client: reqwest::Client,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self { model, inner: PredictClient { endpoint, client, tokens } }
    }

    async fn get_embeddings(&self, texts: Vec<String>) -> Result<Vec<TextEmbedding>, LlmError> {
        let body = EmbedPredictRequest {
            instances: texts.into_iter().map(|content| EmbedInstance { content }).collect(),
        };
        let api: EmbedPredictResponse = self.inner.predict(&self.model, &body).await?;

        Ok(api.predictions.into_iter().map(|p| {
            let stats = p.embeddings.statistics;
            TextEmbedding {
                values: p.embeddings.values,
                token_count: stats.as_ref().and_then(|s| s.token_count).map(|n| n as u32),
                truncated: stats.is_some_and(|s| s.truncated),
            }
        }).collect())
    }
}

impl EmbeddingService for VertexEmbeddingModel {
    fn name(&self) -> &str {
        &self.model
    }

    fn embed(&self, texts: Vec<String>) -> ServiceFuture<'_, Vec<TextEmbedding>> {
        Box::pin(self.get_embeddings(texts))
    }
}
