//! Construction of the vendor service handles the adapter talks to.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use palm2_llm::auth::{ServiceAccountKey, ServiceAccountTokenProvider, TokenProvider};
use palm2_llm::http::{VertexChatModel, VertexEmbeddingModel, VertexEndpoint};
use palm2_llm::provider::{ChatService, EmbeddingService, LlmError};

use crate::config::{AdapterConfig, ConfigError};
use crate::error::AdapterError;

/// Builds chat and embedding handles on demand. The adapter calls each
/// method at most once per instance.
pub trait ServiceFactory: Send + Sync {
    fn chat_model(&self) -> Result<Arc<dyn ChatService>, LlmError>;

    fn embedding_model(&self) -> Result<Arc<dyn EmbeddingService>, LlmError>;
}

/// Vertex AI factory: one shared HTTP client and token provider for both models.
pub struct VertexServices {
    chat_model: String,
    embedding_model: String,
    endpoint: VertexEndpoint,
    client: reqwest::Client,
    tokens: Arc<dyn TokenProvider>,
}

impl VertexServices {
    /// Reads the service account key at `key_path` once.
    pub fn from_config(cfg: &AdapterConfig) -> Result<Self, AdapterError> {
        let key = ServiceAccountKey::from_file(&cfg.key_path)?;
        let project = cfg.project_id.clone()
            .or_else(|| key.project_id.clone())
            .ok_or_else(|| ConfigError::Invalid {
                key: "project_id",
                reason: "not configured and missing from key file".into(),
            })?;
        let client = reqwest::Client::new();
        let tokens = Arc::new(ServiceAccountTokenProvider::new(key, client.clone())?);
        Ok(Self::with_tokens(cfg, project, client, tokens))
    }

    /// Skip key-file auth and use the given token source.
    pub fn with_tokens(
        cfg: &AdapterConfig,
        project: String,
        client: reqwest::Client,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        Self {
            chat_model: cfg.model.clone(),
            embedding_model: cfg.embedding_model.clone(),
            endpoint: VertexEndpoint::new(project, cfg.location.clone(), cfg.base_url.clone()),
            client,
            tokens,
        }
    }

    pub fn endpoint(&self) -> &VertexEndpoint {
        &self.endpoint
    }
}

impl ServiceFactory for VertexServices {
    fn chat_model(&self) -> Result<Arc<dyn ChatService>, LlmError> {
        tracing::debug!(model = %self.chat_model, "building chat model");
        Ok(Arc::new(VertexChatModel::new(
            self.chat_model.clone(),
            self.endpoint.clone(),
            self.client.clone(),
            self.tokens.clone(),
        )))
    }

    fn embedding_model(&self) -> Result<Arc<dyn EmbeddingService>, LlmError> {
        tracing::debug!(model = %self.embedding_model, "building embedding model");
        Ok(Arc::new(VertexEmbeddingModel::new(
            self.embedding_model.clone(),
            self.endpoint.clone(),
            self.client.clone(),
            self.tokens.clone(),
        )))
    }
}

/// Hands out pre-built handles and counts how often each was requested.
/// For hosts that bring their own clients, and for tests.
pub struct StaticServices {
    chat: Arc<dyn ChatService>,
    embedding: Arc<dyn EmbeddingService>,
    chat_builds: AtomicUsize,
    embedding_builds: AtomicUsize,
}

impl StaticServices {
    pub fn new(chat: Arc<dyn ChatService>, embedding: Arc<dyn EmbeddingService>) -> Self {
        Self {
            chat,
            embedding,
            chat_builds: AtomicUsize::new(0),
            embedding_builds: AtomicUsize::new(0),
        }
    }

    pub fn chat_builds(&self) -> usize {
        self.chat_builds.load(Ordering::SeqCst)
    }

    pub fn embedding_builds(&self) -> usize {
        self.embedding_builds.load(Ordering::SeqCst)
    }
}

impl ServiceFactory for StaticServices {
    fn chat_model(&self) -> Result<Arc<dyn ChatService>, LlmError> {
        self.chat_builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.chat.clone())
    }

    fn embedding_model(&self) -> Result<Arc<dyn EmbeddingService>, LlmError> {
        self.embedding_builds.fetch_add(1, Ordering::SeqCst);
        Ok(self.embedding.clone())
    }
}
