use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Boxed future returned by service trait methods.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, LlmError>> + Send + 'a>>;

/// Author of a chat turn, in the vendor's encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Bot,
}

/// A single message in a chat history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub author: Author,
    pub content: String,
}

impl ChatTurn {
    pub fn new(author: Author, content: impl Into<String>) -> Self {
        Self { author, content: content.into() }
    }
}

/// One chat prediction request: seeded context + history + the new message.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub context: String,
    pub history: Vec<ChatTurn>,
    pub message: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// Chat prediction response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub text: String,
}

/// One embedding vector plus the statistics the service reports for it.
#[derive(Debug, Clone, PartialEq)]
pub struct TextEmbedding {
    pub values: Vec<f64>,
    pub token_count: Option<u32>,
    pub truncated: bool,
}

impl TextEmbedding {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, token_count: None, truncated: false }
    }
}

/// Error type for vendor service operations.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("authentication failed: {0}")]
    Authentication(String),
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),
    #[error("request failed: {0}")]
    RequestFailed(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Chat completion backend (e.g. Vertex AI `chat-bison`).
pub trait ChatService: Send + Sync {
    fn name(&self) -> &str;

    fn predict(&self, request: ChatRequest) -> ServiceFuture<'_, ChatResponse>;
}

/// Text embedding backend (e.g. Vertex AI `textembedding-gecko`).
///
/// Implementations must return exactly one embedding per input text, in input order.
pub trait EmbeddingService: Send + Sync {
    fn name(&self) -> &str;

    fn embed(&self, texts: Vec<String>) -> ServiceFuture<'_, Vec<TextEmbedding>>;
}

/// A chat conversation against a [`ChatService`].
///
/// Each successful [`send_message`](Self::send_message) appends the sent
/// message and the reply to the session history.
pub struct ChatSession<'a> {
    service: &'a dyn ChatService,
    context: String,
    history: Vec<ChatTurn>,
    max_output_tokens: u32,
    temperature: f32,
}

impl<'a> ChatSession<'a> {
    pub fn start(
        service: &'a dyn ChatService,
        context: impl Into<String>,
        history: Vec<ChatTurn>,
        max_output_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            service,
            context: context.into(),
            history,
            max_output_tokens,
            temperature,
        }
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub async fn send_message(&mut self, message: &str) -> Result<ChatResponse, LlmError> {
        let request = ChatRequest {
            context: self.context.clone(),
            history: self.history.clone(),
            message: message.to_owned(),
            max_output_tokens: self.max_output_tokens,
            temperature: self.temperature,
        };
        let response = self.service.predict(request).await?;
        self.history.push(ChatTurn::new(Author::User, message));
        self.history.push(ChatTurn::new(Author::Bot, response.text.clone()));
        Ok(response)
    }
}

// ── Test doubles ──

/// Mock chat service for testing. Returns a fixed reply and records requests.
#[derive(Debug, Default)]
pub struct MockChatService {
    pub reply: String,
    calls: AtomicUsize,
    requests: Mutex<Vec<ChatRequest>>,
    fail_with: Option<fn() -> LlmError>,
}

impl MockChatService {
    pub fn new(reply: impl Into<String>) -> Self {
        Self { reply: reply.into(), ..Self::default() }
    }

    /// Create a mock whose every call fails with the produced error.
    pub fn failing(make_error: fn() -> LlmError) -> Self {
        Self { fail_with: Some(make_error), ..Self::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ChatService for MockChatService {
    fn name(&self) -> &str {
        "mock"
    }

    fn predict(&self, request: ChatRequest) -> ServiceFuture<'_, ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut log) = self.requests.lock() {
            log.push(request);
        }
        let result = match self.fail_with {
            Some(make_error) => Err(make_error()),
            None => Ok(ChatResponse { text: self.reply.clone() }),
        };
        Box::pin(async move { result })
    }
}

/// Mock embedding service for testing.
///
/// With fixed vectors configured it returns them verbatim; otherwise each text
/// maps to a one-dimensional vector holding its length.
#[derive(Debug, Default)]
pub struct MockEmbeddingService {
    vectors: Option<Vec<Vec<f64>>>,
    calls: AtomicUsize,
    inputs: Mutex<Vec<Vec<String>>>,
}

impl MockEmbeddingService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_vectors(vectors: Vec<Vec<f64>>) -> Self {
        Self { vectors: Some(vectors), ..Self::default() }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Text batches received so far, oldest first.
    pub fn inputs(&self) -> Vec<Vec<String>> {
        self.inputs.lock().map(|i| i.clone()).unwrap_or_default()
    }
}

impl EmbeddingService for MockEmbeddingService {
    fn name(&self) -> &str {
        "mock"
    }

    fn embed(&self, texts: Vec<String>) -> ServiceFuture<'_, Vec<TextEmbedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let embeddings = match &self.vectors {
            Some(vectors) => vectors.iter().cloned().map(TextEmbedding::new).collect(),
            None => texts
                .iter()
                .map(|t| TextEmbedding::new(vec![t.chars().count() as f64]))
                .collect(),
        };
        if let Ok(mut log) = self.inputs.lock() {
            log.push(texts);
        }
        Box::pin(async move { Ok(embeddings) })
    }
}
