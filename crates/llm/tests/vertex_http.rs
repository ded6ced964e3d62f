//! Vertex AI clients against a mock HTTP server.

use std::sync::Arc;

use palm2_llm::auth::StaticTokenProvider;
use palm2_llm::http::{VertexChatModel, VertexEmbeddingModel, VertexEndpoint};
use palm2_llm::provider::{
    Author, ChatRequest, ChatService, ChatSession, ChatTurn, EmbeddingService, LlmError,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAT_PATH: &str =
    "/projects/neon/locations/us-central1/publishers/google/models/chat-bison@001:predict";
const EMBED_PATH: &str =
    "/projects/neon/locations/us-central1/publishers/google/models/textembedding-gecko@001:predict";

fn endpoint(server: &MockServer) -> VertexEndpoint {
    VertexEndpoint::new("neon".into(), "us-central1".into(), Some(server.uri()))
}

fn chat_model(server: &MockServer) -> VertexChatModel {
    VertexChatModel::new(
        "chat-bison@001".into(),
        endpoint(server),
        reqwest::Client::new(),
        Arc::new(StaticTokenProvider::new("ya29.test")),
    )
}

fn embedding_model(server: &MockServer) -> VertexEmbeddingModel {
    VertexEmbeddingModel::new(
        "textembedding-gecko@001".into(),
        endpoint(server),
        reqwest::Client::new(),
        Arc::new(StaticTokenProvider::new("ya29.test")),
    )
}

fn request(message: &str) -> ChatRequest {
    ChatRequest {
        context: "You are NeonAI".into(),
        history: vec![],
        message: message.into(),
        max_output_tokens: 64,
        temperature: 0.0,
    }
}

#[tokio::test]
async fn chat_session_sends_context_history_and_parameters() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("authorization", "Bearer ya29.test"))
        .and(body_json(json!({
            "instances": [{
                "context": "You are NeonAI",
                "examples": [],
                "messages": [
                    { "author": "user", "content": "hi" },
                    { "author": "bot", "content": "hello" },
                    { "author": "user", "content": "what is 2+2?" }
                ]
            }],
            "parameters": { "temperature": 0.0, "maxOutputTokens": 64 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{ "candidates": [{ "author": "1", "content": "4" }] }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let model = chat_model(&server);
    let history = vec![ChatTurn::new(Author::User, "hi"), ChatTurn::new(Author::Bot, "hello")];
    let mut chat = ChatSession::start(&model, "You are NeonAI", history, 64, 0.0);
    let resp = chat.send_message("what is 2+2?").await.unwrap();

    assert_eq!(resp.text, "4");
    assert_eq!(chat.history().len(), 4);
    assert_eq!(model.name(), "chat-bison@001");
}

#[tokio::test]
async fn empty_candidates_is_invalid_response() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{ "candidates": [] }]
        })))
        .mount(&server)
        .await;

    let err = chat_model(&server).predict(request("hi")).await.unwrap_err();
    assert!(matches!(err, LlmError::InvalidResponse(_)));
}

#[tokio::test]
async fn quota_and_auth_failures_are_distinguished() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("RESOURCE_EXHAUSTED"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
        .mount(&server)
        .await;

    let err = chat_model(&server).predict(request("hi")).await.unwrap_err();
    assert!(matches!(err, LlmError::QuotaExceeded(ref m) if m.contains("RESOURCE_EXHAUSTED")));

    let err = embedding_model(&server).embed(vec!["x".into()]).await.unwrap_err();
    assert!(matches!(err, LlmError::Authentication(_)));
}

#[tokio::test]
async fn server_error_is_request_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = chat_model(&server).predict(request("hi")).await.unwrap_err();
    assert!(matches!(err, LlmError::RequestFailed(_)));
}

#[tokio::test]
async fn embeddings_keep_input_order() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(header("authorization", "Bearer ya29.test"))
        .and(body_json(json!({
            "instances": [{ "content": "first" }, { "content": "second" }]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [
                { "embeddings": { "values": [0.1, 0.2], "statistics": { "token_count": 1.0, "truncated": false } } },
                { "embeddings": { "values": [0.3, 0.4], "statistics": { "token_count": 2.0, "truncated": true } } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let out = embedding_model(&server)
        .embed(vec!["first".into(), "second".into()])
        .await
        .unwrap();

    assert_eq!(out.len(), 2);
    assert_eq!(out[0].values, vec![0.1, 0.2]);
    assert_eq!(out[1].values, vec![0.3, 0.4]);
    assert_eq!(out[1].token_count, Some(2));
    assert!(out[1].truncated);
    assert!(!out[0].truncated);
}
