//! End-to-end tests for the PaLM 2 adapter.
//!
//! The Vertex tests run the real HTTP clients against a mock server:
//! assemble → chat predict → embedding predict → distance → ranking.

use std::io::Write;
use std::sync::Arc;

use palm2_core::adapter::Palm2Adapter;
use palm2_core::config::AdapterConfig;
use palm2_core::error::AdapterError;
use palm2_core::plugin::LanguageModel;
use palm2_core::services::{StaticServices, VertexServices};
use palm2_core::types::{Persona, Turn, parse_history};
use palm2_llm::auth::StaticTokenProvider;
use palm2_llm::provider::{LlmError, MockChatService, MockEmbeddingService};
use serde_json::json;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CHAT_PATH: &str =
    "/projects/neon/locations/us-central1/publishers/google/models/chat-bison@001:predict";
const EMBED_PATH: &str =
    "/projects/neon/locations/us-central1/publishers/google/models/textembedding-gecko@001:predict";

fn config(server: &MockServer, context_depth: i64) -> AdapterConfig {
    AdapterConfig::from_value(json!({
        "role": "You are NeonAI, a helpful assistant.",
        "context_depth": context_depth,
        "max_tokens": 100,
        "key_path": "/unused/key.json",
        "base_url": server.uri()
    }))
    .unwrap()
}

async fn vertex_adapter(server: &MockServer, context_depth: i64) -> Palm2Adapter {
    let cfg = config(server, context_depth);
    let services = VertexServices::with_tokens(
        &cfg,
        "neon".into(),
        reqwest::Client::new(),
        Arc::new(StaticTokenProvider::new("ya29.test")),
    );
    Palm2Adapter::new(cfg, Arc::new(services)).await.unwrap()
}

const TEST_KEY_PEM: &str =
    include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/../../testdata/rsa_test_key.pem"));

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn ask_sends_truncated_history_to_vertex() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(body_json(json!({
            "instances": [{
                "context": "You are NeonAI, a helpful assistant.",
                "examples": [],
                "messages": [
                    { "author": "bot", "content": "Paris." },
                    { "author": "user", "content": "And of Italy?" },
                    { "author": "bot", "content": "Rome." },
                    { "author": "user", "content": "And of Spain?" }
                ]
            }],
            "parameters": { "temperature": 0.0, "maxOutputTokens": 100 }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{ "candidates": [{ "author": "1", "content": "Madrid." }] }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = vertex_adapter(&server, 3).await;
    let history = parse_history([
        ("user", "What is the capital of France?"),
        ("llm", "Paris."),
        ("user", "And of Italy?"),
        ("llm", "Rome."),
    ])
    .unwrap();

    let reply = adapter.ask("And of Spain?", &history, &Persona::default()).await.unwrap();
    assert_eq!(reply, "Madrid.");
}

#[tokio::test]
async fn ranks_answers_through_vertex() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{ "candidates": [{ "content": "gen" }] }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(EMBED_PATH))
        .and(body_json(json!({
            "instances": [
                { "content": "gen" },
                { "content": "a" },
                { "content": "b" },
                { "content": "c" }
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [
                { "embeddings": { "values": [1.0, 0.0] } },
                { "embeddings": { "values": [0.0, 1.0] } },
                { "embeddings": { "values": [1.0, 0.1] } },
                { "embeddings": { "values": [-1.0, 0.0] } }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let adapter = vertex_adapter(&server, 3).await;
    let order = adapter
        .get_sorted_answer_indexes("q", &strings(&["a", "b", "c"]), &Persona::default())
        .await
        .unwrap();
    assert_eq!(order, vec![1, 0, 2]);
}

#[tokio::test]
async fn quota_error_surfaces_from_ranking() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .respond_with(ResponseTemplate::new(429).set_body_string("quota"))
        .mount(&server)
        .await;

    let adapter = vertex_adapter(&server, 3).await;
    let err = adapter
        .get_sorted_answer_indexes("q", &strings(&["a"]), &Persona::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AdapterError::Llm(LlmError::QuotaExceeded(_))));
}

#[tokio::test]
async fn empty_answers_make_no_requests() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let adapter = vertex_adapter(&server, 3).await;
    let order = adapter.get_sorted_answer_indexes("q", &[], &Persona::default()).await.unwrap();
    assert!(order.is_empty());
}

#[tokio::test]
async fn persona_from_host_json_overrides_system_prompt() {
    let chat = Arc::new(MockChatService::new("Aye"));
    let services = Arc::new(StaticServices::new(chat.clone(), Arc::new(MockEmbeddingService::new())));
    let cfg = AdapterConfig::new("default role", 2, 50, "/k.json");
    let adapter = Palm2Adapter::new(cfg, services).await.unwrap();

    let persona: Persona = serde_json::from_value(json!({
        "name": "pirate",
        "description": "You are a pirate."
    }))
    .unwrap();
    let reply = adapter.ask("hello", &[Turn::user("ahoy")], &persona).await.unwrap();

    assert_eq!(reply, "Aye");
    assert_eq!(chat.requests()[0].context, "You are a pirate.");
}

#[test]
fn unknown_host_role_is_rejected_before_prompting() {
    let err = parse_history([("user", "hi"), ("system", "be terse")]).unwrap_err();
    assert!(matches!(err, AdapterError::UnmappedRole(ref r) if r == "system"));
}

#[tokio::test]
async fn from_config_authenticates_with_service_account_key() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.from-key",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(CHAT_PATH))
        .and(header("authorization", "Bearer ya29.from-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "predictions": [{ "candidates": [{ "content": "Hello." }] }]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let key = json!({
        "type": "service_account",
        "project_id": "neon",
        "client_email": "bot@neon.iam.gserviceaccount.com",
        "private_key": TEST_KEY_PEM,
        "token_uri": format!("{}/token", server.uri())
    });
    let mut key_file = tempfile::NamedTempFile::new().unwrap();
    key_file.write_all(key.to_string().as_bytes()).unwrap();

    let cfg = AdapterConfig::from_value(json!({
        "role": "You are NeonAI, a helpful assistant.",
        "context_depth": 3,
        "max_tokens": 100,
        "key_path": key_file.path(),
        "base_url": server.uri()
    }))
    .unwrap();

    let adapter = Palm2Adapter::from_config(cfg).await.unwrap();
    assert_eq!(adapter.ask("Hi", &[], &Persona::default()).await.unwrap(), "Hello.");
    // Second call reuses the cached access token.
    assert_eq!(adapter.ask("Hi", &[], &Persona::default()).await.unwrap(), "Hello.");
}
