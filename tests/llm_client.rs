mod common;

use axum::{extract::State, http::HeaderMap, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use credit_memo::config::{Config, LlmConfig};
use credit_memo::generate::{GenerateError, GenerationSettings, MemoGenerator};
use credit_memo::llm::{ChatCompletionClient, ChatMessage, CompletionBackend, CompletionRequest};

use common::VALID_MEMO;

#[derive(Clone, Default)]
struct Captured {
    body: Arc<Mutex<Option<Value>>>,
    auth: Arc<Mutex<Option<String>>>,
}

async fn spawn_mock(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}/v1", addr)
}

fn completion(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "choices": [{"index": 0, "message": {"role": "assistant", "content": content}}]
    })
}

fn llm_config(base_url: String, timeout_secs: u64) -> LlmConfig {
    LlmConfig {
        base_url,
        timeout_secs,
        ..LlmConfig::default()
    }
}

fn request() -> CompletionRequest {
    CompletionRequest {
        messages: vec![ChatMessage::system("sys"), ChatMessage::user("hello")],
        temperature: 0.1,
        top_p: 0.95,
        max_tokens: None,
    }
}

#[tokio::test]
async fn test_sends_chat_request() {
    let captured = Captured::default();
    let app = Router::new()
        .route(
            "/v1/chat/completions",
            post(
                |State(c): State<Captured>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    *c.auth.lock().unwrap() = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    *c.body.lock().unwrap() = Some(body);
                    Json(completion("{\"top_risks\": []}"))
                },
            ),
        )
        .with_state(captured.clone());
    let base = spawn_mock(app).await;

    let client = ChatCompletionClient::new(&llm_config(base, 10), "test-key").unwrap();
    assert!(client.endpoint().ends_with("/v1/chat/completions"));
    let text = client.complete(&request()).await.unwrap();
    assert_eq!(text, "{\"top_risks\": []}");

    assert_eq!(
        captured.auth.lock().unwrap().as_deref(),
        Some("Bearer test-key")
    );
    let body = captured.body.lock().unwrap().clone().unwrap();
    assert_eq!(body["model"], "llama-3.3-70b-versatile");
    assert_eq!(body["messages"][0]["role"], "system");
    assert_eq!(body["messages"][1]["content"], "hello");
    assert!((body["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
    assert!(body.get("max_tokens").is_none());
}

#[tokio::test]
async fn test_error_status_is_request_failure() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async { (StatusCode::SERVICE_UNAVAILABLE, "overloaded") }),
    );
    let base = spawn_mock(app).await;

    let client = ChatCompletionClient::new(&llm_config(base, 10), "k").unwrap();
    match client.complete(&request()).await {
        Err(GenerateError::RequestFailure(msg)) => {
            assert!(msg.contains("503"), "{}", msg);
            assert!(msg.contains("overloaded"), "{}", msg);
        }
        other => panic!("expected RequestFailure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_slow_endpoint_times_out() {
    let app = Router::new().route(
        "/v1/chat/completions",
        post(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Json(completion("{}"))
        }),
    );
    let base = spawn_mock(app).await;

    let client = ChatCompletionClient::new(&llm_config(base, 1), "k").unwrap();
    match client.complete(&request()).await {
        Err(GenerateError::RequestTimeout(secs)) => assert_eq!(secs, 1),
        other => panic!("expected RequestTimeout, got {:?}", other),
    }
}

#[tokio::test]
async fn test_generator_over_http() {
    let fenced = format!("```json\n{}\n```", VALID_MEMO);
    let app = Router::new().route(
        "/v1/chat/completions",
        post(move || {
            let answer = fenced.clone();
            async move { Json(completion(&answer)) }
        }),
    );
    let base = spawn_mock(app).await;

    let mut config = Config::default();
    config.llm = llm_config(base, 10);
    let client = ChatCompletionClient::new(&config.llm, "k").unwrap();
    let generator = MemoGenerator::new(Arc::new(client), GenerationSettings::from(&config));

    let memo = generator
        .generate("--- PAGE 1 ---\nRevenue 18,750,000")
        .await
        .unwrap();
    assert_eq!(memo.memo_meta.credit_note_no, "CN-042");
    assert_eq!(memo.key_metrics.len(), 1);
    assert!(memo.attribution_gaps().is_empty());
}
