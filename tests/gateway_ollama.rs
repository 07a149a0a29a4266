use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arlo::gateway::ollama::{ChatProvider, OllamaAdapter};
use arlo::gateway::usage::{CallStatus, ProviderCallRecord};
use arlo::gateway::{
    Attribution, ChatModel, ChatRequest, FinishReason, GatewayConfig, Message, NoopUsageSink,
    ProviderError, ProviderGateway, UsageSink,
};
use arlo::{EmbeddingOracle, TextOracle};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

fn adapter(server: &MockServer) -> OllamaAdapter {
    OllamaAdapter::with_config(server.uri(), "llama3.1", "nomic-embed-text", Duration::from_secs(5))
        .unwrap()
}

fn fast_retries() -> GatewayConfig {
    GatewayConfig {
        max_retries: 2,
        retry_base_delay: Duration::from_millis(1),
    }
}

fn chat_ok(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "llama3.1",
        "message": { "role": "assistant", "content": content },
        "done": true,
        "done_reason": "stop",
        "prompt_eval_count": 12,
        "eval_count": 3
    }))
}

#[derive(Default)]
struct CollectingSink {
    records: Mutex<Vec<ProviderCallRecord>>,
}

#[async_trait::async_trait]
impl UsageSink for CollectingSink {
    async fn record(&self, record: ProviderCallRecord) {
        self.records.lock().unwrap().push(record);
    }
}

struct FlipResponder {
    calls: Arc<AtomicUsize>,
    first: ResponseTemplate,
    second: ResponseTemplate,
}

impl Respond for FlipResponder {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n == 0 {
            self.first.clone()
        } else {
            self.second.clone()
        }
    }
}

#[tokio::test]
async fn ollama_parses_chat_content_and_token_counts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({ "model": "llama3.1", "stream": false })))
        .respond_with(chat_ok("true"))
        .mount(&server)
        .await;

    let req = ChatRequest::new(
        ChatModel::ollama("llama3.1"),
        vec![Message::system("answer true or false"), Message::user("same?")],
        Attribution::new("test"),
    );

    let resp = adapter(&server).chat(&req).await.unwrap();
    assert_eq!(resp.content, "true");
    assert_eq!(resp.finish_reason, FinishReason::Stop);
    assert_eq!(resp.input_tokens, 12);
    assert_eq!(resp.output_tokens, 3);
}

#[tokio::test]
async fn oracle_generate_sends_instruction_then_prompt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(json!({
            "messages": [
                { "role": "system", "content": "Just return True or False." },
                { "role": "user", "content": "Condition 1: 'x'" }
            ],
            "options": { "temperature": 0.0 }
        })))
        .respond_with(chat_ok("True"))
        .expect(1)
        .mount(&server)
        .await;

    let gateway =
        ProviderGateway::with_config(adapter(&server), Arc::new(NoopUsageSink), fast_retries());
    let answer = gateway
        .generate("Just return True or False.", "Condition 1: 'x'")
        .await
        .unwrap();
    assert_eq!(answer, "True");
}

#[tokio::test]
async fn ollama_error_body_is_surfaced() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({ "error": "model 'nope' not found" })),
        )
        .mount(&server)
        .await;

    let req = ChatRequest::new(
        ChatModel::ollama("nope"),
        vec![Message::user("hi")],
        Attribution::new("test"),
    );
    let err = adapter(&server).chat(&req).await.unwrap_err();
    assert!(!err.is_retryable());
    assert_eq!(err.http_status(), Some(404));
    assert!(err.to_string().contains("not found"));
}

#[tokio::test]
async fn gateway_retries_server_errors_and_records_each_call() {
    let server = MockServer::start().await;
    let calls = Arc::new(AtomicUsize::new(0));

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(FlipResponder {
            calls: calls.clone(),
            first: ResponseTemplate::new(500).set_body_json(json!({ "error": "loading model" })),
            second: chat_ok("((1,2),(3))"),
        })
        .mount(&server)
        .await;

    let sink = Arc::new(CollectingSink::default());
    let gateway = ProviderGateway::with_config(adapter(&server), sink.clone(), fast_retries());

    let answer = gateway.generate("partition", "Conditions: ...").await.unwrap();
    assert_eq!(answer, "((1,2),(3))");
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].status, CallStatus::Error);
    assert_eq!(records[1].status, CallStatus::Success);
    assert_eq!(records[1].endpoint, "api/chat");
    assert_eq!(records[1].caller, "oracle::generate");
}

#[tokio::test]
async fn gateway_does_not_retry_client_errors() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "bad request" })))
        .expect(1)
        .mount(&server)
        .await;

    let gateway =
        ProviderGateway::with_config(adapter(&server), Arc::new(NoopUsageSink), fast_retries());
    let err = gateway.generate("x", "y").await.unwrap_err();
    assert!(matches!(err, ProviderError::Provider { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn gateway_gives_up_after_max_retries() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let gateway =
        ProviderGateway::with_config(adapter(&server), Arc::new(NoopUsageSink), fast_retries());
    let err = gateway.generate("x", "y").await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.http_status(), Some(503));
}

#[tokio::test]
async fn embeddings_are_one_call_per_text() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_partial_json(json!({ "model": "nomic-embed-text" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [0.5, -1.0, 2.0] })))
        .expect(2)
        .mount(&server)
        .await;

    let gateway =
        ProviderGateway::with_config(adapter(&server), Arc::new(NoopUsageSink), fast_retries());
    let vectors = gateway
        .embed(&["when offline".to_string(), "during peak load".to_string()])
        .await;
    assert_eq!(vectors, vec![vec![0.5, -1.0, 2.0], vec![0.5, -1.0, 2.0]]);
}

#[tokio::test]
async fn failed_embedding_leaves_an_empty_slot() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_partial_json(json!({ "prompt": "broken" })))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "boom" })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embeddings"))
        .and(body_partial_json(json!({ "prompt": "fine" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "embedding": [1.0, 0.0] })))
        .mount(&server)
        .await;

    let sink = Arc::new(CollectingSink::default());
    let gateway = ProviderGateway::with_config(adapter(&server), sink.clone(), fast_retries());
    let vectors = gateway
        .embed(&["broken".to_string(), "fine".to_string()])
        .await;
    assert_eq!(vectors, vec![Vec::<f32>::new(), vec![1.0, 0.0]]);

    let records = sink.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].error_code.as_deref(), Some("1_of_2_failed"));
}

#[tokio::test]
async fn health_check_reflects_tags_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "models": [] })))
        .mount(&server)
        .await;
    assert!(adapter(&server).health_check().await);

    let down = OllamaAdapter::with_config(
        "http://127.0.0.1:9",
        "llama3.1",
        "llama3.1",
        Duration::from_millis(200),
    )
    .unwrap();
    assert!(!down.health_check().await);
}
