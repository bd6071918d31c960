//! Anthropic and WhatsApp clients against local mock APIs (loopback axum servers).

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use relay::agent::{Completer, CompletionClient, CompletionFailure};
use relay::channels::{SendError, WhatsAppChannel};
use relay::config::{LlmConfig, WhatsAppConfig};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

type Seen = Arc<Mutex<Vec<(HeaderMap, Value)>>>;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local_addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    format!("http://{}", addr)
}

/// Mock Messages API: only `good-model` exists; everything else is a 404.
/// `slow-model` stalls for 3s before answering.
async fn mock_messages(
    State(seen): State<Seen>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    seen.lock().unwrap().push((headers, body.clone()));
    if body["model"] == "slow-model" {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
    if body["model"] == "good-model" {
        let prompt = body["messages"][0]["content"].as_str().unwrap_or("");
        (
            StatusCode::OK,
            Json(json!({
                "id": "msg_01",
                "type": "message",
                "role": "assistant",
                "model": "good-model",
                "content": [{ "type": "text", "text": format!("echo: {}", prompt) }]
            })),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "type": "error", "error": { "type": "not_found_error", "message": "model not found" } })),
        )
    }
}

async fn mock_llm() -> (String, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route("/v1/messages", post(mock_messages))
        .with_state(seen.clone());
    (serve(app).await, seen)
}

fn llm_config(base: &str, models: &[&str]) -> LlmConfig {
    LlmConfig {
        api_key: Some("sk-ant-test".to_string()),
        base_url: Some(base.to_string()),
        models: models.iter().map(|m| m.to_string()).collect(),
        ..LlmConfig::default()
    }
}

#[tokio::test]
async fn completion_falls_back_to_next_model() {
    let (base, seen) = mock_llm().await;
    let client =
        CompletionClient::from_config(&llm_config(&base, &["gone-model", "good-model", "never-tried"]))
            .expect("client");
    let text = client.complete("hello").await.expect("completion");
    assert_eq!(text, "echo: hello");

    let seen = seen.lock().unwrap();
    let models: Vec<&str> = seen.iter().map(|(_, b)| b["model"].as_str().unwrap_or("")).collect();
    assert_eq!(models, vec!["gone-model", "good-model"]);
    let (headers, body) = &seen[1];
    assert_eq!(headers["x-api-key"], "sk-ant-test");
    assert_eq!(headers["anthropic-version"], "2023-06-01");
    assert_eq!(body["max_tokens"], 1024);
    assert_eq!(body["messages"], json!([{ "role": "user", "content": "hello" }]));
}

#[tokio::test]
async fn slow_model_times_out_and_falls_back() {
    let (base, seen) = mock_llm().await;
    let mut config = llm_config(&base, &["slow-model", "good-model"]);
    config.timeout_secs = 1;
    let client = CompletionClient::from_config(&config).expect("client");
    let started = Instant::now();
    let text = client.complete("hello").await.expect("completion");
    assert_eq!(text, "echo: hello");
    assert!(started.elapsed() < Duration::from_secs(3));

    let models: Vec<String> = seen
        .lock()
        .unwrap()
        .iter()
        .map(|(_, b)| b["model"].as_str().unwrap_or("").to_string())
        .collect();
    assert_eq!(models, vec!["slow-model", "good-model"]);
}

#[tokio::test]
async fn completion_reports_every_failed_model() {
    let (base, seen) = mock_llm().await;
    let client = CompletionClient::from_config(&llm_config(&base, &["a", "b"])).expect("client");
    let err = client.complete("hello").await.unwrap_err();
    match err {
        CompletionFailure::AllModelsFailed { attempts } => {
            assert_eq!(attempts.len(), 2);
            assert!(attempts[0].error.contains("404"));
        }
        other => panic!("expected AllModelsFailed, got {:?}", other),
    }
    assert_eq!(seen.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn completion_without_key_never_calls_api() {
    let (base, seen) = mock_llm().await;
    let mut config = llm_config(&base, &["good-model"]);
    config.api_key = None;
    let client = CompletionClient::from_config(&config).expect("client");
    assert_eq!(
        client.complete("hello").await,
        Err(CompletionFailure::MissingApiKey)
    );
    assert!(seen.lock().unwrap().is_empty());
}

fn whatsapp_config(base: &str) -> WhatsAppConfig {
    WhatsAppConfig {
        token: Some("EAAG-test-token".to_string()),
        phone_number_id: Some("1234567890".to_string()),
        api_base: Some(base.to_string()),
        ..WhatsAppConfig::default()
    }
}

async fn mock_whatsapp(status: StatusCode) -> (String, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new()
        .route(
            "/v18.0/1234567890/messages",
            post(
                move |State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
                    seen.lock().unwrap().push((headers, body));
                    if status == StatusCode::OK {
                        (
                            status,
                            Json(json!({
                                "messaging_product": "whatsapp",
                                "contacts": [{ "input": "5511999999999", "wa_id": "5511999999999" }],
                                "messages": [{ "id": "wamid.HBgM" }]
                            })),
                        )
                    } else {
                        (
                            status,
                            Json(json!({ "error": { "message": "Invalid OAuth access token.", "code": 190 } })),
                        )
                    }
                },
            ),
        )
        .with_state(seen.clone());
    (serve(app).await, seen)
}

#[tokio::test]
async fn whatsapp_send_success_returns_message_id() {
    let (base, seen) = mock_whatsapp(StatusCode::OK).await;
    let channel = WhatsAppChannel::new(&whatsapp_config(&base)).expect("channel");
    let outcome = channel
        .send_message("5511999999999", "hi there")
        .await
        .expect("request made");
    assert!(outcome.delivered());
    assert_eq!(outcome.message_id.as_deref(), Some("wamid.HBgM"));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let (headers, body) = &seen[0];
    assert_eq!(headers["authorization"], "Bearer EAAG-test-token");
    assert_eq!(
        body,
        &json!({
            "messaging_product": "whatsapp",
            "recipient_type": "individual",
            "to": "5511999999999",
            "type": "text",
            "text": { "preview_url": false, "body": "hi there" }
        })
    );
}

#[tokio::test]
async fn whatsapp_rejection_is_not_delivered() {
    let (base, _seen) = mock_whatsapp(StatusCode::UNAUTHORIZED).await;
    let channel = WhatsAppChannel::new(&whatsapp_config(&base)).expect("channel");
    let outcome = channel
        .send_message("5511999999999", "hi there")
        .await
        .expect("request made");
    assert!(!outcome.delivered());
    assert_eq!(outcome.status, 401);
    assert!(outcome.message_id.is_none());
    assert_eq!(outcome.response["error"]["code"], 190);
}

#[tokio::test]
async fn whatsapp_unreachable_is_a_request_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        listener.local_addr().expect("local_addr").port()
    };
    let channel = WhatsAppChannel::new(&whatsapp_config(&format!("http://127.0.0.1:{}", port)))
        .expect("channel");
    let err = channel.send_message("5511999999999", "hi").await.unwrap_err();
    assert!(matches!(err, SendError::Request(_)));
}
