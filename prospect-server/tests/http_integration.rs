//! HTTP integration tests for the Prospect API
//!
//! Full router dispatch via `oneshot`, with the real completion client pointed
//! at a wiremock server and the in-memory exchange store. No database needed.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use prospect_core::{
    ChatCompletionClient, CompletionSettings, ExchangeStore, Interpreter, MemoryExchangeStore,
    ProspectConfig,
};
use prospect_server::handler::ChatHandler;
use prospect_server::http::{build_router, HttpState};
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [{
            "index": 0,
            "message": { "role": "assistant", "content": content },
            "finish_reason": "stop"
        }]
    })
}

/// Router wired to `mock_server`, plus the store behind it.
fn make_app(mock_server: &MockServer) -> (axum::Router, MemoryExchangeStore) {
    let client = ChatCompletionClient::new(CompletionSettings {
        api_key: "test-key".to_string(),
        base_url: mock_server.uri(),
        model: "mixtral-8x7b-32768".to_string(),
        temperature: 0.5,
        max_tokens: 4096,
        timeout: Duration::from_secs(5),
    })
    .unwrap();

    let store = MemoryExchangeStore::new();
    let handler = ChatHandler::new(Interpreter::new(Arc::new(client)), Arc::new(store.clone()), 50);
    let state = Arc::new(HttpState {
        handler,
        config: ProspectConfig::default(),
    });
    (build_router(state), store)
}

fn post_message(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/messages/send_message")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().method("GET").uri(uri).body(Body::empty()).unwrap()
}

async fn read_json(resp: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

// ===========================================================================
// send_message
// ===========================================================================

#[tokio::test]
async fn test_send_message_success_roundtrip() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            "```json\n{\"summary\":\"Berlin startups\",\"data\":{\"table_name\":\"Startup Information\",\
             \"companies\":[{\"company_name\":\"Acme\",\"Annual Revenue\":\"$5M\",\"funding_amount\":\"$20M\"}]},\
             \"key_insights\":[\"AI leads\"]}\n```",
        )))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (app, store) = make_app(&mock_server);
    let resp = app
        .oneshot(post_message(json!({
            "message": "Find startups in Berlin, include revenue as Annual Revenue."
        })))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = read_json(resp).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["summary"], "Berlin startups");
    assert_eq!(body["data"]["key_insights"], json!(["AI leads"]));
    let company = &body["data"]["data"]["companies"][0];
    assert_eq!(company["company_name"], "Acme");
    assert_eq!(company["Annual Revenue"], "$5M");

    // the prompt carried the extracted hints
    let requests = mock_server.received_requests().await.unwrap();
    let sent: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    let system_prompt = sent["messages"][0]["content"].as_str().unwrap();
    assert!(system_prompt.contains("Find startups in Berlin"));
    assert!(system_prompt.contains("Annual Revenue"));
    assert_eq!(
        sent["messages"][1]["content"],
        "Find startups in Berlin, include revenue as Annual Revenue."
    );

    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_send_message_empty_is_400_without_remote_call() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("{}")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (app, store) = make_app(&mock_server);

    for payload in [json!({}), json!({"message": ""}), json!({"message": "   "})] {
        let resp = app.clone().oneshot(post_message(payload)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = read_json(resp).await;
        assert_eq!(body["error"], "Message is required");
        assert_eq!(body["type"], "error");
        assert_eq!(body["content"], "Please provide a message.");
    }

    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_send_message_malformed_body_is_400_envelope() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body("{}")))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (app, store) = make_app(&mock_server);

    let requests = [
        // valid JSON, no content type
        Request::builder()
            .method("POST")
            .uri("/messages/send_message")
            .body(Body::from(r#"{"message":""}"#))
            .unwrap(),
        // empty body
        Request::builder()
            .method("POST")
            .uri("/messages/send_message")
            .header("content-type", "application/json")
            .body(Body::empty())
            .unwrap(),
        // not JSON
        Request::builder()
            .method("POST")
            .uri("/messages/send_message")
            .header("content-type", "application/json")
            .body(Body::from("message=hello"))
            .unwrap(),
        post_message(json!({"message": 5})),
    ];

    for req in requests {
        let resp = app.clone().oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let body = read_json(resp).await;
        assert_eq!(body["error"], "Message is required");
        assert_eq!(body["type"], "error");
        assert_eq!(body["content"], "Please provide a message.");
    }

    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_send_message_without_content_type_is_accepted() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(r#"{"summary":"ok"}"#)))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (app, store) = make_app(&mock_server);
    let req = Request::builder()
        .method("POST")
        .uri("/messages/send_message")
        .body(Body::from(r#"{"message":"startups"}"#))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await["status"], "success");
    assert_eq!(store.len().await, 1);
}

#[tokio::test]
async fn test_send_message_provider_error_is_500_and_recorded() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error": { "message": "Service unavailable" }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let (app, store) = make_app(&mock_server);
    let resp = app
        .oneshot(post_message(json!({"message": "fintech startups"})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = read_json(resp).await;
    assert_eq!(body["error"], "Failed to get response from AI service");
    assert_eq!(
        body["content"],
        "Sorry, I encountered an error while processing your request. Please try again."
    );
    assert!(body["details"].as_str().unwrap().contains("Service unavailable"));

    let stored = store.list_recent(1).await.unwrap();
    assert_eq!(stored.len(), 1);
    let recorded: serde_json::Value = serde_json::from_str(&stored[0].bot_response).unwrap();
    assert_eq!(recorded["status"], "error");
}

#[tokio::test]
async fn test_send_message_unparseable_reply_is_200_failure() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(completion_body("I can't produce a table for that.")),
        )
        .mount(&mock_server)
        .await;

    let (app, _store) = make_app(&mock_server);
    let resp = app
        .oneshot(post_message(json!({"message": "startups"})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = read_json(resp).await;
    assert_eq!(body["status"], "error");
    assert!(body["message"].as_str().unwrap().starts_with("Failed to parse JSON response"));
    assert_eq!(body["raw_response"], "I can't produce a table for that.");
}

#[tokio::test]
async fn test_send_message_truncated_reply_is_recovered() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
            r#"{"summary":"ok","data":{"companies":[{"company_name":"Acme"}"#,
        )))
        .mount(&mock_server)
        .await;

    let (app, _store) = make_app(&mock_server);
    let resp = app
        .oneshot(post_message(json!({"message": "startups"})))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let body = read_json(resp).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["data"]["companies"][0]["company_name"], "Acme");
}

// ===========================================================================
// history and single exchange
// ===========================================================================

#[tokio::test]
async fn test_history_newest_first_with_limit() {
    let mock_server = MockServer::start().await;
    let (app, store) = make_app(&mock_server);
    for i in 0..4 {
        store.append(&format!("message {}", i), "{\"status\":\"success\",\"data\":{}}").await.unwrap();
    }

    let resp = app.clone().oneshot(get("/messages/get_history")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let all = read_json(resp).await;
    assert_eq!(all.as_array().unwrap().len(), 4);
    assert_eq!(all[0]["user_message"], "message 3");

    let resp = app.oneshot(get("/messages/get_history?limit=2")).await.unwrap();
    let limited = read_json(resp).await;
    let items = limited.as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["user_message"], "message 2");
}

#[tokio::test]
async fn test_history_zero_limit_is_empty() {
    let mock_server = MockServer::start().await;
    let (app, store) = make_app(&mock_server);
    store.append("hello", "{}").await.unwrap();

    let resp = app.oneshot(get("/messages/get_history?limit=0")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(read_json(resp).await, json!([]));
}

#[tokio::test]
async fn test_get_exchange_by_id() {
    let mock_server = MockServer::start().await;
    let (app, store) = make_app(&mock_server);
    let exchange = store.append("hello", "{}").await.unwrap();

    let resp = app
        .clone()
        .oneshot(get(&format!("/messages/{}", exchange.id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = read_json(resp).await;
    assert_eq!(body["user_message"], "hello");
    assert_eq!(body["id"], exchange.id.to_string());

    let resp = app
        .oneshot(get(&format!("/messages/{}", uuid::Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// ===========================================================================
// health, version, CORS
// ===========================================================================

#[tokio::test]
async fn test_health_and_version_endpoints() {
    let mock_server = MockServer::start().await;
    let (app, _store) = make_app(&mock_server);

    let resp = app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let health = read_json(resp).await;
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["store"], "memory");

    let resp = app.oneshot(get("/version")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let version = read_json(resp).await;
    assert!(version["version"].is_string());
}

#[tokio::test]
async fn test_cors_preflight_is_allowed() {
    let mock_server = MockServer::start().await;
    let (app, _store) = make_app(&mock_server);

    let req = Request::builder()
        .method("OPTIONS")
        .uri("/messages/send_message")
        .header("origin", "http://localhost:3000")
        .header("access-control-request-method", "POST")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert!(resp.status().is_success());
    assert!(resp.headers().contains_key("access-control-allow-origin"));
}
