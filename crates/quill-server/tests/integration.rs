//! End-to-end tests over the HTTP surface with a mock upstream provider.

use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use quill_admission::{AdmissionController, SystemClock};
use quill_chat::memory_store::MemoryStore;
use quill_chat::orchestrator::Orchestrator;
use quill_chat::store::ChatStore;
use quill_core::ids::UserId;
use quill_llm::{RelayConfig, StreamingRelay};
use quill_server::auth::StaticTokenAuthenticator;
use quill_server::routes::{AppState, router};

struct TestApp {
    app: Router,
    store: Arc<MemoryStore>,
    admission: Arc<AdmissionController>,
}

fn boot(upstream: &MockServer) -> TestApp {
    let clock = Arc::new(SystemClock);
    let store = Arc::new(MemoryStore::new());
    let admission = Arc::new(AdmissionController::new(clock.clone()));
    let relay = Arc::new(StreamingRelay::new(RelayConfig {
        api_key: Some("test-key".into()),
        base_url: upstream.uri(),
        ..RelayConfig::default()
    }));
    let orchestrator = Arc::new(Orchestrator::new(
        store.clone(),
        admission.clone(),
        relay,
        clock,
    ));

    let mut auth = StaticTokenAuthenticator::new();
    auth.insert("tok-1", "user-1", "user");

    let app = router(AppState {
        orchestrator,
        auth: Arc::new(auth),
        start_time: Instant::now(),
    });
    TestApp {
        app,
        store,
        admission,
    }
}

async fn mount_streaming_reply(server: &MockServer) {
    let body = concat!(
        "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"!\"}}]}\n\n",
        "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":10,\"completion_tokens\":3}}\n\n",
        "data: [DONE]\n\n",
    );
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/event-stream")
                .set_body_string(body),
        )
        .mount(server)
        .await;
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Bearer tok-1")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), 1_000_000)
        .await
        .unwrap()
        .to_vec()
}

/// Parse the JSON payloads of an SSE body's `data:` frames.
fn sse_frames(body: &[u8]) -> Vec<Value> {
    String::from_utf8_lossy(body)
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|payload| serde_json::from_str(payload).unwrap())
        .collect()
}

async fn create_conversation(app: &Router) -> String {
    let response = app
        .clone()
        .oneshot(post_json("/api/chat/conversations", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    json["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn full_chat_turn_streams_and_persists() {
    let upstream = MockServer::start().await;
    mount_streaming_reply(&upstream).await;
    let t = boot(&upstream);
    let conversation_id = create_conversation(&t.app).await;

    let response = t
        .app
        .clone()
        .oneshot(post_json(
            "/api/chat/messages",
            json!({"conversationId": conversation_id, "content": "Hello there"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "text/event-stream"
    );
    let message_id = response
        .headers()
        .get("x-message-id")
        .expect("x-message-id header")
        .to_str()
        .unwrap()
        .to_string();
    assert!(!message_id.is_empty());

    let frames = sse_frames(&body_bytes(response).await);
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0]["token"], "Hel");
    assert_eq!(frames[1]["token"], "lo");
    assert_eq!(frames[2]["token"], "!");
    assert_eq!(frames[3]["done"], true);
    assert_eq!(frames[3]["content"], "Hello!");
    assert_eq!(frames[3]["usage"]["inputTokens"], 10);
    assert_eq!(frames[3]["usage"]["outputTokens"], 3);
    assert_eq!(frames[3]["usage"]["totalTokens"], 13);

    // The persisted user message is the one named in the header.
    let messages = t
        .store
        .list_messages(&conversation_id.clone().into())
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id.as_str(), message_id);
    assert_eq!(messages[1].content, "Hello!");
}

#[tokio::test]
async fn upstream_failure_arrives_as_error_frame() {
    let upstream = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(500).set_body_string(r#"{"error":{"message":"boom"}}"#),
        )
        .mount(&upstream)
        .await;
    let t = boot(&upstream);
    let conversation_id = create_conversation(&t.app).await;

    let response = t
        .app
        .clone()
        .oneshot(post_json(
            "/api/chat/messages",
            json!({"conversationId": conversation_id, "content": "hi"}),
        ))
        .await
        .unwrap();

    // The stream had already opened; the failure is in-band.
    assert_eq!(response.status(), StatusCode::OK);
    let frames = sse_frames(&body_bytes(response).await);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["error"], true);
    assert!(frames[0]["message"].is_string());

    // The user's turn survived the failed reply.
    let messages = t
        .store
        .list_messages(&conversation_id.into())
        .await
        .unwrap();
    assert_eq!(messages.len(), 1);
}

#[tokio::test]
async fn exhausted_window_returns_429_with_retry_hint() {
    let upstream = MockServer::start().await;
    let t = boot(&upstream);
    let conversation_id = create_conversation(&t.app).await;

    // Consume the user tier's hourly window out of band.
    let user = UserId::from("user-1");
    for _ in 0..30 {
        let _ = t.admission.check_admission(&user, "user", 0);
    }

    let response = t
        .app
        .clone()
        .oneshot(post_json(
            "/api/chat/messages",
            json!({"conversationId": conversation_id, "content": "hi"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    let json: Value = serde_json::from_slice(&body_bytes(response).await).unwrap();
    assert!(json["error"].is_string());
    assert!(json["retryAfter"].is_number());
}

#[tokio::test]
async fn regenerate_replaces_the_last_answer() {
    let upstream = MockServer::start().await;
    mount_streaming_reply(&upstream).await;
    let t = boot(&upstream);
    let conversation_id = create_conversation(&t.app).await;

    // First turn produces "Hello!".
    let first = t
        .app
        .clone()
        .oneshot(post_json(
            "/api/chat/messages",
            json!({"conversationId": conversation_id, "content": "Hello there"}),
        ))
        .await
        .unwrap();
    let _ = body_bytes(first).await;

    let response = t
        .app
        .clone()
        .oneshot(post_json(
            "/api/chat/regenerate",
            json!({"conversationId": conversation_id}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    // No user message is persisted for a regenerate.
    assert!(response.headers().get("x-message-id").is_none());
    let frames = sse_frames(&body_bytes(response).await);
    assert_eq!(frames.last().unwrap()["done"], true);

    let messages = t
        .store
        .list_messages(&conversation_id.into())
        .await
        .unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].content, "Hello there");
    assert_eq!(messages[1].content, "Hello!");
}
