//! API endpoint integration tests

use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode, header},
};
use tower::ServiceExt;
use voice_chatbot::api::{ApiServer, Responder};

/// Responder that echoes and remembers what it was asked
#[derive(Default)]
struct EchoResponder {
    asked: Mutex<Vec<String>>,
}

#[async_trait]
impl Responder for EchoResponder {
    async fn respond(&self, message: &str) -> String {
        self.asked.lock().unwrap().push(message.to_string());
        format!("You said: {message}")
    }
}

fn build_test_router(responder: Arc<EchoResponder>) -> axum::Router {
    ApiServer::new(responder, 0).router()
}

fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = build_test_router(Arc::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "Voice Chatbot API");
}

#[tokio::test]
async fn test_chat_returns_reply() {
    let responder = Arc::new(EchoResponder::default());
    let app = build_test_router(responder.clone());

    let response = app
        .oneshot(chat_request(r#"{"message": "  What is your experience?  "}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["response"], "You said: What is your experience?");
    assert_eq!(json["status"], "success");
    assert_eq!(
        *responder.asked.lock().unwrap(),
        vec!["What is your experience?".to_string()]
    );
}

#[tokio::test]
async fn test_chat_blank_message_is_bad_request() {
    let responder = Arc::new(EchoResponder::default());

    for body in [r#"{"message": "   "}"#, r#"{"message": ""}"#, "{}"] {
        let response = build_test_router(responder.clone())
            .oneshot(chat_request(body))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
        let json = json_body(response).await;
        assert_eq!(json["error"], "Message is required");
    }

    assert!(responder.asked.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_chat_undecodable_body_is_internal_error() {
    let app = build_test_router(Arc::default());

    let response = app.oneshot(chat_request("message=hi")).await.unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = json_body(response).await;
    assert_eq!(json["error"], "Internal server error");
}

#[tokio::test]
async fn test_chat_requires_post() {
    let app = build_test_router(Arc::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/chat")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let app = build_test_router(Arc::default());

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .header(header::ORIGIN, "http://widget.example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn test_static_files_fall_back_to_index() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>chat</h1>").unwrap();
    std::fs::write(dir.path().join("script.js"), "console.log('hi');").unwrap();

    let app = ApiServer::new(Arc::new(EchoResponder::default()), 0)
        .static_dir(Some(dir.path().to_path_buf()))
        .router();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/script.js")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"console.log('hi');");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/some/client/route")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"<h1>chat</h1>");
}
