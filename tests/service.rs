//! Reply service client integration tests
//!
//! Runs the HTTP client against a local axum server

use axum::{Json, Router, http::StatusCode, routing::post};
use sage_voice::config::ServiceConfig;
use sage_voice::{ErrorKind, HttpResponseService, ResponseService, ServiceError};
use serde_json::{Value, json};

/// Serve `router` on an ephemeral port and return its base URL
async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    format!("http://{addr}/")
}

fn client(url: &str) -> HttpResponseService {
    HttpResponseService::new(&ServiceConfig::new(url).unwrap()).unwrap()
}

async fn echo(Json(body): Json<Value>) -> Json<Value> {
    let text = body["text"].as_str().unwrap_or_default();
    Json(json!({ "response": format!("you said: {text}") }))
}

#[tokio::test]
async fn test_successful_reply() {
    let url = spawn_server(Router::new().route("/", post(echo))).await;

    let reply = client(&url).submit("hello").await.unwrap();

    assert_eq!(reply.response, "you said: hello");
}

#[tokio::test]
async fn test_error_status_carries_detail() {
    let router = Router::new().route(
        "/",
        post(|| async {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "response": "I didn't understand your input." })),
            )
        }),
    );
    let url = spawn_server(router).await;

    let err = client(&url).submit("hello").await.unwrap_err();

    assert_eq!(
        err,
        ServiceError::NonSuccessStatus {
            code: 500,
            detail: Some("I didn't understand your input.".to_string()),
        }
    );
    assert_eq!(err.kind(), ErrorKind::ServiceUnreachable);
}

#[tokio::test]
async fn test_error_status_without_body() {
    let router = Router::new().route("/", post(|| async { StatusCode::BAD_GATEWAY }));
    let url = spawn_server(router).await;

    let err = client(&url).submit("hello").await.unwrap_err();

    assert_eq!(
        err,
        ServiceError::NonSuccessStatus {
            code: 502,
            detail: None,
        }
    );
}

#[tokio::test]
async fn test_malformed_body() {
    let router = Router::new().route("/", post(|| async { "not json" }));
    let url = spawn_server(router).await;

    let err = client(&url).submit("hello").await.unwrap_err();

    assert!(matches!(err, ServiceError::MalformedBody(_)));
    assert_eq!(err.kind(), ErrorKind::InvalidReply);
}

#[tokio::test]
async fn test_reply_missing_response_field() {
    let router = Router::new().route("/", post(|| async { Json(json!({ "answer": "hi" })) }));
    let url = spawn_server(router).await;

    let err = client(&url).submit("hello").await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::InvalidReply);
}

#[tokio::test]
async fn test_unreachable_service() {
    // Bind then drop to get a port nothing listens on
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{addr}/"))
        .submit("hello")
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::NetworkFailure(_)));
    assert_eq!(err.kind(), ErrorKind::ServiceUnreachable);
}
