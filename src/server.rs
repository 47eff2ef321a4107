//! Axum router and server setup.
//! Used by: main.

use std::net::SocketAddr;

use axum::routing::{get, post};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/api/chat", post(handlers::chat::chat))
        .route("/api/unblock", post(handlers::admin::unblock))
        .route("/api/blocked", get(handlers::admin::blocked))
        .route("/api/transcript", get(handlers::transcript::recent))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serves until `shutdown` is cancelled, then drains in-flight requests.
pub async fn run(state: AppState, addr: &str, shutdown: CancellationToken) -> std::io::Result<()> {
    let router = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on {}", addr);
    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::completion::CompletionClient;
    use crate::error::{Error, Result, BACKEND_MESSAGE, BLOCKED_MESSAGE, NOT_BLOCKED_MESSAGE};
    use crate::error::RATE_LIMITED_MESSAGE;
    use crate::handlers::chat::FALLBACK_REPLY;
    use crate::ratelimit::RateLimitConfig;
    use crate::state::{build_test_state, build_test_state_with_limits};

    /// Echoes the user message, or fails / returns nothing on request.
    struct StubCompletion {
        mode: StubMode,
        calls: AtomicUsize,
    }

    enum StubMode {
        Echo,
        Empty,
        Fail,
    }

    impl StubCompletion {
        fn new(mode: StubMode) -> Arc<Self> {
            Arc::new(Self { mode, calls: AtomicUsize::new(0) })
        }
    }

    #[async_trait]
    impl CompletionClient for StubCompletion {
        async fn complete(&self, system: &str, user: &str) -> Result<Option<String>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(!system.is_empty());
            match self.mode {
                StubMode::Echo => Ok(Some(format!("echo: {user}"))),
                StubMode::Empty => Ok(None),
                StubMode::Fail => Err(Error::Backend("upstream 503".into())),
            }
        }
    }

    async fn send(router: &Router, method: &str, uri: &str, ip: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, value)
    }

    async fn chat(router: &Router, ip: &str, message: &str) -> (StatusCode, Value) {
        send(router, "POST", "/api/chat", ip, json!({ "message": message })).await
    }

    fn setup(mode: StubMode) -> (Router, AppState, Arc<StubCompletion>) {
        let stub = StubCompletion::new(mode);
        let state = build_test_state(stub.clone()).unwrap();
        (build_router(state.clone()), state, stub)
    }

    fn load_reference(state: &AppState) {
        state.reference.replace("DigitalStaff automation for business".into());
    }

    #[tokio::test]
    async fn relevant_question_gets_reply() {
        let (router, _, stub) = setup(StubMode::Echo);
        let (status, body) = chat(&router, "1.1.1.1", "What services do you offer?").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], "echo: What services do you offer?");
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sixth_irrelevant_message_is_forbidden() {
        let (router, state, stub) = setup(StubMode::Echo);
        load_reference(&state);

        for _ in 0..5 {
            let (status, _) = chat(&router, "6.6.6.6", "banana").await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = chat(&router, "6.6.6.6", "banana").await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], BLOCKED_MESSAGE);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 5);

        let (status, _) = chat(&router, "6.6.6.6", "How can you help my business?").await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let snapshot = state.metrics.snapshot();
        assert_eq!(snapshot.blocks_added, 1);
        assert_eq!(snapshot.blocked_rejections, 2);
        assert_eq!(snapshot.messages_irrelevant, 5);
    }

    #[tokio::test]
    async fn blocked_client_stays_forbidden_past_rate_limit() {
        let stub = StubCompletion::new(StubMode::Echo);
        let state = build_test_state_with_limits(stub.clone(), RateLimitConfig::default()).unwrap();
        let router = build_router(state.clone());
        load_reference(&state);

        for _ in 0..5 {
            let (status, _) = chat(&router, "6.6.6.6", "banana").await;
            assert_eq!(status, StatusCode::OK);
        }
        for _ in 0..15 {
            let (status, body) = chat(&router, "6.6.6.6", "banana").await;
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(body["error"], BLOCKED_MESSAGE);
        }
        assert_eq!(state.metrics.snapshot().rate_limited, 0);

        for _ in 0..10 {
            let (status, _) = chat(&router, "7.7.7.7", "How can you help?").await;
            assert_eq!(status, StatusCode::OK);
        }
        let (status, body) = chat(&router, "7.7.7.7", "How can you help?").await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body["error"], RATE_LIMITED_MESSAGE);
    }

    #[tokio::test]
    async fn unblock_restores_access() {
        let (router, state, _) = setup(StubMode::Echo);
        load_reference(&state);
        for _ in 0..6 {
            chat(&router, "6.6.6.6", "banana").await;
        }

        let (status, body) = send(&router, "GET", "/api/blocked", "9.9.9.9", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["blocked"], json!(["6.6.6.6"]));

        let (status, body) = send(&router, "POST", "/api/unblock", "9.9.9.9", json!({ "ip": "6.6.6.6" })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "IP 6.6.6.6 unblocked.");

        let (status, _) = chat(&router, "6.6.6.6", "banana").await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn unblock_unknown_ip_is_not_found() {
        let (router, _, _) = setup(StubMode::Echo);
        let (status, body) = send(&router, "POST", "/api/unblock", "9.9.9.9", json!({ "ip": "7.7.7.7" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], NOT_BLOCKED_MESSAGE);
    }

    #[tokio::test]
    async fn backend_failure_is_500_and_leaves_counters() {
        let (router, state, _) = setup(StubMode::Fail);
        let (status, body) = chat(&router, "1.1.1.1", "Tell me about pricing").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], BACKEND_MESSAGE);

        let record = state.gate.store().get("1.1.1.1").unwrap().unwrap();
        assert_eq!(record.total_count, 1);
        assert_eq!(record.irrelevant_count, 0);
        assert!(!state.gate.store().is_blocked("1.1.1.1").unwrap());
        assert_eq!(state.metrics.snapshot().backend_failures, 1);
    }

    #[tokio::test]
    async fn empty_completion_uses_fallback() {
        let (router, _, _) = setup(StubMode::Empty);
        let (status, body) = chat(&router, "1.1.1.1", "How does it work?").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn blank_message_is_rejected_without_counting() {
        let (router, state, stub) = setup(StubMode::Echo);
        let (status, _) = chat(&router, "1.1.1.1", "   ").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(state.gate.store().get("1.1.1.1").unwrap().is_none());
        assert_eq!(stub.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn transcript_records_both_turns() {
        let (router, _, _) = setup(StubMode::Echo);
        chat(&router, "1.1.1.1", "Can you automate invoices?").await;

        let (status, body) = send(&router, "GET", "/api/transcript", "9.9.9.9", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        let entries = body.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0]["role"], "assistant");
        assert_eq!(entries[1]["role"], "user");
        assert_eq!(entries[1]["ip"], "1.1.1.1");
    }

    #[tokio::test]
    async fn health_reports_reference_state() {
        let (router, state, _) = setup(StubMode::Echo);
        let (status, body) = send(&router, "GET", "/health", "9.9.9.9", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reference_loaded"], false);

        load_reference(&state);
        let (_, body) = send(&router, "GET", "/health", "9.9.9.9", Value::Null).await;
        assert_eq!(body["reference_loaded"], true);
    }

    #[tokio::test]
    async fn metrics_endpoint_reports_counters() {
        let (router, _, _) = setup(StubMode::Echo);
        chat(&router, "1.1.1.1", "What do you offer?").await;
        let (status, body) = send(&router, "GET", "/metrics", "9.9.9.9", Value::Null).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["messages_received"], 1);
        assert_eq!(body["completions"], 1);
        assert_eq!(body["blocked_clients"], 0);
    }
}
