use std::net::SocketAddr;
use std::sync::Arc;

use admission_gateway::build_router;
use admission_gateway::clock::ManualClock;
use admission_gateway::config::LimiterConfig;
use admission_gateway::key::KeySource;
use admission_gateway::models::{AdmissionResponse, BucketResponse};
use admission_gateway::rate_limit::Limiter;
use admission_gateway::state::AppState;
use reqwest::{Client, StatusCode};
use serde_json::Value;

struct TestApp {
    base_url: String,
    clock: Arc<ManualClock>,
}

async fn spawn_app(max_tokens: u32, rate: f64, guard: Option<LimiterConfig>) -> TestApp {
    let clock = Arc::new(ManualClock::new());
    let limiter = Limiter::with_clock(LimiterConfig::new(max_tokens, rate), clock.clone())
        .expect("valid limiter config");
    let guard = guard.map(|config| {
        Arc::new(
            Limiter::with_clock(config, clock.clone())
                .expect("valid guard config")
                .with_name("guard"),
        )
    });
    let state = Arc::new(AppState::new(Arc::new(limiter), guard, KeySource::PeerIp));

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    TestApp {
        base_url: format!("http://{}", addr),
        clock,
    }
}

async fn check(app: &TestApp, key: &str) -> reqwest::Response {
    Client::new()
        .post(format!("{}/api/admission/check", app.base_url))
        .json(&serde_json::json!({ "key": key }))
        .send()
        .await
        .expect("request failed")
}

async fn decision(app: &TestApp, key: &str) -> AdmissionResponse {
    let res = check(app, key).await;
    assert_eq!(res.status(), StatusCode::OK);
    res.json().await.expect("decision body")
}

#[tokio::test]
async fn health_reports_tracked_buckets() {
    let app = spawn_app(5, 1.0, None).await;
    decision(&app, "student-1").await;

    let body: Value = Client::new()
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["trackedBuckets"], 1);
}

#[tokio::test]
async fn burst_is_allowed_then_denied_then_refilled() {
    let app = spawn_app(5, 1.0, None).await;

    for _ in 0..5 {
        assert_eq!(
            decision(&app, "10.1.1.1").await,
            AdmissionResponse {
                allowed: true,
                retry_after_seconds: None
            }
        );
    }

    let denied = decision(&app, "10.1.1.1").await;
    assert!(!denied.allowed);
    let retry = denied.retry_after_seconds.expect("retry guidance");
    assert!((retry - 1.0).abs() < 1e-6, "retry after was {retry}");

    app.clock.advance_secs(1.0);
    assert!(decision(&app, "10.1.1.1").await.allowed);
}

#[tokio::test]
async fn exhausting_one_key_leaves_others_alone() {
    let app = spawn_app(1, 0.5, None).await;

    assert!(decision(&app, "alice").await.allowed);
    assert!(!decision(&app, "alice").await.allowed);
    assert!(decision(&app, "bob").await.allowed);
}

#[tokio::test]
async fn empty_key_is_bad_request() {
    let app = spawn_app(5, 1.0, None).await;

    let res = check(&app, "").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("empty"));
}

#[tokio::test]
async fn bucket_inspection() {
    let app = spawn_app(4, 2.0, None).await;
    let url = format!("{}/api/admission/buckets/carol", app.base_url);

    let res = Client::new().get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    decision(&app, "carol").await;
    decision(&app, "carol").await;
    app.clock.advance_secs(0.5);

    let res = Client::new().get(&url).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let bucket: BucketResponse = res.json().await.unwrap();
    assert_eq!(bucket.key, "carol");
    assert_eq!(bucket.max_tokens, 4);
    assert!((bucket.tokens - 3.0).abs() < 1e-6);
    assert!((bucket.idle_seconds - 0.5).abs() < 1e-6);
}

#[tokio::test]
async fn guard_rejects_with_retry_after() {
    let app = spawn_app(100, 1.0, Some(LimiterConfig::new(2, 0.5))).await;

    assert_eq!(check(&app, "k").await.status(), StatusCode::OK);
    assert_eq!(check(&app, "k").await.status(), StatusCode::OK);

    let res = check(&app, "k").await;
    assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(res.headers()["retry-after"], "2");
    let body: Value = res.json().await.unwrap();
    assert!((body["retryAfterSeconds"].as_f64().unwrap() - 2.0).abs() < 1e-6);

    // Ungated routes still answer
    let res = Client::new()
        .get(format!("{}/health", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    app.clock.advance_secs(2.0);
    assert_eq!(check(&app, "k").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn metrics_are_exposed() {
    let app = spawn_app(5, 1.0, None).await;
    decision(&app, "metrics-probe").await;

    let res = Client::new()
        .get(format!("{}/metrics", app.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let text = res.text().await.unwrap();
    assert!(text.contains("admission_checks_total"));
    assert!(text.contains("admission_allowed_total"));
}
