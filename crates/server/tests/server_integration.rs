//! Integration tests for the fulfillment server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{Duration, Utc};
use common::UserId;
use document_store::InMemoryDocumentStore;
use domain::{CouponEngine, DiscountRule, Money, NewCoupon};
use fulfillment::Topic;
use metrics_exporter_prometheus::PrometheusHandle;
use server::AppState;
use server::config::Config;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, Arc<AppState<InMemoryDocumentStore>>) {
    let state = server::create_default_state(
        InMemoryDocumentStore::new(),
        "memory",
        &Config::default(),
    );
    let app = server::create_app(state.clone(), get_metrics_handle());
    (app, state)
}

async fn get(app: axum::Router, uri: &str) -> (StatusCode, Vec<u8>) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, body.to_vec())
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup();

    let (status, body) = get(app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["backend"], "memory");
    assert_eq!(json["live_topics"], 0);
}

#[tokio::test]
async fn test_health_reports_subscribed_topics() {
    let (app, state) = setup();
    let _subscription = state
        .core
        .broadcaster()
        .subscribe(Topic::Customer(UserId::new()));

    let (_, body) = get(app, "/health").await;

    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["live_topics"], 1);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn test_metrics_include_core_counters() {
    let (app, state) = setup();
    let now = Utc::now();
    let coupons = state.core.coupons();
    coupons
        .issue(NewCoupon {
            code: "WELCOME".to_string(),
            name: "Welcome".to_string(),
            description: None,
            discount: DiscountRule::Fixed {
                amount: Money::from_euros(3),
            },
            min_order_amount: Money::zero(),
            applicable_stores: vec![],
            starts_at: now - Duration::days(1),
            ends_at: now + Duration::days(7),
            usage_limit: 10,
        })
        .await
        .unwrap();

    state
        .core
        .claim_coupon(
            UserId::new(),
            CouponEngine::<InMemoryDocumentStore>::coupon_id("WELCOME"),
        )
        .await
        .unwrap();

    let (status, body) = get(app, "/metrics").await;

    assert_eq!(status, StatusCode::OK);
    let text = String::from_utf8(body).unwrap();
    assert!(text.contains("coupon_claims_total"));
}

#[tokio::test]
async fn test_unknown_route_is_not_found() {
    let (app, _) = setup();

    let (status, _) = get(app, "/orders").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}
