#![cfg(feature = "server")]

// HTTP routes over an in-memory snapshot

use std::sync::Arc;
use std::time::Duration;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use membership_metrics::api::{self, AppState};
use membership_metrics::store::Document;
use membership_metrics::{DocumentStore, Filter, MemoryStore, MetricsEngine};

const SNAPSHOT: &str = include_str!("fixtures/snapshot.json");

fn app() -> Router {
    let store = MemoryStore::from_dump(SNAPSHOT).expect("load snapshot");
    api::router(AppState::new(
        MetricsEngine::new(Arc::new(store)),
        Duration::from_secs(5),
    ))
}

async fn get(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap();
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let (status, body) = get(app(), "/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], "OK");
}

#[tokio::test]
async fn test_month_summary() {
    let (status, body) = get(app(), "/api/summary/GymA/03-2023").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["new_members"], 1);
    assert_eq!(body["data"]["active_members"], 1);
    assert_eq!(body["data"]["active_members_variation"], 0.0);
}

#[tokio::test]
async fn test_collections_routes() {
    let (status, body) = get(app(), "/api/collections/summary/GymA/03-2023").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["signup_collected"], 3000);
    assert_eq!(body["data"]["total_collected"], 3000);
    assert_eq!(body["data"]["recurring_collected"], 0);

    let (status, body) = get(app(), "/api/collections/GymA/03-2023").await;
    assert_eq!(status, StatusCode::OK);
    let days = body["data"].as_array().expect("daily rows");
    assert_eq!(days.len(), 2);
    assert_eq!(days[0]["date"], "2023-03-05");
    assert_eq!(days[0]["new_signup_total"], 1000);
    assert_eq!(days[1]["date"], "2023-03-20");
}

#[tokio::test]
async fn test_revenue_share() {
    let (status, body) = get(app(), "/api/revenue-share/GymA/03-2023").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["by_cadence"]["monthly"], 100.0);
    assert_eq!(body["data"]["by_cadence"]["annual"], 0.0);
    assert_eq!(body["data"]["by_tier"]["total"], 0.0);
}

#[tokio::test]
async fn test_malformed_month_is_bad_request() {
    for uri in ["/api/summary/GymA/13-2023", "/api/collections/GymA/2023-03", "/api/revenue-share/GymA/3-23"] {
        let (status, body) = get(app(), uri).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{}", uri);
        assert_eq!(body["success"], false);
    }
}

#[tokio::test]
async fn test_empty_reports_are_not_found() {
    for uri in [
        "/api/summary/Nobody/03-2023",
        "/api/collections/GymC/03-2023",
        "/api/collections/summary/GymC/03-2023",
        "/api/revenue-share/GymA/01-2020",
    ] {
        let (status, body) = get(app(), uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body["error"], api::NO_DATA);
    }
}

/// Store that takes longer than any request is allowed to.
struct SlowStore;

impl DocumentStore for SlowStore {
    fn find(&self, _collection: &str, _filter: &Filter) -> anyhow::Result<Vec<Document>> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_slow_report_times_out() {
    let app = api::router(AppState::new(
        MetricsEngine::new(Arc::new(SlowStore)),
        Duration::from_millis(50),
    ));

    let (status, body) = get(app, "/api/summary/GymA/03-2023").await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["success"], false);
}
