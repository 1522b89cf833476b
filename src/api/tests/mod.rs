use super::*;
use crate::downloader::test_helpers::{
    MockSource, collect_events, create_test_downloader_with, mock_photos,
};
use crate::types::JobId;
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response, StatusCode};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;


/// Router over a mock source, plus the downloader behind it
async fn test_app_with(
    source: MockSource,
    adjust: impl FnOnce(&mut Config),
) -> (Router, Arc<PhotoDownloader>, tempfile::TempDir) {
    let (downloader, temp_dir) = create_test_downloader_with(Arc::new(source), adjust).await;
    let downloader = Arc::new(downloader);
    let app = create_router(downloader.clone(), downloader.config.clone());
    (app, downloader, temp_dir)
}

async fn test_app(source: MockSource) -> (Router, Arc<PhotoDownloader>, tempfile::TempDir) {
    test_app_with(source, |_| {}).await
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn put_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("PUT")
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn search_body(count: u32) -> Value {
    json!({ "kind": "search", "text": "lighthouse", "count": count })
}

/// Submit a search job through the router and wait for it to finish
async fn submit_and_wait(app: &Router, downloader: &PhotoDownloader, count: u32) -> String {
    let response = app
        .clone()
        .oneshot(post_json("/jobs", search_body(count)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let job_id = body_json(response).await["job_id"]
        .as_str()
        .unwrap()
        .to_string();

    collect_events(downloader, &JobId::from(job_id.as_str())).await;
    job_id
}

#[tokio::test]
async fn test_api_server_spawns() {
    let (_app, downloader, _temp_dir) = test_app(MockSource::new()).await;

    let mut config = (*downloader.config).clone();
    config.server.api.bind_address = "127.0.0.1:0".parse().unwrap();
    let config = Arc::new(config);

    let api_handle = tokio::spawn({
        let downloader = downloader.clone();
        async move { start_api_server(downloader, config).await }
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(!api_handle.is_finished(), "server should still be running");
    api_handle.abort();
}

#[tokio::test]
async fn test_bind_failure_is_reported() {
    let (_app, downloader, _temp_dir) = test_app(MockSource::new()).await;

    let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let mut config = (*downloader.config).clone();
    config.server.api.bind_address = occupied.local_addr().unwrap();

    let result = start_api_server(downloader, Arc::new(config)).await;
    assert!(matches!(result, Err(crate::Error::Io(_))));
}

#[tokio::test]
async fn test_cors_enabled() {
    let (app, _downloader, _temp_dir) = test_app(MockSource::new()).await;

    let request = Request::builder()
        .uri("/health")
        .header("Origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .contains_key("access-control-allow-origin"),
        "CORS header should be present when CORS is enabled"
    );
}

#[tokio::test]
async fn test_cors_restricted_origins() {
    let (app, _downloader, _temp_dir) = test_app_with(MockSource::new(), |config| {
        config.server.api.cors_origins = vec!["http://allowed.test".into()];
    })
    .await;

    let request = |origin: &str| {
        Request::builder()
            .uri("/health")
            .header("Origin", origin)
            .body(Body::empty())
            .unwrap()
    };

    let allowed = app.clone().oneshot(request("http://allowed.test")).await.unwrap();
    assert_eq!(
        allowed.headers()["access-control-allow-origin"],
        "http://allowed.test"
    );

    let other = app.oneshot(request("http://elsewhere.test")).await.unwrap();
    assert!(!other.headers().contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_rate_limit_applies_to_submissions() {
    let (app, _downloader, _temp_dir) = test_app_with(
        MockSource::new().with_photos(mock_photos(1)),
        |config| {
            config.server.api.rate_limit.enabled = true;
            config.server.api.rate_limit.requests_per_second = 1;
            config.server.api.rate_limit.burst_size = 1;
            config.server.api.rate_limit.exempt_ips = vec![];
        },
    )
    .await;

    let client = std::net::SocketAddr::from(([10, 1, 2, 3], 50000));
    let preview = || {
        let mut request = post_json("/preview", search_body(1));
        request.extensions_mut().insert(ConnectInfo(client));
        request
    };

    let first = app.clone().oneshot(preview()).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app.clone().oneshot(preview()).await.unwrap();
    assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(second.headers().contains_key("retry-after"));
    assert_eq!(body_json(second).await["error"]["code"], "rate_limited");

    // health stays reachable
    let mut health = get("/health");
    health.extensions_mut().insert(ConnectInfo(client));
    assert_eq!(app.oneshot(health).await.unwrap().status(), StatusCode::OK);
}
