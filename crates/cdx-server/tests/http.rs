use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use cdx_server::state::AppState;
use cdx_server::startup::build_app;
use cdx_store::DataStore;

fn test_app() -> (tempfile::TempDir, axum::Router) {
    let dir = tempfile::tempdir().unwrap();
    let store = DataStore::open(dir.path(), None).unwrap();
    let state = AppState::new(Arc::new(store), None);
    (dir, build_app(state))
}

#[tokio::test]
async fn health_check_returns_200() {
    let (_dir, app) = test_app();
    let response = app
        .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn ingest_then_query_round_trips_a_capture() {
    let (_dir, app) = test_app();

    let line = "org,example)/ - 20200101000000 http://example.org/ text/html 200 sha1:AAA - - 1234 5678 file.warc.gz";
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/collections/test")
                .body(Body::from(line.to_owned()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/collections/test?url=http://example.org/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = String::from_utf8(body.to_vec()).unwrap();
    assert!(body.contains("sha1:AAA"));
}

#[tokio::test]
async fn query_against_unknown_collection_is_404() {
    let (_dir, app) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/collections/missing?url=http://example.org/")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
