//! Health endpoint tests.

use axum::{body::Body, http::{Request, StatusCode}};
use switchhook_testing::TestApp;

fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn liveness_reports_alive() {
    let app = TestApp::new();

    let response = app.send(get("/health/live")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "alive");
    assert_eq!(response.body["service"], "switchhook");
    assert_eq!(response.body["timestamp"], "2023-11-14T22:13:20Z");
}

#[tokio::test]
async fn readiness_is_healthy_when_storage_answers() {
    let app = TestApp::new();

    let response = app.send(get("/health/ready")).await;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "healthy");
    assert_eq!(response.body["storage"], "up");
    assert_eq!(response.body["timestamp"], "2023-11-14T22:13:20Z");
}

#[tokio::test]
async fn readiness_fails_when_storage_is_down() {
    // Arrange
    let app = TestApp::new();
    app.repository.set_healthy(false);

    // Act
    let response = app.send(get("/health/ready")).await;

    // Assert
    assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.body["status"], "unhealthy");
    assert_eq!(response.body["storage"], "down");
}
