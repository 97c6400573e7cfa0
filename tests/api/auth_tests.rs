//! Authorization ladder tests: 422 for a missing header, 401 for a
//! malformed or unknown bearer, 403 for insufficient permissions.

use axum::http::{header, Method, Request, StatusCode};
use axum::body::Body;
use serde_json::json;

use crate::api::helpers::{
    build_app, error_message, get, json_request, send, EDITOR_TOKEN, OUTSIDER_TOKEN,
    PUBLISHER_TOKEN,
};
use crate::test_helpers::descriptor;

const NAME: &str = "io.github.testuser/my-server";
const STATUS_URI: &str = "/v0/servers/io.github.testuser%2Fmy-server/versions/1.0.0/status";

async fn seeded_app() -> crate::api::helpers::TestApp {
    let app = build_app();
    app.service
        .publish(descriptor(NAME, "1.0.0"))
        .await
        .expect("seed publish");
    app
}

#[tokio::test]
async fn missing_authorization_header_is_unprocessable() {
    let app = seeded_app().await;

    let request = Request::builder()
        .method(Method::PATCH)
        .uri(STATUS_URI)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"status": "deprecated"}"#))
        .expect("request");
    let (status, body) = send(&app.app, request).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error_message(&body), "Authorization header is required");
}

#[tokio::test]
async fn non_bearer_authorization_is_unauthorized() {
    let app = seeded_app().await;

    let request = Request::builder()
        .method(Method::PATCH)
        .uri(STATUS_URI)
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, "Basic dXNlcjpwYXNz")
        .body(Body::from(r#"{"status": "deprecated"}"#))
        .expect("request");
    let (status, body) = send(&app.app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        error_message(&body),
        "Invalid Authorization header format. Expected 'Bearer <token>'"
    );
}

#[tokio::test]
async fn unknown_token_is_unauthorized() {
    let app = seeded_app().await;

    let (status, body) = send(
        &app.app,
        json_request(
            Method::PATCH,
            STATUS_URI,
            Some("no-such-token"),
            &json!({"status": "deprecated"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(error_message(&body), "Invalid or expired token");
}

#[tokio::test]
async fn token_failures_surface_before_not_found() {
    let app = build_app();

    let (status, _) = send(
        &app.app,
        json_request(
            Method::PATCH,
            "/v0/servers/io.github.testuser%2Fghost/versions/1.0.0/status",
            Some("no-such-token"),
            &json!({"status": "deprecated"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn foreign_namespace_token_is_forbidden() {
    let app = seeded_app().await;

    let (status, body) = send(
        &app.app,
        json_request(
            Method::PATCH,
            STATUS_URI,
            Some(OUTSIDER_TOKEN),
            &json!({"status": "deprecated"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        error_message(&body),
        "You do not have publish or edit permissions for this server"
    );
}

#[tokio::test]
async fn publish_requires_publish_permission() {
    let app = build_app();

    let (status, body) = send(
        &app.app,
        json_request(
            Method::POST,
            "/v0/servers",
            Some(EDITOR_TOKEN),
            &serde_json::to_value(descriptor(NAME, "1.0.0")).expect("descriptor json"),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        error_message(&body),
        "You do not have publish permissions for this server"
    );
}

#[tokio::test]
async fn edit_permission_suffices_for_status_changes() {
    let app = seeded_app().await;

    let (status, _) = send(
        &app.app,
        json_request(
            Method::PATCH,
            STATUS_URI,
            Some(EDITOR_TOKEN),
            &json!({"status": "deprecated", "statusMessage": "sunset"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn reads_require_no_token() {
    let app = seeded_app().await;

    let (status, _) = send(
        &app.app,
        get("/v0/servers/io.github.testuser%2Fmy-server"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (health_status, health_body) = send(&app.app, get("/health")).await;
    assert_eq!(health_status, StatusCode::OK);
    assert_eq!(health_body, json!({"status": "ok"}));
}

#[tokio::test]
async fn publisher_token_passes_the_ladder() {
    let app = seeded_app().await;

    let (status, _) = send(
        &app.app,
        json_request(
            Method::PATCH,
            STATUS_URI,
            Some(PUBLISHER_TOKEN),
            &json!({"status": "deprecated"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
}
