//! Status endpoint tests: transition rules, exact rejection messages,
//! URL-encoded keys, and the bulk endpoint.

use axum::http::{Method, StatusCode};
use serde_json::json;

use crate::api::helpers::{
    build_app, error_message, json_request, send, TestApp, PUBLISHER_TOKEN,
};
use crate::test_helpers::descriptor;

const NAME: &str = "io.github.testuser/my-server";
const STATUS_URI: &str = "/v0/servers/io.github.testuser%2Fmy-server/versions/1.0.0/status";
const BULK_URI: &str = "/v0/servers/io.github.testuser%2Fmy-server/status";

async fn seeded_app() -> TestApp {
    let app = build_app();
    app.service
        .publish(descriptor(NAME, "1.0.0"))
        .await
        .expect("seed publish");
    app
}

#[tokio::test]
async fn noop_transition_is_rejected() {
    let app = seeded_app().await;

    let (status, body) = send(
        &app.app,
        json_request(
            Method::PATCH,
            STATUS_URI,
            Some(PUBLISHER_TOKEN),
            &json!({"status": "active"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "No changes to apply: status and message are already set to the provided values"
    );
}

#[tokio::test]
async fn message_on_active_is_rejected() {
    let app = seeded_app().await;

    let (status, body) = send(
        &app.app,
        json_request(
            Method::PATCH,
            STATUS_URI,
            Some(PUBLISHER_TOKEN),
            &json!({"status": "active", "statusMessage": "x"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "status_message cannot be provided when setting status to active"
    );
}

#[tokio::test]
async fn unknown_status_token_is_rejected() {
    let app = seeded_app().await;

    let (status, body) = send(
        &app.app,
        json_request(
            Method::PATCH,
            STATUS_URI,
            Some(PUBLISHER_TOKEN),
            &json!({"status": "resurrected"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "Invalid status: resurrected. Must be one of: active, deprecated, deleted"
    );
}

#[tokio::test]
async fn message_only_update_succeeds_and_keeps_status_changed_at() {
    let app = seeded_app().await;
    app.clock.advance_seconds(10);

    let (status, first) = send(
        &app.app,
        json_request(
            Method::PATCH,
            STATUS_URI,
            Some(PUBLISHER_TOKEN),
            &json!({"status": "deprecated", "statusMessage": "old"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let first_meta = &first["_meta"]["io.modelcontextprotocol.registry/official"];
    let changed_at = first_meta["statusChangedAt"].clone();

    app.clock.advance_seconds(10);
    let (status, second) = send(
        &app.app,
        json_request(
            Method::PATCH,
            STATUS_URI,
            Some(PUBLISHER_TOKEN),
            &json!({"status": "deprecated", "statusMessage": "new"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let second_meta = &second["_meta"]["io.modelcontextprotocol.registry/official"];
    assert_eq!(second_meta["statusMessage"], json!("new"));
    assert_eq!(second_meta["statusChangedAt"], changed_at);
    assert_ne!(second_meta["updatedAt"], first_meta["updatedAt"]);
}

#[tokio::test]
async fn unknown_version_is_not_found() {
    let app = seeded_app().await;

    let (status, body) = send(
        &app.app,
        json_request(
            Method::PATCH,
            "/v0/servers/io.github.testuser%2Fmy-server/versions/9.9.9/status",
            Some(PUBLISHER_TOKEN),
            &json!({"status": "deprecated"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_message(&body), "Server version not found");
}

#[tokio::test]
async fn url_encoded_name_and_version_are_decoded_once() {
    let app = build_app();
    app.service
        .publish(descriptor(NAME, "1.0.0+20130313144700"))
        .await
        .expect("seed publish");

    let uri = "/v0/servers/io.github.testuser%2Fmy-server/versions/1.0.0%2B20130313144700/status";
    let (status, body) = send(
        &app.app,
        json_request(
            Method::PATCH,
            uri,
            Some(PUBLISHER_TOKEN),
            &json!({"status": "deprecated", "statusMessage": "build metadata works"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["server"]["version"], json!("1.0.0+20130313144700"));
}

#[tokio::test]
async fn bulk_noop_is_rejected_with_the_bulk_message() {
    let app = build_app();
    for version in ["1.0.0", "1.1.0", "2.0.0"] {
        app.service
            .publish(descriptor(NAME, version))
            .await
            .expect("seed publish");
        app.clock.advance_seconds(1);
    }

    let (status, body) = send(
        &app.app,
        json_request(
            Method::PATCH,
            BULK_URI,
            Some(PUBLISHER_TOKEN),
            &json!({"status": "active"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "No changes to apply: all versions already have the requested status and message"
    );
}

#[tokio::test]
async fn bulk_update_reports_every_updated_version() {
    let app = build_app();
    for version in ["1.0.0", "1.1.0", "2.0.0"] {
        app.service
            .publish(descriptor(NAME, version))
            .await
            .expect("seed publish");
        app.clock.advance_seconds(1);
    }

    let (status, body) = send(
        &app.app,
        json_request(
            Method::PATCH,
            BULK_URI,
            Some(PUBLISHER_TOKEN),
            &json!({"status": "deprecated", "statusMessage": "end of life"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["updatedCount"], json!(3));
    let servers = body["servers"].as_array().expect("servers array");
    assert_eq!(servers.len(), 3);
    for server in servers {
        let meta = &server["_meta"]["io.modelcontextprotocol.registry/official"];
        assert_eq!(meta["status"], json!("deprecated"));
        assert_eq!(meta["statusMessage"], json!("end of life"));
    }
}

#[tokio::test]
async fn bulk_update_of_unknown_server_is_not_found() {
    let app = build_app();

    let (status, body) = send(
        &app.app,
        json_request(
            Method::PATCH,
            "/v0/servers/io.github.testuser%2Fghost/status",
            Some(PUBLISHER_TOKEN),
            &json!({"status": "deleted"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(error_message(&body), "Server not found");
}
