//! Listing endpoint tests: filters, visibility toggles, incremental sync,
//! and cursor pagination over the wire.

use axum::http::{Method, StatusCode};
use chrono::SecondsFormat;
use serde_json::{json, Value};

use crate::api::helpers::{build_app, error_message, get, json_request, send, TestApp, PUBLISHER_TOKEN};
use crate::test_helpers::descriptor;

async fn seed(app: &TestApp, names: &[(&str, &str)]) {
    for (name, version) in names {
        app.service
            .publish(descriptor(name, version))
            .await
            .expect("seed publish");
        app.clock.advance_seconds(1);
    }
}

fn listed_names(body: &Value) -> Vec<String> {
    body["servers"]
        .as_array()
        .expect("servers array")
        .iter()
        .map(|entry| {
            entry["server"]["name"]
                .as_str()
                .expect("name field")
                .to_owned()
        })
        .collect()
}

#[tokio::test]
async fn deleted_rows_are_hidden_by_default() {
    let app = build_app();
    seed(
        &app,
        &[
            ("io.github.testuser/alpha", "1.0.0"),
            ("io.github.testuser/beta", "1.0.0"),
        ],
    )
    .await;
    send(
        &app.app,
        json_request(
            Method::PATCH,
            "/v0/servers/io.github.testuser%2Falpha/versions/1.0.0/status",
            Some(PUBLISHER_TOKEN),
            &json!({"status": "deleted"}),
        ),
    )
    .await;

    let (status, body) = send(&app.app, get("/v0/servers")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_names(&body), ["io.github.testuser/beta"]);

    let (status, body) = send(&app.app, get("/v0/servers?include_deleted=true")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        listed_names(&body),
        ["io.github.testuser/alpha", "io.github.testuser/beta"]
    );
}

#[tokio::test]
async fn updated_since_returns_strictly_newer_rows_and_implies_deleted() {
    let app = build_app();
    seed(&app, &[("io.github.testuser/early", "1.0.0")]).await;

    let cutoff = app
        .service
        .get_server_by_name("io.github.testuser/early", false)
        .await
        .expect("read early")
        .meta()
        .updated_at;

    app.clock.advance_seconds(60);
    seed(&app, &[("io.github.testuser/late", "1.0.0")]).await;
    send(
        &app.app,
        json_request(
            Method::PATCH,
            "/v0/servers/io.github.testuser%2Flate/versions/1.0.0/status",
            Some(PUBLISHER_TOKEN),
            &json!({"status": "deleted"}),
        ),
    )
    .await;

    let stamp = cutoff.to_rfc3339_opts(SecondsFormat::Micros, true);
    let (status, body) = send(&app.app, get(&format!("/v0/servers?updated_since={stamp}"))).await;

    assert_eq!(status, StatusCode::OK);
    // The deleted row is visible: incremental sync must observe deletions.
    assert_eq!(listed_names(&body), ["io.github.testuser/late"]);
}

#[tokio::test]
async fn malformed_updated_since_is_a_bad_request() {
    let app = build_app();

    let (status, body) = send(&app.app, get("/v0/servers?updated_since=yesterday")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        error_message(&body),
        "updated_since must be an RFC 3339 timestamp"
    );
}

#[tokio::test]
async fn version_latest_restricts_to_flagged_rows() {
    let app = build_app();
    seed(
        &app,
        &[
            ("io.github.testuser/s", "1.0.0"),
            ("io.github.testuser/s", "2.0.0"),
        ],
    )
    .await;

    let (status, body) = send(&app.app, get("/v0/servers?version=latest")).await;
    assert_eq!(status, StatusCode::OK);
    let servers = body["servers"].as_array().expect("servers array");
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0]["server"]["version"], json!("2.0.0"));

    let (status, body) = send(&app.app, get("/v0/servers?version=1.0.0")).await;
    assert_eq!(status, StatusCode::OK);
    let servers = body["servers"].as_array().expect("servers array");
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0]["server"]["version"], json!("1.0.0"));
}

#[tokio::test]
async fn search_filters_by_substring() {
    let app = build_app();
    seed(
        &app,
        &[
            ("io.github.testuser/weather-tool", "1.0.0"),
            ("io.github.testuser/calendar", "1.0.0"),
        ],
    )
    .await;

    let (status, body) = send(&app.app, get("/v0/servers?search=WEATHER")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed_names(&body), ["io.github.testuser/weather-tool"]);
}

#[tokio::test]
async fn limit_out_of_range_is_a_bad_request() {
    let app = build_app();

    for uri in ["/v0/servers?limit=0", "/v0/servers?limit=101"] {
        let (status, body) = send(&app.app, get(uri)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(error_message(&body), "limit must be between 1 and 100");
    }
}

#[tokio::test]
async fn cursor_pagination_never_repeats_rows() {
    let app = build_app();
    for index in 0..5 {
        seed(
            &app,
            &[(format!("io.github.testuser/server-{index}").as_str(), "1.0.0")],
        )
        .await;
    }

    let mut seen: Vec<String> = Vec::new();
    let mut uri = "/v0/servers?limit=2".to_owned();
    loop {
        let (status, body) = send(&app.app, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        for name in listed_names(&body) {
            assert!(!seen.contains(&name), "row {name} emitted twice");
            seen.push(name);
        }
        match body["metadata"]["nextCursor"].as_str() {
            Some(cursor) => uri = format!("/v0/servers?limit=2&cursor={cursor}"),
            None => break,
        }
    }

    assert_eq!(seen.len(), 5);
}
