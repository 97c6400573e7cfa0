//! Shared fixtures for HTTP-level tests.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tower::ServiceExt;

use palladio::api::{router, AppState};
use palladio::registry::adapters::{
    InMemoryServerStore, StandardDescriptorValidator, StaticTokenVerifier,
};
use palladio::registry::ports::{Permission, PermissionAction, TokenClaims};
use palladio::registry::services::RegistryService;

use crate::test_helpers::StepClock;

/// Token holding publish and edit on `io.github.testuser/*`.
pub const PUBLISHER_TOKEN: &str = "publisher-token";
/// Token holding edit only on `io.github.testuser/*`.
pub const EDITOR_TOKEN: &str = "editor-token";
/// Token scoped to an unrelated namespace.
pub const OUTSIDER_TOKEN: &str = "outsider-token";

/// Registry service type used by the HTTP tests.
pub type TestService =
    RegistryService<InMemoryServerStore, StandardDescriptorValidator, StepClock>;

/// Router under test plus the handles used to seed and steer it.
pub struct TestApp {
    /// Router under test.
    pub app: Router,
    /// Service sharing the router's store, for seeding.
    pub service: TestService,
    /// Clock shared with the service.
    pub clock: Arc<StepClock>,
}

/// Builds the app with the in-memory store and a static token table.
pub fn build_app() -> TestApp {
    let clock = Arc::new(StepClock::new());
    let service = RegistryService::new(
        Arc::new(InMemoryServerStore::new()),
        Arc::new(StandardDescriptorValidator::new()),
        Arc::clone(&clock),
    );

    let mut verifier = StaticTokenVerifier::new();
    verifier.insert(
        PUBLISHER_TOKEN,
        claims(
            "testuser",
            &[
                (PermissionAction::Publish, "io.github.testuser/*"),
                (PermissionAction::Edit, "io.github.testuser/*"),
            ],
        ),
    );
    verifier.insert(
        EDITOR_TOKEN,
        claims("editor", &[(PermissionAction::Edit, "io.github.testuser/*")]),
    );
    verifier.insert(
        OUTSIDER_TOKEN,
        claims(
            "outsider",
            &[
                (PermissionAction::Publish, "io.github.outsider/*"),
                (PermissionAction::Edit, "io.github.outsider/*"),
            ],
        ),
    );

    let app = router(
        "/v0",
        AppState {
            registry: service.clone(),
            verifier: Arc::new(verifier),
        },
    );
    TestApp {
        app,
        service,
        clock,
    }
}

fn claims(subject: &str, grants: &[(PermissionAction, &str)]) -> TokenClaims {
    TokenClaims {
        subject: subject.to_owned(),
        permissions: grants
            .iter()
            .map(|(action, pattern)| Permission {
                action: *action,
                resource_pattern: (*pattern).to_owned(),
            })
            .collect(),
    }
}

/// Sends a request and returns the status plus the parsed JSON body.
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.expect("request");
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read body")
        .to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("json body")
    };
    (status, body)
}

/// Builds a GET request.
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

/// Builds a JSON request with an optional bearer token.
pub fn json_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: &Value,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(serde_json::to_vec(body).expect("serialize body")))
        .expect("request")
}

/// Extracts the `error` field of an error body.
pub fn error_message(body: &Value) -> &str {
    body.get("error")
        .and_then(Value::as_str)
        .expect("error body")
}
