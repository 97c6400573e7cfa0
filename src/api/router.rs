//! Router assembly and shared handler state.

use axum::routing::{get, patch};
use axum::Router;
use mockable::Clock;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::registry::ports::{DescriptorValidator, ServerStore, TokenVerifier};
use crate::registry::services::RegistryService;

/// Shared state handed to every handler.
pub struct AppState<S, V, C, A>
where
    S: ServerStore,
    V: DescriptorValidator,
    C: Clock + Send + Sync,
    A: TokenVerifier,
{
    /// Registry workflow service.
    pub registry: RegistryService<S, V, C>,
    /// Bearer-token verifier.
    pub verifier: Arc<A>,
}

impl<S, V, C, A> Clone for AppState<S, V, C, A>
where
    S: ServerStore,
    V: DescriptorValidator,
    C: Clock + Send + Sync,
    A: TokenVerifier,
{
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            verifier: Arc::clone(&self.verifier),
        }
    }
}

/// Builds the registry router mounted under `prefix` (e.g. `/v0`).
///
/// The health probe lives outside the prefix; everything else is the
/// versioned API surface.
pub fn router<S, V, C, A>(prefix: &str, state: AppState<S, V, C, A>) -> Router
where
    S: ServerStore + 'static,
    V: DescriptorValidator + 'static,
    C: Clock + Send + Sync + 'static,
    A: TokenVerifier + 'static,
{
    let api = Router::new()
        .route(
            "/servers",
            get(handlers::list_servers::<S, V, C, A>)
                .post(handlers::publish_server::<S, V, C, A>),
        )
        .route("/servers/:name", get(handlers::get_server::<S, V, C, A>))
        .route(
            "/servers/:name/status",
            patch(handlers::update_all_versions_status::<S, V, C, A>),
        )
        .route(
            "/servers/:name/versions",
            get(handlers::list_server_versions::<S, V, C, A>),
        )
        .route(
            "/servers/:name/versions/:version",
            get(handlers::get_server_version::<S, V, C, A>)
                .put(handlers::edit_server::<S, V, C, A>),
        )
        .route(
            "/servers/:name/versions/:version/status",
            patch(handlers::update_server_status::<S, V, C, A>),
        )
        .with_state(state);

    let prefix = normalize_prefix(prefix);
    Router::new()
        .route("/health", get(handlers::health))
        .nest(&prefix, api)
        .layer(TraceLayer::new_for_http())
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_end_matches('/');
    if trimmed.is_empty() {
        "/v0".to_owned()
    } else if trimmed.starts_with('/') {
        trimmed.to_owned()
    } else {
        format!("/{trimmed}")
    }
}
