//! HTTP surface for the server registry.
//!
//! Thin axum handlers over [`crate::registry::services::RegistryService`]:
//! they decode paths and bodies, enforce the bearer-token boundary, run the
//! pure status-transition validation, and map workflow errors onto HTTP
//! statuses. All registry semantics live below this layer.

mod auth;
mod error;
mod handlers;
mod router;
mod types;

pub use error::{ApiError, ErrorBody};
pub use router::{router, AppState};
pub use types::{
    AllVersionsStatusResponse, ListMetadata, RegistryExtensions, ResponseMeta,
    ServerListResponse, ServerResponse, StatusUpdateBody,
};
