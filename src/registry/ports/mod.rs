//! Port contracts for the server registry.
//!
//! Ports define infrastructure-agnostic interfaces used by registry
//! services and the HTTP surface.

pub mod auth;
pub mod store;
pub mod validator;

pub use auth::{AuthError, Permission, PermissionAction, TokenClaims, TokenVerifier};
pub use store::{
    PageCursor, ServerFilter, ServerPage, ServerStore, StoreError, StoreResult, StoreTx,
    DEFAULT_PAGE_LIMIT,
};
pub use validator::{DescriptorValidator, ValidatorError, ValidatorResult};
