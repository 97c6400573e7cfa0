//! Authorization boundary.
//!
//! Token issuance and signature verification live outside this crate; the
//! registry consumes them through [`TokenVerifier`]. What the registry does
//! own is the permission model: verified tokens carry `(action, pattern)`
//! grants, and the pure matcher below decides whether a grant covers a
//! given server name.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Action a permission grants on matching server names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    /// Create new versions.
    Publish,
    /// Modify existing versions and their status.
    Edit,
}

/// One `(action, pattern)` grant carried by a verified token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    /// Granted action.
    pub action: PermissionAction,
    /// Server-name pattern the grant covers: an exact name, a
    /// `namespace/*` wildcard, or `*` for everything.
    #[serde(rename = "resourcePattern")]
    pub resource_pattern: String,
}

/// Claims extracted from a verified bearer token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Authenticated principal.
    pub subject: String,
    /// Grants carried by the token.
    #[serde(default)]
    pub permissions: Vec<Permission>,
}

impl TokenClaims {
    /// Reports whether the claims grant `action` on `server_name`.
    #[must_use]
    pub fn allows(&self, action: PermissionAction, server_name: &str) -> bool {
        self.permissions
            .iter()
            .any(|p| p.action == action && pattern_matches(&p.resource_pattern, server_name))
    }
}

/// Matches a resource pattern against a server name.
///
/// `*` covers every name; `prefix/*` covers names under the prefix;
/// anything else requires exact equality.
#[must_use]
pub fn pattern_matches(pattern: &str, server_name: &str) -> bool {
    if pattern == "*" {
        return true;
    }
    if let Some(prefix) = pattern.strip_suffix("/*") {
        return server_name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('/'));
    }
    pattern == server_name
}

/// Errors returned by token verification.
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    /// The token failed verification or has expired.
    #[error("invalid or expired token")]
    InvalidToken,

    /// The verifier itself failed (key fetch, upstream identity service).
    #[error("token verification failed: {0}")]
    Internal(Arc<dyn std::error::Error + Send + Sync>),
}

impl AuthError {
    /// Wraps a verifier infrastructure failure.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(Arc::new(err))
    }
}

/// Port for bearer-token verification.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verifies a bearer token and returns its claims.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InvalidToken`] for tokens that fail
    /// verification and [`AuthError::Internal`] when verification cannot
    /// run.
    async fn verify(&self, token: &str) -> Result<TokenClaims, AuthError>;
}
