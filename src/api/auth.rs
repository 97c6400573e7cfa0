//! Bearer-token extraction and permission checks for mutating endpoints.

use axum::http::{header, HeaderMap};

use super::error::ApiError;
use crate::registry::ports::{PermissionAction, TokenClaims, TokenVerifier};

const BEARER_PREFIX: &str = "Bearer ";

/// Extracts the bearer token from the Authorization header.
///
/// # Errors
///
/// Returns [`ApiError::MissingAuthorization`] when the header is absent and
/// [`ApiError::Unauthorized`] when it does not carry a bearer token.
pub(super) fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let Some(value) = headers.get(header::AUTHORIZATION) else {
        return Err(ApiError::MissingAuthorization);
    };
    let value = value.to_str().map_err(|_| malformed_header())?;
    let prefix = value.get(..BEARER_PREFIX.len()).ok_or_else(malformed_header)?;
    if !prefix.eq_ignore_ascii_case(BEARER_PREFIX) {
        return Err(malformed_header());
    }
    Ok(&value[BEARER_PREFIX.len()..])
}

fn malformed_header() -> ApiError {
    ApiError::Unauthorized("Invalid Authorization header format. Expected 'Bearer <token>'".to_owned())
}

/// Extracts and verifies the bearer token, returning its claims.
///
/// Runs before any registry lookup so token failures surface ahead of
/// not-found responses.
///
/// # Errors
///
/// Returns the extraction errors of [`bearer_token`] and
/// [`ApiError::Unauthorized`] for a token the verifier rejects.
pub(super) async fn verified_claims<A: TokenVerifier>(
    verifier: &A,
    headers: &HeaderMap,
) -> Result<TokenClaims, ApiError> {
    let token = bearer_token(headers)?;
    Ok(verifier.verify(token).await?)
}

/// Requires publish permission on the server.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] when the claims lack the permission.
pub(super) fn require_publish(claims: &TokenClaims, server_name: &str) -> Result<(), ApiError> {
    if claims.allows(PermissionAction::Publish, server_name) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "You do not have publish permissions for this server".to_owned(),
        ))
    }
}

/// Requires publish or edit permission on the server.
///
/// # Errors
///
/// Returns [`ApiError::Forbidden`] when the claims lack both permissions.
pub(super) fn require_edit(claims: &TokenClaims, server_name: &str) -> Result<(), ApiError> {
    if claims.allows(PermissionAction::Publish, server_name)
        || claims.allows(PermissionAction::Edit, server_name)
    {
        Ok(())
    } else {
        Err(ApiError::Forbidden(
            "You do not have publish or edit permissions for this server".to_owned(),
        ))
    }
}
