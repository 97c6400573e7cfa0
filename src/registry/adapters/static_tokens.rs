//! Static bearer-token verifier.
//!
//! Development and single-tenant deployments load a token table from a
//! JSON document instead of standing up the external identity service.
//! The table maps opaque token strings to claims; anything absent from it
//! is an invalid token.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;

use crate::registry::ports::{AuthError, TokenClaims, TokenVerifier};

/// Token verifier backed by a fixed in-memory table.
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: HashMap<String, TokenClaims>,
}

/// One entry of the token table document.
#[derive(Debug, Clone, Deserialize)]
struct TokenEntry {
    token: String,
    #[serde(flatten)]
    claims: TokenClaims,
}

impl StaticTokenVerifier {
    /// Creates an empty verifier that rejects every token.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a verifier from the JSON token table document.
    ///
    /// The document is an array of `{token, subject, permissions}` entries.
    ///
    /// # Errors
    ///
    /// Returns the underlying deserialization error for malformed JSON.
    pub fn from_json(document: &str) -> Result<Self, serde_json::Error> {
        let entries: Vec<TokenEntry> = serde_json::from_str(document)?;
        Ok(Self {
            tokens: entries
                .into_iter()
                .map(|entry| (entry.token, entry.claims))
                .collect(),
        })
    }

    /// Registers a token with its claims.
    pub fn insert(&mut self, token: impl Into<String>, claims: TokenClaims) {
        self.tokens.insert(token.into(), claims);
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(AuthError::InvalidToken)
    }
}
