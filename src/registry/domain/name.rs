//! Validated server name type.

use super::DomainError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for a server name, matching the `VARCHAR(200)` column.
const MAX_NAME_LENGTH: usize = 200;

/// Validated namespaced server identifier.
///
/// Server names take the form `<reverse-dns-namespace>/<slug>`
/// (e.g. `io.github.user/my-server`). The namespace is dot-separated
/// reverse-DNS labels; the slug identifies the server within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerName(String);

impl ServerName {
    /// Creates a validated server name.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::EmptyServerName`] when the value is empty after
    /// trimming, [`DomainError::MalformedServerName`] when the `/` separator
    /// is missing or misplaced, [`DomainError::InvalidNamespace`] or
    /// [`DomainError::InvalidSlug`] for forbidden characters, and
    /// [`DomainError::ServerNameTooLong`] past 200 characters.
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let raw = value.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(DomainError::EmptyServerName);
        }

        if trimmed.len() > MAX_NAME_LENGTH {
            return Err(DomainError::ServerNameTooLong(raw));
        }

        let Some((namespace, slug)) = trimmed.split_once('/') else {
            return Err(DomainError::MalformedServerName(raw));
        };

        if namespace.is_empty() || slug.is_empty() || slug.contains('/') {
            return Err(DomainError::MalformedServerName(raw));
        }

        if !is_valid_namespace(namespace) {
            return Err(DomainError::InvalidNamespace(raw));
        }

        if !is_valid_slug(slug) {
            return Err(DomainError::InvalidSlug(raw));
        }

        Ok(Self(trimmed.to_owned()))
    }

    /// Returns the server name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the reverse-DNS namespace half of the name.
    #[must_use]
    pub fn namespace(&self) -> &str {
        self.0.split_once('/').map_or("", |(ns, _)| ns)
    }
}

/// A namespace is dot-separated labels of letters, digits, and hyphens,
/// with at least one dot (`io.github.user`).
fn is_valid_namespace(namespace: &str) -> bool {
    namespace.contains('.')
        && namespace.split('.').all(|label| {
            !label.is_empty()
                && label
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-')
        })
}

fn is_valid_slug(slug: &str) -> bool {
    slug.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

impl AsRef<str> for ServerName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
