//! Standard descriptor validation rules.
//!
//! Pure format checks that every deployment wants: name shape, version
//! token sanity, and well-formed URLs on the fields the registry reads.
//! Deployments that also probe source repositories or package registries
//! wrap or replace this adapter behind the same port.

use async_trait::async_trait;

use crate::registry::domain::{ServerDescriptor, ServerName};
use crate::registry::ports::{DescriptorValidator, ValidatorError, ValidatorResult};

/// Maximum length accepted for a version token.
const MAX_VERSION_LENGTH: usize = 255;

/// Maximum length accepted for a description.
const MAX_DESCRIPTION_LENGTH: usize = 1000;

/// Format-only descriptor validator.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardDescriptorValidator;

impl StandardDescriptorValidator {
    /// Creates the validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DescriptorValidator for StandardDescriptorValidator {
    async fn validate_publish(&self, descriptor: &ServerDescriptor) -> ValidatorResult {
        ServerName::new(&descriptor.name)
            .map_err(|err| ValidatorError::rejected(err.to_string()))?;

        let version = descriptor.version.trim();
        if version.is_empty() {
            return Err(ValidatorError::rejected("version is required"));
        }
        if version.len() > MAX_VERSION_LENGTH {
            return Err(ValidatorError::rejected(format!(
                "version exceeds {MAX_VERSION_LENGTH} character limit"
            )));
        }
        if version.eq_ignore_ascii_case("latest") {
            return Err(ValidatorError::rejected(
                "version must not be the reserved token 'latest'",
            ));
        }

        if let Some(description) = &descriptor.description {
            if description.chars().count() > MAX_DESCRIPTION_LENGTH {
                return Err(ValidatorError::rejected(format!(
                    "description exceeds {MAX_DESCRIPTION_LENGTH} character limit"
                )));
            }
        }

        if let Some(repository) = &descriptor.repository {
            require_http_url("repository.url", &repository.url)?;
            if repository.source.trim().is_empty() {
                return Err(ValidatorError::rejected("repository.source is required"));
            }
        }

        for remote in &descriptor.remotes {
            if remote.kind.trim().is_empty() {
                return Err(ValidatorError::rejected("remote type is required"));
            }
            require_http_url("remote url", &remote.url)?;
        }

        if let Some(website) = &descriptor.website_url {
            require_http_url("websiteUrl", website)?;
        }

        Ok(())
    }
}

fn require_http_url(field: &str, value: &str) -> ValidatorResult {
    let valid = (value.starts_with("https://") || value.starts_with("http://"))
        && !value.contains(char::is_whitespace)
        && value.len() > "https://".len();
    if valid {
        Ok(())
    } else {
        Err(ValidatorError::rejected(format!(
            "{field} must be an absolute http(s) URL: {value}"
        )))
    }
}
