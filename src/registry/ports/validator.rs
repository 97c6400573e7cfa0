//! Descriptor validation port.
//!
//! Publish and edit run the submitted descriptor through a validator
//! before any row is written. Implementations range from the pure format
//! checks shipped in this crate to deployments that probe source
//! repositories or package registries. Validation is skipped entirely when
//! the affected version is deleted or is being transitioned to deleted.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::registry::domain::ServerDescriptor;

/// Result type for descriptor validation.
pub type ValidatorResult = Result<(), ValidatorError>;

/// Errors returned by descriptor validators.
#[derive(Debug, Clone, Error)]
pub enum ValidatorError {
    /// The descriptor violates a validation rule; the message names it.
    #[error("{0}")]
    Rejected(String),

    /// The validator itself failed (network, upstream registry).
    #[error("validator failure: {0}")]
    Internal(Arc<dyn std::error::Error + Send + Sync>),
}

impl ValidatorError {
    /// Rejects a descriptor with a rule-naming message.
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }

    /// Wraps a validator infrastructure failure.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(Arc::new(err))
    }
}

/// Port for publish/edit descriptor validation.
#[async_trait]
pub trait DescriptorValidator: Send + Sync {
    /// Validates a descriptor submitted through publish.
    ///
    /// # Errors
    ///
    /// Returns [`ValidatorError::Rejected`] when a rule fails and
    /// [`ValidatorError::Internal`] when the validator cannot run.
    async fn validate_publish(&self, descriptor: &ServerDescriptor) -> ValidatorResult;

    /// Validates a descriptor submitted through edit.
    ///
    /// Defaults to the publish rules; implementations override when edit
    /// has a narrower rule set.
    ///
    /// # Errors
    ///
    /// Same contract as [`DescriptorValidator::validate_publish`].
    async fn validate_edit(&self, descriptor: &ServerDescriptor) -> ValidatorResult {
        self.validate_publish(descriptor).await
    }
}
