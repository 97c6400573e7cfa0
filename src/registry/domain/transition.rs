//! Status-transition validation.
//!
//! The transition graph itself is unrestricted (any of active, deprecated,
//! and deleted may follow any other); what gets rejected here is a request
//! that would change nothing, or a message attached to an activation. State
//! constraints are enforced again by the store at write time.

use super::{ParseServerStatusError, RegistryMetadata, ServerStatus};
use thiserror::Error;

/// A requested status write for one or all versions of a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChange {
    /// Requested lifecycle status.
    pub status: ServerStatus,
    /// Requested status message.
    pub message: Option<String>,
}

impl StatusChange {
    /// Builds a change request from wire-level fields.
    ///
    /// A message riding an activation request is dropped rather than stored:
    /// active versions never carry one. Rejecting that combination is the
    /// validator's job, before this constructor runs.
    #[must_use]
    pub fn from_wire(status: ServerStatus, message: Option<String>) -> Self {
        let message = if status == ServerStatus::Active {
            None
        } else {
            message
        };
        Self { status, message }
    }
}

/// Rejections produced by the transition validator.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransitionError {
    /// The status token is not a known lifecycle status.
    #[error(transparent)]
    UnknownStatus(#[from] ParseServerStatusError),

    /// A message was supplied while setting the status to active.
    #[error("status_message cannot be provided when setting status to active")]
    MessageOnActive,

    /// Neither the status nor the message would change.
    #[error("No changes to apply: status and message are already set to the provided values")]
    NoChanges,

    /// No version in a bulk request would change.
    #[error("No changes to apply: all versions already have the requested status and message")]
    NoBulkChanges,
}

/// Validates a status write against a single version's current metadata.
///
/// # Errors
///
/// Returns [`TransitionError::MessageOnActive`] when a message rides an
/// activation, and [`TransitionError::NoChanges`] when both the status and
/// the message (by presence and by value) already match.
pub fn validate_transition(
    current: &RegistryMetadata,
    requested_status: ServerStatus,
    requested_message: Option<&str>,
) -> Result<(), TransitionError> {
    if requested_status == ServerStatus::Active && requested_message.is_some() {
        return Err(TransitionError::MessageOnActive);
    }

    let status_changes = current.status != requested_status;
    let message_changes = current.status_message.as_deref() != requested_message;

    if status_changes || message_changes {
        Ok(())
    } else {
        Err(TransitionError::NoChanges)
    }
}

/// Validates a bulk status write against every version of a server.
///
/// The request is valid iff at least one version would accept it.
///
/// # Errors
///
/// Returns [`TransitionError::MessageOnActive`] when a message rides an
/// activation, and [`TransitionError::NoBulkChanges`] when every version
/// already has the requested status and message.
pub fn validate_bulk_transition<'a>(
    versions: impl IntoIterator<Item = &'a RegistryMetadata>,
    requested_status: ServerStatus,
    requested_message: Option<&str>,
) -> Result<(), TransitionError> {
    let mut saw_version = false;
    for meta in versions {
        saw_version = true;
        match validate_transition(meta, requested_status, requested_message) {
            Ok(()) => return Ok(()),
            Err(TransitionError::MessageOnActive) => return Err(TransitionError::MessageOnActive),
            Err(_) => {}
        }
    }
    if saw_version {
        Err(TransitionError::NoBulkChanges)
    } else {
        Ok(())
    }
}
