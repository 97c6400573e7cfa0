//! Registry-owned lifecycle metadata for a server version.

use super::{DomainError, ServerStatus};
use chrono::{DateTime, Utc};

/// Maximum length of a status message, matching the `CHECK` constraint.
pub const MAX_STATUS_MESSAGE_LENGTH: usize = 500;

/// Lifecycle metadata the registry maintains alongside a descriptor.
///
/// The descriptor belongs to the publisher; these fields belong to the
/// registry and change only through publish and status workflows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryMetadata {
    /// Lifecycle status of this version.
    pub status: ServerStatus,
    /// Optional operator-facing note attached to the status.
    pub status_message: Option<String>,
    /// First-insert timestamp. Immutable.
    pub published_at: DateTime<Utc>,
    /// Timestamp of the last real status change. Never precedes `published_at`.
    pub status_changed_at: DateTime<Utc>,
    /// Timestamp of the last mutation of any kind.
    pub updated_at: DateTime<Utc>,
    /// Whether this version is the canonical one for its name.
    pub is_latest: bool,
}

impl RegistryMetadata {
    /// Creates the metadata for a freshly published version.
    ///
    /// New versions are active, and all three timestamps start at the
    /// publish instant.
    #[must_use]
    pub const fn for_publish(published_at: DateTime<Utc>, is_latest: bool) -> Self {
        Self {
            status: ServerStatus::Active,
            status_message: None,
            published_at,
            status_changed_at: published_at,
            updated_at: published_at,
            is_latest,
        }
    }

    /// Checks the metadata invariants enforced at write time.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError::StatusMessageTooLong`] past 500 characters,
    /// [`DomainError::StatusMessageOnActive`] when an active version carries
    /// a message, and [`DomainError::StatusChangedBeforePublished`] when the
    /// timestamps are out of order.
    pub fn validate(&self) -> Result<(), DomainError> {
        if let Some(message) = &self.status_message {
            let actual = message.chars().count();
            if actual > MAX_STATUS_MESSAGE_LENGTH {
                return Err(DomainError::StatusMessageTooLong { actual });
            }
            if self.status == ServerStatus::Active {
                return Err(DomainError::StatusMessageOnActive);
            }
        }
        if self.status_changed_at < self.published_at {
            return Err(DomainError::StatusChangedBeforePublished);
        }
        Ok(())
    }

    /// Applies a status write, returning the resulting metadata.
    ///
    /// `status_changed_at` is refreshed only when the status value actually
    /// changes; `updated_at` is always refreshed. A version entering the
    /// deleted state gives up the latest flag.
    #[must_use]
    pub fn with_status(
        &self,
        status: ServerStatus,
        status_message: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        let status_changed_at = if status == self.status {
            self.status_changed_at
        } else {
            now
        };
        let is_latest = if status == ServerStatus::Deleted {
            false
        } else {
            self.is_latest
        };
        Self {
            status,
            status_message,
            published_at: self.published_at,
            status_changed_at,
            updated_at: now,
            is_latest,
        }
    }

    /// Returns the metadata with only `updated_at` refreshed.
    ///
    /// Used for descriptor edits, which never touch status fields.
    #[must_use]
    pub fn touched(&self, now: DateTime<Utc>) -> Self {
        Self {
            updated_at: now,
            ..self.clone()
        }
    }
}
