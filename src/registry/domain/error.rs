//! Error types for registry domain validation and parsing.

use thiserror::Error;

use super::metadata::MAX_STATUS_MESSAGE_LENGTH;

/// Errors returned while constructing registry domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// The server name is empty after trimming.
    #[error("server name must not be empty")]
    EmptyServerName,

    /// The server name lacks the `<namespace>/<slug>` separator.
    #[error("server name '{0}' must take the form <reverse-dns-namespace>/<slug>")]
    MalformedServerName(String),

    /// The namespace half of the name is not reverse-DNS shaped.
    #[error("server name '{0}' has an invalid namespace (expected dot-separated reverse-DNS labels)")]
    InvalidNamespace(String),

    /// The slug half of the name contains forbidden characters.
    #[error("server name '{0}' has an invalid slug (allowed: letters, digits, '.', '_', '-')")]
    InvalidSlug(String),

    /// The server name exceeds the 200-character storage limit.
    #[error("server name exceeds 200 character limit: {0}")]
    ServerNameTooLong(String),

    /// The status message exceeds the storage limit.
    #[error("status message exceeds {MAX_STATUS_MESSAGE_LENGTH} character limit ({actual} characters)")]
    StatusMessageTooLong {
        /// Character count of the rejected message.
        actual: usize,
    },

    /// A status message was supplied for an active version.
    #[error("status_message cannot be provided when setting status to active")]
    StatusMessageOnActive,

    /// The status-changed timestamp precedes the publish timestamp.
    #[error("status_changed_at must not precede published_at")]
    StatusChangedBeforePublished,
}

/// Error returned while parsing a lifecycle status token.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid status: {0}. Must be one of: active, deprecated, deleted")]
pub struct ParseServerStatusError(pub String);
