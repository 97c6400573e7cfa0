//! Store port for server version persistence and discovery.
//!
//! Read operations run in their own implicit transaction. Mutating
//! workflows go through [`ServerStore::in_transaction`], which hands the
//! caller a transaction-scoped [`StoreTx`]: every operation on it sees the
//! transaction's own uncommitted writes, and an `Err` return rolls the
//! whole transaction back.

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

use crate::registry::domain::{RegistryMetadata, ServerDescriptor, ServerRecord, ServerStatus};

/// Page size applied when the caller passes a non-positive limit.
pub const DEFAULT_PAGE_LIMIT: i64 = 30;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by store implementations.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// No row matched the requested key.
    #[error("record not found")]
    NotFound,

    /// A uniqueness guarantee was violated; the message names the collision.
    #[error("{0}")]
    Conflict(String),

    /// A constraint or format check failed; the message names the rule.
    #[error("{0}")]
    Invalid(String),

    /// Storage-layer failure (connection, transport, serialization).
    #[error("storage error: {0}")]
    Internal(Arc<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps a uniqueness violation with a message naming the collision.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Wraps a constraint violation with a message naming the rule.
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid(message.into())
    }

    /// Wraps a storage-layer error.
    pub fn internal(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Internal(Arc::new(err))
    }
}

/// Conjunctive filter predicates for [`StoreTx::list_servers`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ServerFilter {
    /// Exact match on the server name.
    pub name: Option<String>,
    /// Case-insensitive substring match on the server name.
    pub substring_name: Option<String>,
    /// Exact match on the version token.
    pub version: Option<String>,
    /// Exact match on any remote endpoint URL.
    pub remote_url: Option<String>,
    /// Equality with the latest flag.
    pub is_latest: Option<bool>,
    /// Strictly-newer-than filter on `updated_at`.
    pub updated_since: Option<DateTime<Utc>>,
    /// When false, rows with deleted status are filtered out.
    pub include_deleted: bool,
}

impl ServerFilter {
    /// Filter matching every non-deleted version using the given remote
    /// URL. Deleted versions do not hold a claim on their URLs.
    #[must_use]
    pub fn by_remote_url(url: impl Into<String>) -> Self {
        Self {
            remote_url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Filter matching every version of a name, deleted included.
    #[must_use]
    pub fn by_name(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            include_deleted: true,
            ..Self::default()
        }
    }
}

/// Resumption point for paginated listing: the last-emitted key pair.
///
/// Encoded opaquely so callers cannot depend on the layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageCursor {
    /// Last-emitted server name.
    pub name: String,
    /// Last-emitted version token.
    pub version: String,
}

impl PageCursor {
    /// Encodes the cursor into its opaque wire form.
    #[must_use]
    pub fn encode(&self) -> String {
        // Serialization of two plain strings cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Decodes an opaque cursor produced by [`PageCursor::encode`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when the token is not a cursor this
    /// registry emitted.
    pub fn decode(token: &str) -> StoreResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| StoreError::invalid("invalid pagination cursor"))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| StoreError::invalid("invalid pagination cursor"))
    }
}

/// One page of listing results.
#[derive(Debug, Clone)]
pub struct ServerPage {
    /// Matching rows, ordered by `(name, version)` ascending.
    pub servers: Vec<ServerRecord>,
    /// Cursor for the next page; `None` iff no further rows exist.
    pub next_cursor: Option<String>,
}

/// Transaction-scoped store operations.
///
/// Handed out by [`ServerStore::in_transaction`]; all writes issued through
/// a `StoreTx` commit or roll back together.
pub trait StoreTx {
    /// Acquires the transaction-scoped advisory lock for a server name.
    ///
    /// The lock is keyed by a stable hash of the name, blocks concurrent
    /// holders of the same key, and is released when the transaction
    /// commits or rolls back. Mutating workflows take it as their first
    /// step so that operations on one name observe a total order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Internal`] on storage failure.
    fn acquire_publish_lock(&mut self, name: &str) -> StoreResult<()>;

    /// Inserts a new `(name, version)` row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] on a duplicate key and
    /// [`StoreError::Invalid`] when the name format or a metadata
    /// constraint is violated.
    fn create_server(
        &mut self,
        descriptor: &ServerDescriptor,
        meta: &RegistryMetadata,
    ) -> StoreResult<ServerRecord>;

    /// Returns the latest version of a name.
    ///
    /// With `include_deleted` false, this is the latest non-deleted
    /// version; otherwise the latest overall (latest-flagged row first,
    /// then highest key).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when no matching row exists.
    fn get_by_name(&mut self, name: &str, include_deleted: bool) -> StoreResult<ServerRecord>;

    /// Returns one specific version.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the row is absent, or present
    /// but deleted while `include_deleted` is false.
    fn get_by_name_and_version(
        &mut self,
        name: &str,
        version: &str,
        include_deleted: bool,
    ) -> StoreResult<ServerRecord>;

    /// Returns all versions of a name, ordered by version ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the name has no matching rows.
    fn get_all_versions(
        &mut self,
        name: &str,
        include_deleted: bool,
    ) -> StoreResult<Vec<ServerRecord>>;

    /// Counts all versions of a name, deleted included.
    fn count_versions(&mut self, name: &str) -> StoreResult<i64>;

    /// Reports whether a `(name, version)` row exists, deleted included.
    fn version_exists(&mut self, name: &str, version: &str) -> StoreResult<bool>;

    /// Returns the version currently holding the latest flag, if any.
    fn current_latest(&mut self, name: &str) -> StoreResult<Option<ServerRecord>>;

    /// Filtered, cursor-paginated listing.
    ///
    /// Rows are ordered by `(name, version)` ascending; a non-positive
    /// limit falls back to [`DEFAULT_PAGE_LIMIT`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] for an undecodable cursor.
    fn list_servers(
        &mut self,
        filter: &ServerFilter,
        cursor: Option<&str>,
        limit: i64,
    ) -> StoreResult<ServerPage>;

    /// Replaces the descriptor of an existing version.
    ///
    /// Status metadata, the publish timestamp, and the latest flag are
    /// preserved; only `updated_at` is refreshed to `now`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the row is absent.
    fn update_descriptor(
        &mut self,
        name: &str,
        version: &str,
        descriptor: &ServerDescriptor,
        now: DateTime<Utc>,
    ) -> StoreResult<ServerRecord>;

    /// Writes the status fields of one version.
    ///
    /// `status_changed_at` is refreshed iff the status value changes;
    /// `updated_at` is always refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the row is absent and
    /// [`StoreError::Invalid`] when the write would violate a metadata
    /// constraint.
    fn set_status(
        &mut self,
        name: &str,
        version: &str,
        status: ServerStatus,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<ServerRecord>;

    /// Applies [`StoreTx::set_status`] semantics to every version of a
    /// name, returning the updated rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the name has no versions.
    fn set_all_versions_status(
        &mut self,
        name: &str,
        status: ServerStatus,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ServerRecord>>;

    /// Clears the latest flag on every version of a name.
    ///
    /// `updated_at` is refreshed on rows that actually lose the flag so
    /// incremental sync by `updated_since` observes the change.
    fn unmark_latest(&mut self, name: &str, now: DateTime<Utc>) -> StoreResult<()>;
}

/// Server persistence contract.
#[async_trait]
pub trait ServerStore: Send + Sync {
    /// Latest version of a name; see [`StoreTx::get_by_name`].
    async fn get_by_name(&self, name: &str, include_deleted: bool) -> StoreResult<ServerRecord>;

    /// One specific version; see [`StoreTx::get_by_name_and_version`].
    async fn get_by_name_and_version(
        &self,
        name: &str,
        version: &str,
        include_deleted: bool,
    ) -> StoreResult<ServerRecord>;

    /// All versions of a name; see [`StoreTx::get_all_versions`].
    async fn get_all_versions(
        &self,
        name: &str,
        include_deleted: bool,
    ) -> StoreResult<Vec<ServerRecord>>;

    /// Filtered listing; see [`StoreTx::list_servers`].
    async fn list_servers(
        &self,
        filter: &ServerFilter,
        cursor: Option<&str>,
        limit: i64,
    ) -> StoreResult<ServerPage>;

    /// Runs `f` inside one transaction.
    ///
    /// Every effect of `f` commits atomically on `Ok` and rolls back on
    /// `Err`. The error type only needs a [`StoreError`] conversion, so
    /// callers thread their own workflow errors through unchanged.
    async fn in_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static;
}
