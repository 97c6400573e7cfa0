//! Service layer for registry publish, edit, and status workflows.
//!
//! Every mutating workflow runs inside one store transaction and takes the
//! per-name advisory lock as its first step, so concurrent mutations of
//! the same server observe a total order. Reads go straight to the store.

use std::cmp::Ordering;
use std::sync::Arc;

use mockable::Clock;
use thiserror::Error;
use tracing::info;

use crate::registry::domain::{
    version_precedence, RegistryMetadata, ServerDescriptor, ServerRecord, ServerStatus,
    StatusChange,
};
use crate::registry::ports::{
    DescriptorValidator, ServerFilter, ServerPage, ServerStore, StoreError, StoreTx,
    ValidatorError,
};

/// Hard cap on the number of versions one server may accumulate.
pub const MAX_VERSIONS_PER_SERVER: i64 = 10000;

/// Page size used when sweeping for remote-URL claims inside a workflow.
const REMOTE_URL_SCAN_LIMIT: i64 = 1000;

/// Service-level errors for registry workflows.
#[derive(Debug, Error)]
pub enum RegistryServiceError {
    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The submitted descriptor failed validation.
    #[error(transparent)]
    Validation(#[from] ValidatorError),

    /// The `(name, version)` pair has already been published.
    #[error("version {version} of {name} already exists")]
    DuplicateVersion {
        /// Target server name.
        name: String,
        /// Version token that collided.
        version: String,
    },

    /// A remote URL in the descriptor is claimed by another server.
    #[error("remote URL {url} is already used by server {owner}")]
    DuplicateRemoteUrl {
        /// The contested URL.
        url: String,
        /// Name of the server currently claiming it.
        owner: String,
    },

    /// The server is at its version cap.
    #[error("server {name} has reached the maximum of {MAX_VERSIONS_PER_SERVER} versions")]
    VersionLimitReached {
        /// Target server name.
        name: String,
    },

    /// An edit attempted to change the server name.
    #[error("Cannot rename server")]
    CannotRename,

    /// An edit body's version does not match the addressed version.
    #[error("Version in request body must match URL path parameter")]
    VersionMismatch,
}

/// Result type for registry service operations.
pub type RegistryServiceResult<T> = Result<T, RegistryServiceError>;

/// Publish, edit, and status orchestration over the server store.
pub struct RegistryService<S, V, C>
where
    S: ServerStore,
    V: DescriptorValidator,
    C: Clock + Send + Sync,
{
    store: Arc<S>,
    validator: Arc<V>,
    clock: Arc<C>,
}

impl<S, V, C> Clone for RegistryService<S, V, C>
where
    S: ServerStore,
    V: DescriptorValidator,
    C: Clock + Send + Sync,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            validator: Arc::clone(&self.validator),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<S, V, C> RegistryService<S, V, C>
where
    S: ServerStore,
    V: DescriptorValidator,
    C: Clock + Send + Sync,
{
    /// Creates a new registry service.
    #[must_use]
    pub const fn new(store: Arc<S>, validator: Arc<V>, clock: Arc<C>) -> Self {
        Self {
            store,
            validator,
            clock,
        }
    }

    /// Filtered, cursor-paginated listing.
    ///
    /// A non-positive limit falls back to the store default.
    ///
    /// # Errors
    ///
    /// Returns store errors, including [`StoreError::Invalid`] for an
    /// undecodable cursor.
    pub async fn list_servers(
        &self,
        filter: &ServerFilter,
        cursor: Option<&str>,
        limit: i64,
    ) -> RegistryServiceResult<ServerPage> {
        Ok(self.store.list_servers(filter, cursor, limit).await?)
    }

    /// Latest version of a server.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the name has no matching
    /// version.
    pub async fn get_server_by_name(
        &self,
        name: &str,
        include_deleted: bool,
    ) -> RegistryServiceResult<ServerRecord> {
        Ok(self.store.get_by_name(name, include_deleted).await?)
    }

    /// One specific version of a server.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the row is absent, or deleted
    /// while `include_deleted` is false.
    pub async fn get_server_by_name_and_version(
        &self,
        name: &str,
        version: &str,
        include_deleted: bool,
    ) -> RegistryServiceResult<ServerRecord> {
        Ok(self
            .store
            .get_by_name_and_version(name, version, include_deleted)
            .await?)
    }

    /// All versions of a server, ordered by version ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the name has no versions.
    pub async fn get_all_versions(
        &self,
        name: &str,
        include_deleted: bool,
    ) -> RegistryServiceResult<Vec<ServerRecord>> {
        Ok(self.store.get_all_versions(name, include_deleted).await?)
    }

    /// Publishes a new server version.
    ///
    /// The new version starts active. It takes the latest flag when the
    /// name has no flagged version or when it outranks the current one
    /// under version precedence.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryServiceError::Validation`] for a rejected
    /// descriptor, [`RegistryServiceError::DuplicateRemoteUrl`] when a
    /// remote URL is claimed by another server,
    /// [`RegistryServiceError::VersionLimitReached`] at the version cap,
    /// and [`RegistryServiceError::DuplicateVersion`] when the pair
    /// already exists.
    pub async fn publish(
        &self,
        descriptor: ServerDescriptor,
    ) -> RegistryServiceResult<ServerRecord> {
        self.validator.validate_publish(&descriptor).await?;

        let publish_time = self.clock.utc();
        let record = self
            .store
            .in_transaction(move |tx| {
                tx.acquire_publish_lock(&descriptor.name)?;
                ensure_remote_urls_unclaimed(tx, &descriptor)?;

                if tx.count_versions(&descriptor.name)? >= MAX_VERSIONS_PER_SERVER {
                    return Err(RegistryServiceError::VersionLimitReached {
                        name: descriptor.name.clone(),
                    });
                }
                if tx.version_exists(&descriptor.name, &descriptor.version)? {
                    return Err(RegistryServiceError::DuplicateVersion {
                        name: descriptor.name.clone(),
                        version: descriptor.version.clone(),
                    });
                }

                let current = tx.current_latest(&descriptor.name)?;
                let is_latest = match &current {
                    None => true,
                    Some(current) => {
                        version_precedence(
                            &descriptor.version,
                            publish_time,
                            current.version(),
                            current.meta().published_at,
                        ) == Ordering::Greater
                    }
                };
                if is_latest && current.is_some() {
                    tx.unmark_latest(&descriptor.name, publish_time)?;
                }

                let meta = RegistryMetadata::for_publish(publish_time, is_latest);
                Ok(tx.create_server(&descriptor, &meta)?)
            })
            .await?;

        info!(
            name = record.name(),
            version = record.version(),
            is_latest = record.meta().is_latest,
            "published server version"
        );
        Ok(record)
    }

    /// Replaces the descriptor of an existing version, optionally applying
    /// a status change in the same transaction.
    ///
    /// Descriptor validation is skipped when the version is deleted or is
    /// being transitioned to deleted. Status metadata survives edits that
    /// carry no status change.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown version,
    /// [`RegistryServiceError::CannotRename`] and
    /// [`RegistryServiceError::VersionMismatch`] for identity changes, and
    /// the publish-time validation and remote-URL errors.
    pub async fn edit(
        &self,
        name: &str,
        version: &str,
        descriptor: ServerDescriptor,
        status_change: Option<StatusChange>,
    ) -> RegistryServiceResult<ServerRecord> {
        let current = self
            .store
            .get_by_name_and_version(name, version, true)
            .await?;

        if descriptor.name != name {
            return Err(RegistryServiceError::CannotRename);
        }
        if descriptor.version != version {
            return Err(RegistryServiceError::VersionMismatch);
        }

        let being_deleted = status_change
            .as_ref()
            .is_some_and(|change| change.status == ServerStatus::Deleted);
        if !current.is_deleted() && !being_deleted {
            self.validator.validate_edit(&descriptor).await?;
        }

        let now = self.clock.utc();
        let name_owned = name.to_owned();
        let version_owned = version.to_owned();
        let record = self
            .store
            .in_transaction(move |tx| -> Result<ServerRecord, RegistryServiceError> {
                tx.acquire_publish_lock(&name_owned)?;
                ensure_remote_urls_unclaimed(tx, &descriptor)?;

                let updated = tx.update_descriptor(&name_owned, &version_owned, &descriptor, now)?;
                match status_change {
                    Some(change) => Ok(tx.set_status(
                        &name_owned,
                        &version_owned,
                        change.status,
                        change.message.as_deref(),
                        now,
                    )?),
                    None => Ok(updated),
                }
            })
            .await?;

        info!(
            name = record.name(),
            version = record.version(),
            "edited server version"
        );
        Ok(record)
    }

    /// Writes the status of one version.
    ///
    /// Restoring a deleted version to active re-checks its remote URLs:
    /// another server may have claimed one while this version was deleted.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown version and
    /// [`RegistryServiceError::DuplicateRemoteUrl`] when a restore loses
    /// the URL race.
    pub async fn set_version_status(
        &self,
        name: &str,
        version: &str,
        change: StatusChange,
    ) -> RegistryServiceResult<ServerRecord> {
        let now = self.clock.utc();
        let name_owned = name.to_owned();
        let version_owned = version.to_owned();
        let record = self
            .store
            .in_transaction(move |tx| -> Result<ServerRecord, RegistryServiceError> {
                let current = tx.get_by_name_and_version(&name_owned, &version_owned, true)?;
                tx.acquire_publish_lock(&name_owned)?;

                if change.status == ServerStatus::Active && current.is_deleted() {
                    ensure_remote_urls_unclaimed(tx, current.descriptor())?;
                }

                Ok(tx.set_status(
                    &name_owned,
                    &version_owned,
                    change.status,
                    change.message.as_deref(),
                    now,
                )?)
            })
            .await?;

        info!(
            name = record.name(),
            version = record.version(),
            status = %record.status(),
            "updated server version status"
        );
        Ok(record)
    }

    /// Writes the status of every version of a server in one transaction.
    ///
    /// When transitioning to active, every currently deleted version goes
    /// through remote-URL reconciliation first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when the name has no versions and
    /// [`RegistryServiceError::DuplicateRemoteUrl`] when reconciliation
    /// fails.
    pub async fn set_all_versions_status(
        &self,
        name: &str,
        change: StatusChange,
    ) -> RegistryServiceResult<Vec<ServerRecord>> {
        let now = self.clock.utc();
        let new_status = change.status;
        let name_owned = name.to_owned();
        let records = self
            .store
            .in_transaction(move |tx| -> Result<Vec<ServerRecord>, RegistryServiceError> {
                tx.acquire_publish_lock(&name_owned)?;

                if change.status == ServerStatus::Active {
                    let versions = tx.list_servers(
                        &ServerFilter::by_name(&name_owned),
                        None,
                        REMOTE_URL_SCAN_LIMIT,
                    )?;
                    for record in versions.servers.iter().filter(|record| record.is_deleted()) {
                        ensure_remote_urls_unclaimed(tx, record.descriptor())?;
                    }
                }

                Ok(tx.set_all_versions_status(
                    &name_owned,
                    change.status,
                    change.message.as_deref(),
                    now,
                )?)
            })
            .await?;

        info!(
            name = name,
            status = %new_status,
            updated = records.len(),
            "updated status of all server versions"
        );
        Ok(records)
    }
}

/// Fails when any remote URL of `descriptor` is claimed by a different
/// server name. Non-deleted versions of the same name never conflict.
fn ensure_remote_urls_unclaimed(
    tx: &mut dyn StoreTx,
    descriptor: &ServerDescriptor,
) -> RegistryServiceResult<()> {
    for url in descriptor.remote_urls() {
        let page = tx.list_servers(&ServerFilter::by_remote_url(url), None, REMOTE_URL_SCAN_LIMIT)?;
        if let Some(conflict) = page
            .servers
            .iter()
            .find(|record| record.name() != descriptor.name)
        {
            return Err(RegistryServiceError::DuplicateRemoteUrl {
                url: url.to_owned(),
                owner: conflict.name().to_owned(),
            });
        }
    }
    Ok(())
}
