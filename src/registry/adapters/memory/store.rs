//! In-memory server store.
//!
//! Backs the integration test suites and local development. Transactions
//! are copy-on-commit: the closure works on a clone of the state, which
//! replaces the shared state only when the closure succeeds. The state
//! mutex is held for the whole transaction, so transactions serialize
//! globally; that subsumes the per-name advisory lock, whose acquisition
//! here is a no-op.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::registry::domain::{
    RegistryMetadata, ServerDescriptor, ServerName, ServerRecord, ServerStatus,
};
use crate::registry::ports::{
    PageCursor, ServerFilter, ServerPage, ServerStore, StoreError, StoreResult, StoreTx,
    DEFAULT_PAGE_LIMIT,
};

/// Thread-safe in-memory server store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServerStore {
    state: Arc<Mutex<MemoryState>>,
}

/// Rows keyed by `(name, version)`; the map order is the listing order.
#[derive(Debug, Clone, Default)]
struct MemoryState {
    rows: BTreeMap<(String, String), ServerRecord>,
}

impl InMemoryServerStore {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|err| StoreError::internal(std::io::Error::other(err.to_string())))
    }
}

#[async_trait]
impl ServerStore for InMemoryServerStore {
    async fn get_by_name(&self, name: &str, include_deleted: bool) -> StoreResult<ServerRecord> {
        self.lock()?.get_by_name(name, include_deleted)
    }

    async fn get_by_name_and_version(
        &self,
        name: &str,
        version: &str,
        include_deleted: bool,
    ) -> StoreResult<ServerRecord> {
        self.lock()?
            .get_by_name_and_version(name, version, include_deleted)
    }

    async fn get_all_versions(
        &self,
        name: &str,
        include_deleted: bool,
    ) -> StoreResult<Vec<ServerRecord>> {
        self.lock()?.get_all_versions(name, include_deleted)
    }

    async fn list_servers(
        &self,
        filter: &ServerFilter,
        cursor: Option<&str>,
        limit: i64,
    ) -> StoreResult<ServerPage> {
        self.lock()?.list_servers(filter, cursor, limit)
    }

    async fn in_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let mut guard = self.lock().map_err(E::from)?;
        let mut working = guard.clone();
        match f(&mut working) {
            Ok(value) => {
                *guard = working;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }
}

impl StoreTx for MemoryState {
    fn acquire_publish_lock(&mut self, _name: &str) -> StoreResult<()> {
        // Transactions already serialize on the state mutex.
        Ok(())
    }

    fn create_server(
        &mut self,
        descriptor: &ServerDescriptor,
        meta: &RegistryMetadata,
    ) -> StoreResult<ServerRecord> {
        ServerName::new(&descriptor.name).map_err(|err| StoreError::invalid(err.to_string()))?;
        if descriptor.version.trim().is_empty() {
            return Err(StoreError::invalid("version must not be empty"));
        }
        meta.validate()
            .map_err(|err| StoreError::invalid(err.to_string()))?;

        let key = (descriptor.name.clone(), descriptor.version.clone());
        if self.rows.contains_key(&key) {
            return Err(StoreError::conflict(format!(
                "server {} version {} already exists",
                descriptor.name, descriptor.version
            )));
        }

        let record = ServerRecord::new(descriptor.clone(), meta.clone());
        self.rows.insert(key, record.clone());
        Ok(record)
    }

    fn get_by_name(&mut self, name: &str, include_deleted: bool) -> StoreResult<ServerRecord> {
        MemoryState::get_by_name(self, name, include_deleted)
    }

    fn get_by_name_and_version(
        &mut self,
        name: &str,
        version: &str,
        include_deleted: bool,
    ) -> StoreResult<ServerRecord> {
        MemoryState::get_by_name_and_version(self, name, version, include_deleted)
    }

    fn get_all_versions(
        &mut self,
        name: &str,
        include_deleted: bool,
    ) -> StoreResult<Vec<ServerRecord>> {
        MemoryState::get_all_versions(self, name, include_deleted)
    }

    fn count_versions(&mut self, name: &str) -> StoreResult<i64> {
        Ok(self.versions_of(name).count() as i64)
    }

    fn version_exists(&mut self, name: &str, version: &str) -> StoreResult<bool> {
        Ok(self
            .rows
            .contains_key(&(name.to_owned(), version.to_owned())))
    }

    fn current_latest(&mut self, name: &str) -> StoreResult<Option<ServerRecord>> {
        Ok(self
            .versions_of(name)
            .find(|record| record.meta().is_latest)
            .cloned())
    }

    fn list_servers(
        &mut self,
        filter: &ServerFilter,
        cursor: Option<&str>,
        limit: i64,
    ) -> StoreResult<ServerPage> {
        MemoryState::list_servers(self, filter, cursor, limit)
    }

    fn update_descriptor(
        &mut self,
        name: &str,
        version: &str,
        descriptor: &ServerDescriptor,
        now: DateTime<Utc>,
    ) -> StoreResult<ServerRecord> {
        if descriptor.name != name || descriptor.version != version {
            return Err(StoreError::invalid(
                "descriptor identity must match the target row",
            ));
        }
        let key = (name.to_owned(), version.to_owned());
        let record = self.rows.get(&key).ok_or(StoreError::NotFound)?;
        let updated = ServerRecord::new(descriptor.clone(), record.meta().touched(now));
        self.rows.insert(key, updated.clone());
        Ok(updated)
    }

    fn set_status(
        &mut self,
        name: &str,
        version: &str,
        status: ServerStatus,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<ServerRecord> {
        let key = (name.to_owned(), version.to_owned());
        let record = self.rows.get(&key).ok_or(StoreError::NotFound)?;
        let meta = record
            .meta()
            .with_status(status, message.map(str::to_owned), now);
        meta.validate()
            .map_err(|err| StoreError::invalid(err.to_string()))?;
        let updated = ServerRecord::new(record.descriptor().clone(), meta);
        self.rows.insert(key, updated.clone());
        Ok(updated)
    }

    fn set_all_versions_status(
        &mut self,
        name: &str,
        status: ServerStatus,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ServerRecord>> {
        let versions: Vec<String> = self
            .versions_of(name)
            .map(|record| record.version().to_owned())
            .collect();
        if versions.is_empty() {
            return Err(StoreError::NotFound);
        }
        versions
            .into_iter()
            .map(|version| self.set_status(name, &version, status, message, now))
            .collect()
    }

    fn unmark_latest(&mut self, name: &str, now: DateTime<Utc>) -> StoreResult<()> {
        let keys: Vec<(String, String)> = self
            .versions_of(name)
            .filter(|record| record.meta().is_latest)
            .map(|record| (record.name().to_owned(), record.version().to_owned()))
            .collect();
        for key in keys {
            if let Some(record) = self.rows.get(&key) {
                let mut meta = record.meta().touched(now);
                meta.is_latest = false;
                let updated = ServerRecord::new(record.descriptor().clone(), meta);
                self.rows.insert(key, updated);
            }
        }
        Ok(())
    }
}

impl MemoryState {
    fn versions_of<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a ServerRecord> + 'a {
        self.rows
            .range((name.to_owned(), String::new())..)
            .take_while(move |((row_name, _), _)| row_name == name)
            .map(|(_, record)| record)
    }

    fn get_by_name(&self, name: &str, include_deleted: bool) -> StoreResult<ServerRecord> {
        let candidates: Vec<&ServerRecord> = self
            .versions_of(name)
            .filter(|record| include_deleted || !record.is_deleted())
            .collect();

        // The flagged row wins; otherwise fall back to the newest publish.
        let latest = candidates
            .iter()
            .find(|record| record.meta().is_latest)
            .or_else(|| {
                candidates.iter().max_by(|a, b| {
                    a.meta()
                        .published_at
                        .cmp(&b.meta().published_at)
                        .then_with(|| a.version().cmp(b.version()))
                })
            });

        latest.map(|record| (*record).clone()).ok_or(StoreError::NotFound)
    }

    fn get_by_name_and_version(
        &self,
        name: &str,
        version: &str,
        include_deleted: bool,
    ) -> StoreResult<ServerRecord> {
        self.rows
            .get(&(name.to_owned(), version.to_owned()))
            .filter(|record| include_deleted || !record.is_deleted())
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    fn get_all_versions(
        &self,
        name: &str,
        include_deleted: bool,
    ) -> StoreResult<Vec<ServerRecord>> {
        let versions: Vec<ServerRecord> = self
            .versions_of(name)
            .filter(|record| include_deleted || !record.is_deleted())
            .cloned()
            .collect();
        if versions.is_empty() {
            return Err(StoreError::NotFound);
        }
        Ok(versions)
    }

    fn list_servers(
        &self,
        filter: &ServerFilter,
        cursor: Option<&str>,
        limit: i64,
    ) -> StoreResult<ServerPage> {
        let limit = usize::try_from(if limit <= 0 { DEFAULT_PAGE_LIMIT } else { limit })
            .unwrap_or(DEFAULT_PAGE_LIMIT as usize);
        let after = cursor
            .filter(|token| !token.is_empty())
            .map(PageCursor::decode)
            .transpose()?;

        let mut servers: Vec<ServerRecord> = Vec::with_capacity(limit.min(64));
        let mut more = false;
        for ((row_name, row_version), record) in &self.rows {
            if let Some(after) = &after {
                if (row_name.as_str(), row_version.as_str())
                    <= (after.name.as_str(), after.version.as_str())
                {
                    continue;
                }
            }
            if !matches_filter(filter, record) {
                continue;
            }
            if servers.len() == limit {
                more = true;
                break;
            }
            servers.push(record.clone());
        }

        let next_cursor = if more {
            servers.last().map(|record| {
                PageCursor {
                    name: record.name().to_owned(),
                    version: record.version().to_owned(),
                }
                .encode()
            })
        } else {
            None
        };

        Ok(ServerPage {
            servers,
            next_cursor,
        })
    }
}

fn matches_filter(filter: &ServerFilter, record: &ServerRecord) -> bool {
    if !filter.include_deleted && record.is_deleted() {
        return false;
    }
    if let Some(name) = &filter.name {
        if record.name() != name {
            return false;
        }
    }
    if let Some(fragment) = &filter.substring_name {
        if !record
            .name()
            .to_ascii_lowercase()
            .contains(&fragment.to_ascii_lowercase())
        {
            return false;
        }
    }
    if let Some(version) = &filter.version {
        if record.version() != version {
            return false;
        }
    }
    if let Some(url) = &filter.remote_url {
        if !record
            .descriptor()
            .remote_urls()
            .any(|remote| remote == url)
        {
            return false;
        }
    }
    if let Some(is_latest) = filter.is_latest {
        if record.meta().is_latest != is_latest {
            return false;
        }
    }
    if let Some(since) = filter.updated_since {
        if record.meta().updated_at <= since {
            return false;
        }
    }
    true
}
