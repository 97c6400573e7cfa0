//! `PostgreSQL`-backed server store.
//!
//! Synchronous Diesel operations are offloaded through
//! [`tokio::task::spawn_blocking`] so the async executor never blocks on
//! I/O. Transactions are driven manually so workflow errors flow through
//! [`ServerStore::in_transaction`] without a Diesel error bound; the
//! per-name advisory lock uses `pg_advisory_xact_lock`, keyed by a stable
//! hash so every registry process agrees on the lock for a given name.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::connection::{AnsiTransactionManager, TransactionManager};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use sha2::{Digest, Sha256};

use super::schema::servers;
use crate::registry::domain::{RegistryMetadata, ServerDescriptor, ServerRecord, ServerStatus};
use crate::registry::ports::{
    ServerFilter, ServerPage, ServerStore, StoreError, StoreResult, StoreTx,
};

/// `PostgreSQL` connection pool type used by the registry.
pub type PgPool = Pool<ConnectionManager<PgConnection>>;

/// `PostgreSQL`-backed server store.
#[derive(Debug, Clone)]
pub struct PostgresServerStore {
    pool: PgPool,
}

impl PostgresServerStore {
    /// Creates a store from a `PostgreSQL` connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn run_blocking<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get().map_err(StoreError::internal)?;
            f(&mut conn)
        })
        .await
        .map_err(StoreError::internal)?
    }
}

#[async_trait]
impl ServerStore for PostgresServerStore {
    async fn get_by_name(&self, name: &str, include_deleted: bool) -> StoreResult<ServerRecord> {
        let name = name.to_owned();
        self.run_blocking(move |conn| queries::get_by_name(conn, &name, include_deleted))
            .await
    }

    async fn get_by_name_and_version(
        &self,
        name: &str,
        version: &str,
        include_deleted: bool,
    ) -> StoreResult<ServerRecord> {
        let name = name.to_owned();
        let version = version.to_owned();
        self.run_blocking(move |conn| {
            queries::get_by_name_and_version(conn, &name, &version, include_deleted)
        })
        .await
    }

    async fn get_all_versions(
        &self,
        name: &str,
        include_deleted: bool,
    ) -> StoreResult<Vec<ServerRecord>> {
        let name = name.to_owned();
        self.run_blocking(move |conn| queries::get_all_versions(conn, &name, include_deleted))
            .await
    }

    async fn list_servers(
        &self,
        filter: &ServerFilter,
        cursor: Option<&str>,
        limit: i64,
    ) -> StoreResult<ServerPage> {
        let filter = filter.clone();
        let cursor = cursor.map(str::to_owned);
        self.run_blocking(move |conn| {
            queries::list_servers(conn, &filter, cursor.as_deref(), limit)
        })
        .await
    }

    async fn in_transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTx) -> Result<T, E> + Send + 'static,
        T: Send + 'static,
        E: From<StoreError> + Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool
                .get()
                .map_err(|err| E::from(StoreError::internal(err)))?;
            run_transaction(&mut conn, move |conn| {
                let mut tx = PgStoreTx { conn };
                f(&mut tx)
            })
        })
        .await
        .map_err(|err| E::from(StoreError::internal(err)))?
    }
}

/// Runs `f` inside one database transaction, rolling back on any error.
fn run_transaction<T, E>(
    conn: &mut PgConnection,
    f: impl FnOnce(&mut PgConnection) -> Result<T, E>,
) -> Result<T, E>
where
    E: From<StoreError>,
{
    AnsiTransactionManager::begin_transaction(conn)
        .map_err(|err| E::from(StoreError::internal(err)))?;
    match f(conn) {
        Ok(value) => match AnsiTransactionManager::commit_transaction(conn) {
            Ok(()) => Ok(value),
            Err(err) => Err(E::from(StoreError::internal(err))),
        },
        Err(err) => {
            if let Err(rollback_err) = AnsiTransactionManager::rollback_transaction(conn) {
                tracing::warn!(error = %rollback_err, "transaction rollback failed");
            }
            Err(err)
        }
    }
}

/// Transaction-scoped operations over a borrowed connection.
struct PgStoreTx<'a> {
    conn: &'a mut PgConnection,
}

impl StoreTx for PgStoreTx<'_> {
    fn acquire_publish_lock(&mut self, name: &str) -> StoreResult<()> {
        queries::acquire_publish_lock(self.conn, name)
    }

    fn create_server(
        &mut self,
        descriptor: &ServerDescriptor,
        meta: &RegistryMetadata,
    ) -> StoreResult<ServerRecord> {
        queries::create_server(self.conn, descriptor, meta)
    }

    fn get_by_name(&mut self, name: &str, include_deleted: bool) -> StoreResult<ServerRecord> {
        queries::get_by_name(self.conn, name, include_deleted)
    }

    fn get_by_name_and_version(
        &mut self,
        name: &str,
        version: &str,
        include_deleted: bool,
    ) -> StoreResult<ServerRecord> {
        queries::get_by_name_and_version(self.conn, name, version, include_deleted)
    }

    fn get_all_versions(
        &mut self,
        name: &str,
        include_deleted: bool,
    ) -> StoreResult<Vec<ServerRecord>> {
        queries::get_all_versions(self.conn, name, include_deleted)
    }

    fn count_versions(&mut self, name: &str) -> StoreResult<i64> {
        queries::count_versions(self.conn, name)
    }

    fn version_exists(&mut self, name: &str, version: &str) -> StoreResult<bool> {
        queries::version_exists(self.conn, name, version)
    }

    fn current_latest(&mut self, name: &str) -> StoreResult<Option<ServerRecord>> {
        queries::current_latest(self.conn, name)
    }

    fn list_servers(
        &mut self,
        filter: &ServerFilter,
        cursor: Option<&str>,
        limit: i64,
    ) -> StoreResult<ServerPage> {
        queries::list_servers(self.conn, filter, cursor, limit)
    }

    fn update_descriptor(
        &mut self,
        name: &str,
        version: &str,
        descriptor: &ServerDescriptor,
        now: DateTime<Utc>,
    ) -> StoreResult<ServerRecord> {
        queries::update_descriptor(self.conn, name, version, descriptor, now)
    }

    fn set_status(
        &mut self,
        name: &str,
        version: &str,
        status: ServerStatus,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<ServerRecord> {
        queries::set_status(self.conn, name, version, status, message, now)
    }

    fn set_all_versions_status(
        &mut self,
        name: &str,
        status: ServerStatus,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ServerRecord>> {
        queries::set_all_versions_status(self.conn, name, status, message, now)
    }

    fn unmark_latest(&mut self, name: &str, now: DateTime<Utc>) -> StoreResult<()> {
        queries::unmark_latest(self.conn, name, now)
    }
}

/// Derives the 64-bit advisory-lock key for a server name.
///
/// First eight bytes of SHA-256, big-endian, so the key is stable across
/// processes and releases.
fn advisory_lock_key(name: &str) -> i64 {
    let digest = Sha256::digest(name.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

/// Escapes LIKE metacharacters in a user-supplied search fragment.
fn escape_like(fragment: &str) -> String {
    fragment
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

mod queries {
    use super::*;
    use crate::registry::adapters::postgres::models::{new_row, record_from_row, ServerRow};
    use crate::registry::domain::ServerName;
    use crate::registry::ports::{PageCursor, DEFAULT_PAGE_LIMIT};
    use diesel::dsl::sql;
    use diesel::pg::Pg;
    use diesel::result::{DatabaseErrorKind, Error as DieselError};
    use diesel::sql_types::{BigInt, Bool, Jsonb};
    use serde_json::json;

    pub(super) fn acquire_publish_lock(conn: &mut PgConnection, name: &str) -> StoreResult<()> {
        diesel::sql_query("SELECT pg_advisory_xact_lock($1)")
            .bind::<BigInt, _>(super::advisory_lock_key(name))
            .execute(conn)
            .map_err(StoreError::internal)?;
        Ok(())
    }

    pub(super) fn create_server(
        conn: &mut PgConnection,
        descriptor: &ServerDescriptor,
        meta: &RegistryMetadata,
    ) -> StoreResult<ServerRecord> {
        ServerName::new(&descriptor.name).map_err(|err| StoreError::invalid(err.to_string()))?;
        if descriptor.version.trim().is_empty() {
            return Err(StoreError::invalid("version must not be empty"));
        }
        meta.validate()
            .map_err(|err| StoreError::invalid(err.to_string()))?;

        let row = new_row(descriptor, meta)?;
        diesel::insert_into(servers::table)
            .values(&row)
            .execute(conn)
            .map_err(|err| match err {
                DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _) => {
                    StoreError::conflict(format!(
                        "server {} version {} already exists",
                        descriptor.name, descriptor.version
                    ))
                }
                other => map_write_error(other),
            })?;
        Ok(ServerRecord::new(descriptor.clone(), meta.clone()))
    }

    pub(super) fn get_by_name(
        conn: &mut PgConnection,
        name: &str,
        include_deleted: bool,
    ) -> StoreResult<ServerRecord> {
        let mut query = servers::table
            .filter(servers::server_name.eq(name.to_owned()))
            .into_boxed::<Pg>();
        if !include_deleted {
            query = query.filter(servers::status.ne(ServerStatus::Deleted.as_str()));
        }
        let row = query
            .order((
                servers::is_latest.desc(),
                servers::published_at.desc(),
                servers::version.desc(),
            ))
            .select(ServerRow::as_select())
            .first::<ServerRow>(conn)
            .optional()
            .map_err(StoreError::internal)?;
        row.map(record_from_row).ok_or(StoreError::NotFound)?
    }

    pub(super) fn get_by_name_and_version(
        conn: &mut PgConnection,
        name: &str,
        version: &str,
        include_deleted: bool,
    ) -> StoreResult<ServerRecord> {
        let row = fetch_row(conn, name, version)?.ok_or(StoreError::NotFound)?;
        let record = record_from_row(row)?;
        if !include_deleted && record.is_deleted() {
            return Err(StoreError::NotFound);
        }
        Ok(record)
    }

    pub(super) fn get_all_versions(
        conn: &mut PgConnection,
        name: &str,
        include_deleted: bool,
    ) -> StoreResult<Vec<ServerRecord>> {
        let mut query = servers::table
            .filter(servers::server_name.eq(name.to_owned()))
            .into_boxed::<Pg>();
        if !include_deleted {
            query = query.filter(servers::status.ne(ServerStatus::Deleted.as_str()));
        }
        let rows = query
            .order(servers::version.asc())
            .select(ServerRow::as_select())
            .load::<ServerRow>(conn)
            .map_err(StoreError::internal)?;
        if rows.is_empty() {
            return Err(StoreError::NotFound);
        }
        rows.into_iter().map(record_from_row).collect()
    }

    pub(super) fn count_versions(conn: &mut PgConnection, name: &str) -> StoreResult<i64> {
        servers::table
            .filter(servers::server_name.eq(name.to_owned()))
            .count()
            .get_result(conn)
            .map_err(StoreError::internal)
    }

    pub(super) fn version_exists(
        conn: &mut PgConnection,
        name: &str,
        version: &str,
    ) -> StoreResult<bool> {
        diesel::select(diesel::dsl::exists(
            servers::table.find((name.to_owned(), version.to_owned())),
        ))
        .get_result(conn)
        .map_err(StoreError::internal)
    }

    pub(super) fn current_latest(
        conn: &mut PgConnection,
        name: &str,
    ) -> StoreResult<Option<ServerRecord>> {
        let row = servers::table
            .filter(servers::server_name.eq(name.to_owned()))
            .filter(servers::is_latest.eq(true))
            .select(ServerRow::as_select())
            .first::<ServerRow>(conn)
            .optional()
            .map_err(StoreError::internal)?;
        row.map(record_from_row).transpose()
    }

    pub(super) fn list_servers(
        conn: &mut PgConnection,
        filter: &ServerFilter,
        cursor: Option<&str>,
        limit: i64,
    ) -> StoreResult<ServerPage> {
        let limit = if limit <= 0 { DEFAULT_PAGE_LIMIT } else { limit };

        let mut query = servers::table.into_boxed::<Pg>();
        if !filter.include_deleted {
            query = query.filter(servers::status.ne(ServerStatus::Deleted.as_str()));
        }
        if let Some(name) = &filter.name {
            query = query.filter(servers::server_name.eq(name.clone()));
        }
        if let Some(fragment) = &filter.substring_name {
            query = query
                .filter(servers::server_name.ilike(format!("%{}%", super::escape_like(fragment))));
        }
        if let Some(version) = &filter.version {
            query = query.filter(servers::version.eq(version.clone()));
        }
        if let Some(url) = &filter.remote_url {
            query = query.filter(
                sql::<Bool>("descriptor -> 'remotes' @> ")
                    .bind::<Jsonb, _>(json!([{ "url": url }])),
            );
        }
        if let Some(is_latest) = filter.is_latest {
            query = query.filter(servers::is_latest.eq(is_latest));
        }
        if let Some(since) = filter.updated_since {
            query = query.filter(servers::updated_at.gt(since));
        }
        if let Some(token) = cursor.filter(|token| !token.is_empty()) {
            let after = PageCursor::decode(token)?;
            query = query.filter(
                servers::server_name.gt(after.name.clone()).or(servers::server_name
                    .eq(after.name)
                    .and(servers::version.gt(after.version))),
            );
        }

        let rows = query
            .order((servers::server_name.asc(), servers::version.asc()))
            .limit(limit + 1)
            .select(ServerRow::as_select())
            .load::<ServerRow>(conn)
            .map_err(StoreError::internal)?;

        let more = rows.len() as i64 > limit;
        let servers: Vec<ServerRecord> = rows
            .into_iter()
            .take(limit as usize)
            .map(record_from_row)
            .collect::<StoreResult<_>>()?;

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

    pub(super) fn update_descriptor(
        conn: &mut PgConnection,
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
        let payload = serde_json::to_value(descriptor).map_err(StoreError::internal)?;
        let updated = diesel::update(servers::table.find((name.to_owned(), version.to_owned())))
            .set((
                servers::descriptor.eq(payload),
                servers::updated_at.eq(now),
            ))
            .execute(conn)
            .map_err(map_write_error)?;
        if updated == 0 {
            return Err(StoreError::NotFound);
        }
        let row = fetch_row(conn, name, version)?.ok_or(StoreError::NotFound)?;
        record_from_row(row)
    }

    pub(super) fn set_status(
        conn: &mut PgConnection,
        name: &str,
        version: &str,
        status: ServerStatus,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<ServerRecord> {
        let row = fetch_row(conn, name, version)?.ok_or(StoreError::NotFound)?;
        let current = record_from_row(row)?;
        let meta = current
            .meta()
            .with_status(status, message.map(str::to_owned), now);
        meta.validate()
            .map_err(|err| StoreError::invalid(err.to_string()))?;

        diesel::update(servers::table.find((name.to_owned(), version.to_owned())))
            .set((
                servers::status.eq(meta.status.as_str()),
                servers::status_message.eq(meta.status_message.clone()),
                servers::status_changed_at.eq(meta.status_changed_at),
                servers::updated_at.eq(meta.updated_at),
                servers::is_latest.eq(meta.is_latest),
            ))
            .execute(conn)
            .map_err(map_write_error)?;

        Ok(ServerRecord::new(current.descriptor().clone(), meta))
    }

    pub(super) fn set_all_versions_status(
        conn: &mut PgConnection,
        name: &str,
        status: ServerStatus,
        message: Option<&str>,
        now: DateTime<Utc>,
    ) -> StoreResult<Vec<ServerRecord>> {
        let versions: Vec<String> = servers::table
            .filter(servers::server_name.eq(name.to_owned()))
            .order(servers::version.asc())
            .select(servers::version)
            .load::<String>(conn)
            .map_err(StoreError::internal)?;
        if versions.is_empty() {
            return Err(StoreError::NotFound);
        }
        versions
            .into_iter()
            .map(|version| set_status(conn, name, &version, status, message, now))
            .collect()
    }

    pub(super) fn unmark_latest(
        conn: &mut PgConnection,
        name: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        diesel::update(
            servers::table
                .filter(servers::server_name.eq(name.to_owned()))
                .filter(servers::is_latest.eq(true)),
        )
        .set((servers::is_latest.eq(false), servers::updated_at.eq(now)))
        .execute(conn)
        .map_err(StoreError::internal)?;
        Ok(())
    }

    fn fetch_row(
        conn: &mut PgConnection,
        name: &str,
        version: &str,
    ) -> StoreResult<Option<ServerRow>> {
        servers::table
            .find((name.to_owned(), version.to_owned()))
            .select(ServerRow::as_select())
            .first::<ServerRow>(conn)
            .optional()
            .map_err(StoreError::internal)
    }

    fn map_write_error(err: DieselError) -> StoreError {
        match err {
            DieselError::DatabaseError(DatabaseErrorKind::CheckViolation, info) => {
                StoreError::invalid(info.message().to_owned())
            }
            DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::conflict(info.message().to_owned())
            }
            other => StoreError::internal(other),
        }
    }
}
