//! Diesel row models and domain conversions for server persistence.

use super::schema::servers;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde_json::Value;

use crate::registry::domain::{RegistryMetadata, ServerDescriptor, ServerRecord, ServerStatus};
use crate::registry::ports::{StoreError, StoreResult};

/// Query result row for server version records.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = servers)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct ServerRow {
    /// Namespaced server name.
    pub server_name: String,
    /// Version token.
    pub version: String,
    /// Lifecycle status.
    pub status: String,
    /// Optional status note.
    pub status_message: Option<String>,
    /// Descriptor JSON payload.
    pub descriptor: Value,
    /// First publish timestamp.
    pub published_at: DateTime<Utc>,
    /// Last real status change.
    pub status_changed_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Latest flag.
    pub is_latest: bool,
}

/// Insert model for server version records.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = servers)]
pub struct NewServerRow {
    /// Namespaced server name.
    pub server_name: String,
    /// Version token.
    pub version: String,
    /// Lifecycle status.
    pub status: String,
    /// Optional status note.
    pub status_message: Option<String>,
    /// Descriptor JSON payload.
    pub descriptor: Value,
    /// First publish timestamp.
    pub published_at: DateTime<Utc>,
    /// Last real status change.
    pub status_changed_at: DateTime<Utc>,
    /// Last mutation timestamp.
    pub updated_at: DateTime<Utc>,
    /// Latest flag.
    pub is_latest: bool,
}

/// Builds an insert row from a descriptor and its metadata.
pub fn new_row(
    descriptor: &ServerDescriptor,
    meta: &RegistryMetadata,
) -> StoreResult<NewServerRow> {
    let payload = serde_json::to_value(descriptor).map_err(StoreError::internal)?;
    Ok(NewServerRow {
        server_name: descriptor.name.clone(),
        version: descriptor.version.clone(),
        status: meta.status.as_str().to_owned(),
        status_message: meta.status_message.clone(),
        descriptor: payload,
        published_at: meta.published_at,
        status_changed_at: meta.status_changed_at,
        updated_at: meta.updated_at,
        is_latest: meta.is_latest,
    })
}

/// Reconstructs a domain record from a persisted row.
pub fn record_from_row(row: ServerRow) -> StoreResult<ServerRecord> {
    let ServerRow {
        server_name: _,
        version: _,
        status,
        status_message,
        descriptor,
        published_at,
        status_changed_at,
        updated_at,
        is_latest,
    } = row;

    let status = ServerStatus::try_from(status.as_str()).map_err(StoreError::internal)?;
    let descriptor: ServerDescriptor =
        serde_json::from_value(descriptor).map_err(StoreError::internal)?;

    let meta = RegistryMetadata {
        status,
        status_message,
        published_at,
        status_changed_at,
        updated_at,
        is_latest,
    };
    Ok(ServerRecord::new(descriptor, meta))
}
