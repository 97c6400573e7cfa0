//! Wire types for the registry HTTP API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::registry::domain::{ServerDescriptor, ServerRecord, ServerStatus};

/// Registry-owned metadata block attached to every server response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryExtensions {
    /// Lifecycle status of the version.
    pub status: ServerStatus,
    /// Optional note attached to the status.
    #[serde(rename = "statusMessage", skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
    /// Timestamp of the last real status change.
    #[serde(rename = "statusChangedAt")]
    pub status_changed_at: DateTime<Utc>,
    /// First publish timestamp.
    #[serde(rename = "publishedAt")]
    pub published_at: DateTime<Utc>,
    /// Last mutation timestamp.
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
    /// Whether this version is the canonical one for its name.
    #[serde(rename = "isLatest")]
    pub is_latest: bool,
}

/// `_meta` envelope carrying the official registry extension block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseMeta {
    /// Official registry metadata.
    #[serde(rename = "io.modelcontextprotocol.registry/official")]
    pub official: RegistryExtensions,
}

/// One server version as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    /// The publisher's descriptor.
    pub server: ServerDescriptor,
    /// Registry metadata envelope.
    #[serde(rename = "_meta")]
    pub meta: ResponseMeta,
}

impl ServerResponse {
    /// Converts a domain record into its wire shape.
    #[must_use]
    pub fn from_record(record: ServerRecord) -> Self {
        let (descriptor, meta) = record.into_parts();
        Self {
            server: descriptor,
            meta: ResponseMeta {
                official: RegistryExtensions {
                    status: meta.status,
                    status_message: meta.status_message,
                    status_changed_at: meta.status_changed_at,
                    published_at: meta.published_at,
                    updated_at: meta.updated_at,
                    is_latest: meta.is_latest,
                },
            },
        }
    }
}

/// Pagination block of a listing response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMetadata {
    /// Cursor for the next page; absent when no further rows exist.
    #[serde(rename = "nextCursor", skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Response shape for listing endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerListResponse {
    /// Matching server versions.
    pub servers: Vec<ServerResponse>,
    /// Pagination metadata.
    pub metadata: ListMetadata,
}

/// Response shape for the all-versions status endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllVersionsStatusResponse {
    /// Number of versions updated.
    #[serde(rename = "updatedCount")]
    pub updated_count: usize,
    /// Every updated version.
    pub servers: Vec<ServerResponse>,
}

/// Request body for both status endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateBody {
    /// Requested lifecycle status token.
    pub status: String,
    /// Optional message explaining the change.
    #[serde(rename = "statusMessage", default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

/// Query parameters of the listing endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListQuery {
    /// Opaque resumption cursor from a previous page.
    pub cursor: Option<String>,
    /// Page size, 1 ..= 100.
    pub limit: Option<i64>,
    /// RFC 3339 lower bound on `updatedAt` (exclusive).
    pub updated_since: Option<String>,
    /// Case-insensitive substring filter on the name.
    pub search: Option<String>,
    /// Exact version filter, or `latest` for latest-flagged rows.
    pub version: Option<String>,
    /// Whether to include soft-deleted versions.
    pub include_deleted: Option<bool>,
}

/// Query parameters of the single-server read endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReadQuery {
    /// Whether to include soft-deleted versions.
    #[serde(default)]
    pub include_deleted: bool,
}
