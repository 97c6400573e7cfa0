//! Published server descriptor payload.
//!
//! The descriptor is the JSON document a publisher submits. Beyond the
//! identity fields (`name`, `version`) and the remote endpoints the registry
//! enforces uniqueness over, the payload is carried opaquely: unknown fields
//! round-trip through the `extra` map untouched.

use serde::{Deserialize, Serialize};

/// Source repository reference advertised by a descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRef {
    /// Repository URL.
    pub url: String,
    /// Hosting source identifier (e.g. `github`).
    pub source: String,
    /// Source-specific repository ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Path of the server within the repository, when not at the root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfolder: Option<String>,
}

/// Remote endpoint advertised by a server version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEndpoint {
    /// Transport type token (e.g. `streamable-http`, `sse`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Endpoint URL. Unique across server names for non-deleted versions.
    pub url: String,
}

/// Server descriptor as submitted by a publisher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerDescriptor {
    /// Schema URL of the descriptor format.
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    /// Namespaced server name.
    pub name: String,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Version token for this publish.
    pub version: String,
    /// Source repository reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<RepositoryRef>,
    /// Remote endpoints exposed by the server.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remotes: Vec<RemoteEndpoint>,
    /// Project website.
    #[serde(rename = "websiteUrl", default, skip_serializing_if = "Option::is_none")]
    pub website_url: Option<String>,
    /// Descriptor fields the registry carries without interpreting.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl ServerDescriptor {
    /// Iterates over the remote endpoint URLs of this descriptor.
    pub fn remote_urls(&self) -> impl Iterator<Item = &str> {
        self.remotes.iter().map(|remote| remote.url.as_str())
    }
}
