//! Server version lifecycle status.

use super::ParseServerStatusError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle status of a single published server version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    /// The version is live and returned by default listings.
    Active,
    /// The version is discouraged but still visible.
    Deprecated,
    /// The version is soft-deleted and hidden unless explicitly requested.
    Deleted,
}

impl ServerStatus {
    /// Returns the canonical storage representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Deprecated => "deprecated",
            Self::Deleted => "deleted",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<&str> for ServerStatus {
    type Error = ParseServerStatusError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "active" => Ok(Self::Active),
            "deprecated" => Ok(Self::Deprecated),
            "deleted" => Ok(Self::Deleted),
            _ => Err(ParseServerStatusError(value.to_owned())),
        }
    }
}
