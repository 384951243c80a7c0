//! Provider identifiers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::StorageError;

/// The three supported object-storage providers.
///
/// The set is closed: each provider has its own multipart semantics and
/// adapter, so adding one is a code change, not configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Google Cloud Storage (resumable-style uploads, no chunk protocol).
    Gcp,
    /// Amazon S3 (true multipart with server-issued part tags).
    Aws,
    /// Azure Blob Storage (block staging with client-chosen block ids).
    Azure,
}

impl Provider {
    /// All providers in a stable order.
    pub const ALL: [Self; 3] = [Self::Gcp, Self::Aws, Self::Azure];

    /// Canonical identifier.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Gcp => "gcp",
            Self::Aws => "aws",
            Self::Azure => "azure",
        }
    }

    /// URI-style location for an object, used as a location hint.
    #[must_use]
    pub fn location_hint(&self, bucket: &str, key: &str) -> String {
        let scheme = match self {
            Self::Gcp => "gs",
            Self::Aws => "s3",
            Self::Azure => "az",
        };
        format!("{scheme}://{bucket}/{key}")
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gcp" | "gcs" | "google" => Ok(Self::Gcp),
            "aws" | "s3" => Ok(Self::Aws),
            "azure" | "azblob" => Ok(Self::Azure),
            _ => Err(StorageError::unsupported_provider(s)),
        }
    }
}
