//! Storage error types.

use std::fmt;

use thiserror::Error;

use super::provider::Provider;

/// Upstream operation names carried in error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Prefix listing.
    List,
    /// Metadata lookup.
    Stat,
    /// Single-shot upload.
    Upload,
    /// Object download.
    Download,
    /// Object deletion.
    Delete,
    /// Signed URL generation.
    Presign,
    /// Chunked upload initiation.
    InitiateUpload,
    /// Chunk transfer.
    UploadPart,
    /// Chunked upload completion.
    CompleteUpload,
    /// Chunked upload abort.
    AbortUpload,
}

impl Operation {
    /// Snake-case name used in logs and error messages.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Stat => "stat",
            Self::Upload => "upload",
            Self::Download => "download",
            Self::Delete => "delete",
            Self::Presign => "presign",
            Self::InitiateUpload => "initiate_upload",
            Self::UploadPart => "upload_part",
            Self::CompleteUpload => "complete_upload",
            Self::AbortUpload => "abort_upload",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage gateway errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Provider identifier outside the supported set.
    #[error("unsupported storage provider '{provider}'")]
    UnsupportedProvider {
        /// The identifier that was supplied.
        provider: String,
    },

    /// Known provider without a configured connection.
    #[error("storage provider '{provider}' is not configured")]
    ProviderNotConfigured {
        /// The provider that was requested.
        provider: Provider,
    },

    /// Object does not exist.
    #[error("object not found: {provider}://{bucket}/{key}")]
    ObjectNotFound {
        /// Provider that was queried.
        provider: Provider,
        /// Bucket or container.
        bucket: String,
        /// Object key.
        key: String,
    },

    /// Provider call failed.
    #[error("{provider} {operation} failed for {bucket}/{key}: {cause}")]
    Upstream {
        /// Provider that failed.
        provider: Provider,
        /// Operation that was attempted.
        operation: Operation,
        /// Bucket or container.
        bucket: String,
        /// Object key.
        key: String,
        /// Provider-reported cause.
        cause: String,
    },

    /// Completion part list rejected.
    #[error("invalid part list: {reason}")]
    InvalidPartList {
        /// Every problem found, joined.
        reason: String,
    },

    /// Operation conflicts with one already running on the same upload.
    #[error("upload {upload_id} is busy: {reason}")]
    UploadSessionBusy {
        /// Upload identifier.
        upload_id: String,
        /// What the upload is currently doing.
        reason: String,
    },

    /// Unknown, finished, or aborted upload.
    #[error("upload not found: {upload_id}")]
    UploadNotFound {
        /// Upload identifier.
        upload_id: String,
    },

    /// Connection could not be built.
    #[error("storage configuration error: {0}")]
    Configuration(String),
}

impl StorageError {
    /// Create an unsupported provider error.
    #[must_use]
    pub fn unsupported_provider(provider: impl Into<String>) -> Self {
        Self::UnsupportedProvider {
            provider: provider.into(),
        }
    }

    /// Create an object not found error.
    #[must_use]
    pub fn object_not_found(provider: Provider, bucket: &str, key: &str) -> Self {
        Self::ObjectNotFound {
            provider,
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    /// Create an invalid part list error.
    #[must_use]
    pub fn invalid_part_list(reason: impl Into<String>) -> Self {
        Self::InvalidPartList {
            reason: reason.into(),
        }
    }

    /// Create an upload busy error.
    #[must_use]
    pub fn busy(upload_id: &str, reason: impl Into<String>) -> Self {
        Self::UploadSessionBusy {
            upload_id: upload_id.to_string(),
            reason: reason.into(),
        }
    }

    /// Create an upload not found error.
    #[must_use]
    pub fn upload_not_found(upload_id: &str) -> Self {
        Self::UploadNotFound {
            upload_id: upload_id.to_string(),
        }
    }

    /// Create a configuration error.
    #[must_use]
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

/// Raw provider failure before the gateway attaches context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ProviderFault {
    /// The provider says the object or upload does not exist.
    NotFound(String),
    /// The provider rejected the part or block list.
    InvalidParts(String),
    /// Anything else.
    Other(String),
}

impl ProviderFault {
    /// Attach provider, operation and target to produce a gateway error.
    pub(crate) fn into_error(
        self,
        provider: Provider,
        operation: Operation,
        bucket: &str,
        key: &str,
    ) -> StorageError {
        match self {
            Self::NotFound(_) if !is_upload_operation(operation) => {
                StorageError::object_not_found(provider, bucket, key)
            }
            Self::InvalidParts(reason) => StorageError::invalid_part_list(reason),
            Self::NotFound(cause) | Self::Other(cause) => StorageError::Upstream {
                provider,
                operation,
                bucket: bucket.to_string(),
                key: key.to_string(),
                cause,
            },
        }
    }
}

/// A missing upload on the provider side is an upstream failure, not a
/// missing object.
const fn is_upload_operation(operation: Operation) -> bool {
    matches!(
        operation,
        Operation::InitiateUpload
            | Operation::UploadPart
            | Operation::CompleteUpload
            | Operation::AbortUpload
    )
}

impl From<opendal::Error> for ProviderFault {
    fn from(err: opendal::Error) -> Self {
        match err.kind() {
            opendal::ErrorKind::NotFound => Self::NotFound(err.to_string()),
            _ => Self::Other(err.to_string()),
        }
    }
}

impl From<StorageError> for ProviderFault {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::ObjectNotFound { .. } => Self::NotFound(err.to_string()),
            StorageError::InvalidPartList { reason } => Self::InvalidParts(reason),
            other => Self::Other(other.to_string()),
        }
    }
}
