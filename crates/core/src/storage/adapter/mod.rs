//! Provider adapters.
//!
//! Uniform operations go through each adapter's [`ObjectClient`]; chunked
//! uploads dispatch on the provider's own protocol.

mod aws;
mod azure;
mod gcp;

pub use aws::AwsAdapter;
pub use azure::{AzureAdapter, block_id};
pub use gcp::GcpAdapter;

use std::sync::Arc;

use bytes::Bytes;

use super::error::StorageError;
use super::multipart::{PartBuffer, UploadHandle};
use super::objects::ObjectClient;
use super::provider::Provider;
use super::types::CompletedPart;

/// One configured provider.
pub enum ProviderAdapter {
    /// Provider A.
    Gcp(GcpAdapter),
    /// Provider B.
    Aws(AwsAdapter),
    /// Provider C.
    Azure(AzureAdapter),
}

impl ProviderAdapter {
    /// Which provider this adapter serves.
    #[must_use]
    pub const fn provider(&self) -> Provider {
        match self {
            Self::Gcp(_) => Provider::Gcp,
            Self::Aws(_) => Provider::Aws,
            Self::Azure(_) => Provider::Azure,
        }
    }

    pub(crate) const fn objects(&self) -> &ObjectClient {
        match self {
            Self::Gcp(a) => a.objects(),
            Self::Aws(a) => a.objects(),
            Self::Azure(a) => a.objects(),
        }
    }

    fn handle_mismatch(&self) -> StorageError {
        StorageError::configuration(format!(
            "upload handle does not belong to provider {}",
            self.provider()
        ))
    }

    pub(crate) async fn begin_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<UploadHandle, StorageError> {
        match self {
            Self::Gcp(_) => Ok(UploadHandle::Buffered(Arc::new(PartBuffer::default()))),
            Self::Aws(a) => a.begin_upload(bucket, key, content_type).await,
            Self::Azure(_) => Ok(UploadHandle::Staged),
        }
    }

    pub(crate) async fn upload_part(
        &self,
        handle: &UploadHandle,
        bucket: &str,
        key: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, StorageError> {
        match (self, handle) {
            (Self::Gcp(_), UploadHandle::Buffered(buffer)) => {
                Ok(GcpAdapter::upload_part(buffer, part_number, body))
            }
            (Self::Aws(a), UploadHandle::Multipart { provider_upload_id }) => {
                a.upload_part(provider_upload_id, bucket, key, part_number, body)
                    .await
            }
            (Self::Azure(a), UploadHandle::Staged) => {
                a.upload_part(bucket, key, part_number, body).await
            }
            _ => Err(self.handle_mismatch()),
        }
    }

    pub(crate) async fn complete_upload(
        &self,
        handle: &UploadHandle,
        bucket: &str,
        key: &str,
        content_type: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError> {
        match (self, handle) {
            (Self::Gcp(a), UploadHandle::Buffered(buffer)) => {
                a.complete_upload(buffer, bucket, key, content_type, parts)
                    .await
            }
            (Self::Aws(a), UploadHandle::Multipart { provider_upload_id }) => {
                a.complete_upload(provider_upload_id, bucket, key, parts)
                    .await
            }
            (Self::Azure(a), UploadHandle::Staged) => {
                a.complete_upload(bucket, key, content_type, parts).await
            }
            _ => Err(self.handle_mismatch()),
        }
    }

    pub(crate) async fn abort_upload(
        &self,
        handle: &UploadHandle,
        bucket: &str,
        key: &str,
    ) -> Result<(), StorageError> {
        match (self, handle) {
            (Self::Gcp(_), UploadHandle::Buffered(buffer)) => {
                buffer.clear();
                Ok(())
            }
            (Self::Aws(a), UploadHandle::Multipart { provider_upload_id }) => {
                a.abort_upload(provider_upload_id, bucket, key).await
            }
            (Self::Azure(a), UploadHandle::Staged) => a.abort_upload(bucket, key).await,
            _ => Err(self.handle_mismatch()),
        }
    }
}
