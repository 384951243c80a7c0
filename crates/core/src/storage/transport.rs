//! Provider-native chunked upload protocols.
//!
//! OpenDAL covers the uniform object operations but hides part tags and
//! block staging, so the two protocols that need them sit behind these
//! traits with a live and an in-process implementation each.

use async_trait::async_trait;
use bytes::Bytes;

use super::error::ProviderFault;
use super::types::CompletedPart;

/// Multipart protocol with server-issued part tags (provider B).
#[async_trait]
pub(crate) trait MultipartApi: Send + Sync {
    /// Start a multipart upload and return the provider's upload id.
    async fn create(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String, ProviderFault>;

    /// Upload one part and return its entity tag.
    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, ProviderFault>;

    /// Assemble the listed parts, in the order given.
    async fn complete(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), ProviderFault>;

    /// Discard the upload and its parts.
    async fn abort(&self, bucket: &str, key: &str, upload_id: &str) -> Result<(), ProviderFault>;
}

/// Block staging protocol with client-chosen block ids (provider C).
#[async_trait]
pub(crate) trait BlockApi: Send + Sync {
    /// Stage one block under the given id.
    async fn stage_block(
        &self,
        bucket: &str,
        key: &str,
        block_id: &str,
        body: Bytes,
    ) -> Result<(), ProviderFault>;

    /// Commit staged blocks, in the order given, as the object's content.
    async fn commit_blocks(
        &self,
        bucket: &str,
        key: &str,
        block_ids: &[String],
        content_type: &str,
    ) -> Result<(), ProviderFault>;

    /// Drop staged blocks that will never be committed.
    async fn discard_blocks(&self, bucket: &str, key: &str) -> Result<(), ProviderFault>;
}
