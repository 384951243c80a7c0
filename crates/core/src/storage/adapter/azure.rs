//! Provider C: Azure Blob Storage.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::Bytes;
use docgate_shared::AzureConnection;
use reqwest::{StatusCode, Url};

use crate::storage::emulator::MemoryBlocks;
use crate::storage::error::{Operation, ProviderFault, StorageError};
use crate::storage::objects::{Backend, ObjectClient};
use crate::storage::provider::Provider;
use crate::storage::transport::BlockApi;
use crate::storage::types::CompletedPart;

/// Lifetime of the SAS URLs used for block calls.
const BLOCK_URL_TTL: Duration = Duration::from_secs(15 * 60);

/// Digits in a block id. Covers every part number up to `MAX_PART_NUMBER`.
const BLOCK_ID_DIGITS: usize = 6;

/// Block id for a part number: base64 of the zero-padded decimal, so every
/// id of an upload has the same length.
#[must_use]
pub fn block_id(part_number: u32) -> String {
    STANDARD.encode(format!("{part_number:0width$}", width = BLOCK_ID_DIGITS))
}

/// Azure Blob adapter: staged blocks, block ids as part tokens.
pub struct AzureAdapter {
    objects: ObjectClient,
    blocks: Arc<dyn BlockApi>,
}

impl AzureAdapter {
    pub(crate) fn connect(connection: &AzureConnection, list_limit: usize) -> Self {
        let objects = ObjectClient::new(Provider::Azure, Backend::from(connection), list_limit);
        let blocks: Arc<dyn BlockApi> = match connection {
            AzureConnection::AzureBlob { .. } => Arc::new(SasBlocks {
                objects: objects.clone(),
                http: reqwest::Client::new(),
            }),
            AzureConnection::Memory => Arc::new(MemoryBlocks::new(objects.clone())),
        };
        Self { objects, blocks }
    }

    pub(crate) const fn objects(&self) -> &ObjectClient {
        &self.objects
    }

    pub(crate) async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, StorageError> {
        let id = block_id(part_number);
        self.blocks
            .stage_block(bucket, key, &id, body)
            .await
            .map_err(|f| f.into_error(Provider::Azure, Operation::UploadPart, bucket, key))?;
        Ok(id)
    }

    pub(crate) async fn complete_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError> {
        let ids: Vec<String> = parts.iter().map(|p| p.part_token.clone()).collect();
        self.blocks
            .commit_blocks(bucket, key, &ids, content_type)
            .await
            .map_err(|f| f.into_error(Provider::Azure, Operation::CompleteUpload, bucket, key))
    }

    pub(crate) async fn abort_upload(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.blocks
            .discard_blocks(bucket, key)
            .await
            .map_err(|f| f.into_error(Provider::Azure, Operation::AbortUpload, bucket, key))
    }
}

/// Block calls against SAS URLs signed by the blob operator.
struct SasBlocks {
    objects: ObjectClient,
    http: reqwest::Client,
}

impl SasBlocks {
    async fn signed_url(&self, bucket: &str, key: &str) -> Result<Url, ProviderFault> {
        let raw = self.objects.presign_write(bucket, key, BLOCK_URL_TTL).await?;
        Url::parse(&raw).map_err(|e| ProviderFault::Other(format!("bad signed url: {e}")))
    }

    async fn check(response: reqwest::Response) -> Result<(), ProviderFault> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let code = response
            .headers()
            .get("x-ms-error-code")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await.unwrap_or_default();
        let message = format!("{status} {code}: {body}");
        Err(match (status, code.as_str()) {
            (_, "InvalidBlockList" | "InvalidBlockId") => ProviderFault::InvalidParts(message),
            (StatusCode::NOT_FOUND, _) => ProviderFault::NotFound(message),
            _ => ProviderFault::Other(message),
        })
    }
}

fn transport_fault(err: &reqwest::Error) -> ProviderFault {
    ProviderFault::Other(err.to_string())
}

/// `Put Block List` body.
fn block_list_xml(block_ids: &[String]) -> String {
    let mut xml = String::from(r#"<?xml version="1.0" encoding="utf-8"?><BlockList>"#);
    for id in block_ids {
        let _ = write!(xml, "<Latest>{id}</Latest>");
    }
    xml.push_str("</BlockList>");
    xml
}

#[async_trait]
impl BlockApi for SasBlocks {
    async fn stage_block(
        &self,
        bucket: &str,
        key: &str,
        block_id: &str,
        body: Bytes,
    ) -> Result<(), ProviderFault> {
        let mut url = self.signed_url(bucket, key).await?;
        url.query_pairs_mut()
            .append_pair("comp", "block")
            .append_pair("blockid", block_id);

        let response = self
            .http
            .put(url)
            .body(body)
            .send()
            .await
            .map_err(|e| transport_fault(&e))?;
        Self::check(response).await
    }

    async fn commit_blocks(
        &self,
        bucket: &str,
        key: &str,
        block_ids: &[String],
        content_type: &str,
    ) -> Result<(), ProviderFault> {
        let mut url = self.signed_url(bucket, key).await?;
        url.query_pairs_mut().append_pair("comp", "blocklist");

        let response = self
            .http
            .put(url)
            .header("content-type", "application/xml")
            .header("x-ms-blob-content-type", content_type)
            .body(block_list_xml(block_ids))
            .send()
            .await
            .map_err(|e| transport_fault(&e))?;
        Self::check(response).await
    }

    async fn discard_blocks(&self, _bucket: &str, _key: &str) -> Result<(), ProviderFault> {
        // Uncommitted blocks are garbage-collected by the service.
        Ok(())
    }
}
