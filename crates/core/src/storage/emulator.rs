//! In-process emulation of the provider chunk protocols.
//!
//! Assembled objects land in the same memory operators the [`ObjectClient`]
//! serves, so a completed upload is immediately listable and downloadable.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bytes::{Bytes, BytesMut};
use dashmap::DashMap;
use uuid::Uuid;

use super::error::ProviderFault;
use super::multipart::digest_hex;
use super::objects::ObjectClient;
use super::transport::{BlockApi, MultipartApi};
use super::types::CompletedPart;

struct PendingMultipart {
    bucket: String,
    key: String,
    content_type: String,
    parts: BTreeMap<u32, (String, Bytes)>,
}

/// Emulates S3 multipart: quoted MD5-style tags, strict ascending order on
/// completion, and rejection of unknown or mismatched parts.
pub(crate) struct MemoryMultipart {
    objects: ObjectClient,
    uploads: DashMap<String, PendingMultipart>,
}

impl MemoryMultipart {
    pub(crate) fn new(objects: ObjectClient) -> Self {
        Self {
            objects,
            uploads: DashMap::new(),
        }
    }

    fn no_such_upload(upload_id: &str) -> ProviderFault {
        ProviderFault::NotFound(format!("NoSuchUpload: {upload_id}"))
    }
}

#[async_trait]
impl MultipartApi for MemoryMultipart {
    async fn create(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String, ProviderFault> {
        let upload_id = Uuid::new_v4().simple().to_string();
        self.uploads.insert(
            upload_id.clone(),
            PendingMultipart {
                bucket: bucket.to_string(),
                key: key.to_string(),
                content_type: content_type.to_string(),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, ProviderFault> {
        let mut pending = self
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| Self::no_such_upload(upload_id))?;
        let etag = format!("\"{}\"", &digest_hex(&body)[..32]);
        pending.parts.insert(part_number, (etag.clone(), body));
        Ok(etag)
    }

    async fn complete(
        &self,
        _bucket: &str,
        _key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), ProviderFault> {
        let (bucket, key, content_type, body) = {
            let pending = self
                .uploads
                .get(upload_id)
                .ok_or_else(|| Self::no_such_upload(upload_id))?;

            if parts.is_empty() {
                return Err(ProviderFault::InvalidParts(
                    "MalformedXML: at least one part is required".into(),
                ));
            }
            if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
                return Err(ProviderFault::InvalidParts(
                    "InvalidPartOrder: parts must be in ascending order".into(),
                ));
            }

            let mut body = BytesMut::new();
            for part in parts {
                match pending.parts.get(&part.part_number) {
                    Some((etag, bytes)) if *etag == part.part_token => body.extend_from_slice(bytes),
                    _ => {
                        return Err(ProviderFault::InvalidParts(format!(
                            "InvalidPart: part {} was not found or its tag does not match",
                            part.part_number
                        )));
                    }
                }
            }
            (
                pending.bucket.clone(),
                pending.key.clone(),
                pending.content_type.clone(),
                body.freeze(),
            )
        };

        self.objects.put(&bucket, &key, body, &content_type).await?;
        self.uploads.remove(upload_id);
        Ok(())
    }

    async fn abort(&self, _bucket: &str, _key: &str, upload_id: &str) -> Result<(), ProviderFault> {
        self.uploads
            .remove(upload_id)
            .map(|_| ())
            .ok_or_else(|| Self::no_such_upload(upload_id))
    }
}

/// Emulates block staging: ids must be base64 of equal length within one
/// blob, and a commit may only reference staged ids.
pub(crate) struct MemoryBlocks {
    objects: ObjectClient,
    staged: DashMap<(String, String), HashMap<String, Bytes>>,
}

impl MemoryBlocks {
    pub(crate) fn new(objects: ObjectClient) -> Self {
        Self {
            objects,
            staged: DashMap::new(),
        }
    }
}

#[async_trait]
impl BlockApi for MemoryBlocks {
    async fn stage_block(
        &self,
        bucket: &str,
        key: &str,
        block_id: &str,
        body: Bytes,
    ) -> Result<(), ProviderFault> {
        if STANDARD.decode(block_id).is_err() {
            return Err(ProviderFault::InvalidParts(format!(
                "InvalidBlockId: '{block_id}' is not valid base64"
            )));
        }
        let mut blocks = self
            .staged
            .entry((bucket.to_string(), key.to_string()))
            .or_default();
        if blocks.keys().next().is_some_and(|id| id.len() != block_id.len()) {
            return Err(ProviderFault::InvalidParts(
                "InvalidBlockId: block ids must have equal length".into(),
            ));
        }
        blocks.insert(block_id.to_string(), body);
        Ok(())
    }

    async fn commit_blocks(
        &self,
        bucket: &str,
        key: &str,
        block_ids: &[String],
        content_type: &str,
    ) -> Result<(), ProviderFault> {
        let target = (bucket.to_string(), key.to_string());
        let body = {
            let blocks = self.staged.get(&target).ok_or_else(|| {
                ProviderFault::InvalidParts("InvalidBlockList: no blocks staged".into())
            })?;
            let mut body = BytesMut::new();
            for id in block_ids {
                let block = blocks.get(id).ok_or_else(|| {
                    ProviderFault::InvalidParts(format!(
                        "InvalidBlockList: block '{id}' was never staged"
                    ))
                })?;
                body.extend_from_slice(block);
            }
            body.freeze()
        };

        self.objects.put(bucket, key, body, content_type).await?;
        self.staged.remove(&target);
        Ok(())
    }

    async fn discard_blocks(&self, bucket: &str, key: &str) -> Result<(), ProviderFault> {
        self.staged.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::objects::Backend;
    use crate::storage::provider::Provider;

    fn objects(provider: Provider) -> ObjectClient {
        ObjectClient::new(provider, Backend::Memory, 1000)
    }

    #[tokio::test]
    async fn test_multipart_assembles_in_order() {
        let objects = objects(Provider::Aws);
        let api = MemoryMultipart::new(objects.clone());
        let id = api.create("b", "k.bin", "application/octet-stream").await.unwrap();

        let t2 = api.upload_part("b", "k.bin", &id, 2, Bytes::from_static(b"world")).await.unwrap();
        let t1 = api.upload_part("b", "k.bin", &id, 1, Bytes::from_static(b"hello ")).await.unwrap();
        assert!(t1.starts_with('"') && t1.ends_with('"'));

        api.complete("b", "k.bin", &id, &[CompletedPart::new(1, t1), CompletedPart::new(2, t2)])
            .await
            .unwrap();

        let read = objects.read("b", "k.bin").await.unwrap();
        assert_eq!(read.bytes.as_ref(), b"hello world");
        assert!(api.uploads.is_empty());
    }

    #[tokio::test]
    async fn test_multipart_rejects_descending_order() {
        let api = MemoryMultipart::new(objects(Provider::Aws));
        let id = api.create("b", "k", "text/plain").await.unwrap();
        let t1 = api.upload_part("b", "k", &id, 1, Bytes::from_static(b"a")).await.unwrap();
        let t2 = api.upload_part("b", "k", &id, 2, Bytes::from_static(b"b")).await.unwrap();

        let err = api
            .complete("b", "k", &id, &[CompletedPart::new(2, t2), CompletedPart::new(1, t1)])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderFault::InvalidParts(ref r) if r.starts_with("InvalidPartOrder")));
        assert!(api.uploads.contains_key(&id));
    }

    #[tokio::test]
    async fn test_multipart_rejects_wrong_tag() {
        let api = MemoryMultipart::new(objects(Provider::Aws));
        let id = api.create("b", "k", "text/plain").await.unwrap();
        api.upload_part("b", "k", &id, 1, Bytes::from_static(b"a")).await.unwrap();

        let err = api
            .complete("b", "k", &id, &[CompletedPart::new(1, "\"bogus\"")])
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderFault::InvalidParts(ref r) if r.starts_with("InvalidPart:")));
    }

    #[tokio::test]
    async fn test_multipart_unknown_upload() {
        let api = MemoryMultipart::new(objects(Provider::Aws));
        let err = api.abort("b", "k", "nope").await.unwrap_err();
        assert!(matches!(err, ProviderFault::NotFound(_)));
    }

    #[tokio::test]
    async fn test_blocks_commit_in_listed_order() {
        let objects = objects(Provider::Azure);
        let api = MemoryBlocks::new(objects.clone());
        let a = STANDARD.encode("block-000001");
        let b = STANDARD.encode("block-000002");
        api.stage_block("c", "k.txt", &b, Bytes::from_static(b"two")).await.unwrap();
        api.stage_block("c", "k.txt", &a, Bytes::from_static(b"one")).await.unwrap();

        api.commit_blocks("c", "k.txt", &[a, b], "text/plain").await.unwrap();
        let read = objects.read("c", "k.txt").await.unwrap();
        assert_eq!(read.bytes.as_ref(), b"onetwo");
    }

    #[tokio::test]
    async fn test_blocks_commit_rejects_unstaged_id() {
        let api = MemoryBlocks::new(objects(Provider::Azure));
        let a = STANDARD.encode("block-000001");
        api.stage_block("c", "k", &a, Bytes::from_static(b"x")).await.unwrap();

        let err = api
            .commit_blocks("c", "k", &[a, STANDARD.encode("block-000009")], "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderFault::InvalidParts(_)));
    }

    #[tokio::test]
    async fn test_blocks_reject_mixed_id_lengths() {
        let api = MemoryBlocks::new(objects(Provider::Azure));
        api.stage_block("c", "k", &STANDARD.encode("aaaa"), Bytes::new()).await.unwrap();
        let err = api
            .stage_block("c", "k", &STANDARD.encode("aaaaaaaa"), Bytes::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderFault::InvalidParts(_)));
    }
}
