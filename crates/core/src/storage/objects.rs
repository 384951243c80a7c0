//! Uniform object operations on top of Apache OpenDAL.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::Utc;
use dashmap::DashMap;
use docgate_shared::{AwsConnection, AzureConnection, GcpConnection};
use futures::TryStreamExt;
use futures::future::join_all;
use opendal::{Builder, Metadata, Operator, services};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::error::{Operation, ProviderFault, StorageError};
use super::provider::Provider;
use super::types::{
    DownloadedObject, SignedUrl, StorageObjectDescriptor, UploadedObject, content_type_for_key,
    parse_timestamp,
};

/// Connection parameters for one provider.
#[derive(Clone)]
pub(crate) enum Backend {
    Gcs {
        credential: Option<String>,
        credential_path: Option<String>,
        endpoint: Option<String>,
    },
    S3 {
        region: String,
        access_key_id: String,
        secret_access_key: String,
        endpoint: Option<String>,
    },
    Azblob {
        account: String,
        access_key: String,
        endpoint: Option<String>,
    },
    Memory,
}

impl Backend {
    const fn mode(&self) -> &'static str {
        match self {
            Self::Gcs { .. } => "gcs",
            Self::S3 { .. } => "s3",
            Self::Azblob { .. } => "azblob",
            Self::Memory => "memory",
        }
    }
}

impl From<&GcpConnection> for Backend {
    fn from(connection: &GcpConnection) -> Self {
        match connection {
            GcpConnection::Gcs {
                credential,
                credential_path,
                endpoint,
            } => Self::Gcs {
                credential: credential.clone(),
                credential_path: credential_path.clone(),
                endpoint: endpoint.clone(),
            },
            GcpConnection::Memory => Self::Memory,
        }
    }
}

impl From<&AwsConnection> for Backend {
    fn from(connection: &AwsConnection) -> Self {
        match connection {
            AwsConnection::S3 {
                region,
                access_key_id,
                secret_access_key,
                endpoint,
            } => Self::S3 {
                region: region.clone(),
                access_key_id: access_key_id.clone(),
                secret_access_key: secret_access_key.clone(),
                endpoint: endpoint.clone(),
            },
            AwsConnection::Memory => Self::Memory,
        }
    }
}

impl From<&AzureConnection> for Backend {
    fn from(connection: &AzureConnection) -> Self {
        match connection {
            AzureConnection::AzureBlob {
                account,
                access_key,
                endpoint,
            } => Self::Azblob {
                account: account.clone(),
                access_key: access_key.clone(),
                endpoint: endpoint.clone(),
            },
            AzureConnection::Memory => Self::Memory,
        }
    }
}

/// Per-provider object client.
///
/// Operators are bucket-scoped in OpenDAL, so one is built lazily per bucket
/// and cached. Clones share the cache.
#[derive(Clone)]
pub(crate) struct ObjectClient {
    provider: Provider,
    backend: Arc<Backend>,
    operators: Arc<DashMap<String, Operator>>,
    list_limit: usize,
}

impl fmt::Debug for ObjectClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectClient")
            .field("provider", &self.provider)
            .field("mode", &self.backend.mode())
            .field("buckets", &self.operators.len())
            .finish_non_exhaustive()
    }
}

impl ObjectClient {
    pub(crate) fn new(provider: Provider, backend: Backend, list_limit: usize) -> Self {
        Self {
            provider,
            backend: Arc::new(backend),
            operators: Arc::new(DashMap::new()),
            list_limit,
        }
    }

    pub(crate) const fn provider(&self) -> Provider {
        self.provider
    }

    pub(crate) fn is_memory(&self) -> bool {
        matches!(*self.backend, Backend::Memory)
    }

    /// Operator for a bucket, built on first use.
    pub(crate) fn operator(&self, bucket: &str) -> Result<Operator, StorageError> {
        if let Some(op) = self.operators.get(bucket) {
            return Ok(op.value().clone());
        }
        let op = create_operator(&self.backend, bucket)?;
        debug!(provider = %self.provider, bucket, mode = self.backend.mode(), "Built storage operator");
        Ok(self
            .operators
            .entry(bucket.to_string())
            .or_insert(op)
            .value()
            .clone())
    }

    fn fail(
        &self,
        operation: Operation,
        bucket: &str,
        key: &str,
    ) -> impl Fn(opendal::Error) -> StorageError {
        let provider = self.provider;
        let bucket = bucket.to_string();
        let key = key.to_string();
        move |err| ProviderFault::from(err).into_error(provider, operation, &bucket, &key)
    }

    /// List objects under a prefix, recursively, up to the list limit.
    pub(crate) async fn list(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<StorageObjectDescriptor>, StorageError> {
        let op = self.operator(bucket)?;
        let fail = self.fail(Operation::List, bucket, prefix);
        let path = if prefix.is_empty() { "/" } else { prefix };

        let mut lister = op
            .lister_with(path)
            .recursive(true)
            .await
            .map_err(&fail)?;

        let mut listed = Vec::new();
        while let Some(entry) = lister.try_next().await.map_err(&fail)? {
            if entry.metadata().is_dir() {
                continue;
            }
            let (path, meta) = entry.into_parts();
            listed.push((path, meta));
            if listed.len() >= self.list_limit {
                break;
            }
        }

        Ok(self
            .describe_all(bucket, listed, |path| {
                let op = op.clone();
                async move { op.stat(&path).await }
            })
            .await)
    }

    /// Build descriptors for listed entries, in listing order.
    ///
    /// Entries whose listing metadata is incomplete are stat'ed; a failed
    /// stat degrades that one entry to defaults.
    async fn describe_all<F, Fut>(
        &self,
        bucket: &str,
        listed: Vec<(String, Metadata)>,
        stat: F,
    ) -> Vec<StorageObjectDescriptor>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = opendal::Result<Metadata>>,
    {
        let provider = self.provider;
        let stat = &stat;
        join_all(listed.into_iter().map(|(path, meta)| async move {
            if meta.last_modified().is_some() && meta.etag().is_some() {
                return descriptor_from(&path, &meta);
            }
            match stat(path.clone()).await {
                Ok(meta) => descriptor_from(&path, &meta),
                Err(err) => {
                    warn!(
                        %provider,
                        bucket,
                        key = %path,
                        error = %err,
                        "Metadata fetch failed, returning defaults"
                    );
                    StorageObjectDescriptor::placeholder(&path)
                }
            }
        }))
        .await
    }

    /// Write an object in one shot.
    pub(crate) async fn write(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<UploadedObject, StorageError> {
        let size_bytes = bytes.len() as u64;
        self.put(bucket, key, bytes, content_type)
            .await
            .map_err(|fault| fault.into_error(self.provider, Operation::Upload, bucket, key))?;
        Ok(UploadedObject {
            provider: self.provider,
            bucket: bucket.to_string(),
            key: key.to_string(),
            location_hint: self.provider.location_hint(bucket, key),
            size_bytes,
        })
    }

    /// Raw write used by emulators, which attach their own context.
    pub(crate) async fn put(
        &self,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), ProviderFault> {
        let op = self.operator(bucket)?;
        if op.info().full_capability().write_with_content_type {
            op.write_with(key, bytes)
                .content_type(content_type)
                .await?;
        } else {
            op.write(key, bytes).await?;
        }
        Ok(())
    }

    /// Read an object and its content type.
    pub(crate) async fn read(
        &self,
        bucket: &str,
        key: &str,
    ) -> Result<DownloadedObject, StorageError> {
        let op = self.operator(bucket)?;
        let fail = self.fail(Operation::Download, bucket, key);

        let meta = op.stat(key).await.map_err(&fail)?;
        let buffer = op.read(key).await.map_err(&fail)?;

        let bytes = buffer.to_bytes();
        Ok(DownloadedObject {
            size: bytes.len() as u64,
            bytes,
            content_type: meta
                .content_type()
                .map_or_else(|| content_type_for_key(key).to_string(), str::to_string),
        })
    }

    /// Delete an object. Deleting a missing key succeeds unless the
    /// provider itself answers not-found.
    pub(crate) async fn delete(&self, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.operator(bucket)?
            .delete(key)
            .await
            .map_err(self.fail(Operation::Delete, bucket, key))
    }

    /// Time-limited read URL.
    pub(crate) async fn presign_read(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<SignedUrl, StorageError> {
        let expires_at = Utc::now()
            + chrono::Duration::from_std(ttl)
                .map_err(|e| StorageError::configuration(e.to_string()))?;

        if self.is_memory() {
            let fail = self.fail(Operation::Presign, bucket, key);
            self.operator(bucket)?.stat(key).await.map_err(&fail)?;
            return Ok(SignedUrl {
                url: emulated_url(self.provider, bucket, key, expires_at.timestamp()),
                expires_at,
            });
        }

        let presigned = self
            .operator(bucket)?
            .presign_read(key, ttl)
            .await
            .map_err(self.fail(Operation::Presign, bucket, key))?;

        Ok(SignedUrl {
            url: presigned.uri().to_string(),
            expires_at,
        })
    }

    /// Time-limited write URL, used for block staging.
    pub(crate) async fn presign_write(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> Result<String, ProviderFault> {
        let presigned = self.operator(bucket)?.presign_write(key, ttl).await?;
        Ok(presigned.uri().to_string())
    }
}

fn create_operator(backend: &Backend, bucket: &str) -> Result<Operator, StorageError> {
    match backend {
        Backend::Gcs {
            credential,
            credential_path,
            endpoint,
        } => {
            let mut builder = services::Gcs::default().bucket(bucket);
            if let Some(credential) = credential {
                builder = builder.credential(credential);
            }
            if let Some(path) = credential_path {
                builder = builder.credential_path(path);
            }
            if let Some(endpoint) = endpoint {
                builder = builder.endpoint(endpoint);
            }
            finish(builder)
        }
        Backend::S3 {
            region,
            access_key_id,
            secret_access_key,
            endpoint,
        } => {
            let mut builder = services::S3::default()
                .bucket(bucket)
                .region(region)
                .access_key_id(access_key_id)
                .secret_access_key(secret_access_key);
            if let Some(endpoint) = endpoint {
                builder = builder.endpoint(endpoint);
            }
            finish(builder)
        }
        Backend::Azblob {
            account,
            access_key,
            endpoint,
        } => {
            let endpoint = endpoint
                .clone()
                .unwrap_or_else(|| format!("https://{account}.blob.core.windows.net"));
            let builder = services::Azblob::default()
                .container(bucket)
                .account_name(account)
                .account_key(access_key)
                .endpoint(&endpoint);
            finish(builder)
        }
        Backend::Memory => finish(services::Memory::default()),
    }
}

fn finish(builder: impl Builder) -> Result<Operator, StorageError> {
    Ok(Operator::new(builder)
        .map_err(|e| StorageError::configuration(e.to_string()))?
        .finish())
}

fn descriptor_from(path: &str, meta: &Metadata) -> StorageObjectDescriptor {
    StorageObjectDescriptor {
        name: path.to_string(),
        size_bytes: meta.content_length(),
        last_modified: meta
            .last_modified()
            .and_then(|ts| parse_timestamp(&ts.to_string()))
            .unwrap_or_default(),
        content_type: meta
            .content_type()
            .map_or_else(|| content_type_for_key(path).to_string(), str::to_string),
        etag: meta.etag().unwrap_or_default().to_string(),
        content_hash: meta.content_md5().map(str::to_string),
    }
}

/// Signed-looking URL for the in-process emulator.
fn emulated_url(provider: Provider, bucket: &str, key: &str, expires: i64) -> String {
    let signature = Sha256::digest(format!("{provider}:{bucket}:{key}:{expires}").as_bytes());
    format!("memory://{provider}/{bucket}/{key}?expires={expires}&signature={signature:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use opendal::{EntryMode, ErrorKind};

    fn memory_client() -> ObjectClient {
        ObjectClient::new(Provider::Gcp, Backend::Memory, 1000)
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let client = memory_client();
        let uploaded = client
            .write("docs", "a/report.pdf", Bytes::from_static(b"%PDF-1.4"), "application/pdf")
            .await
            .expect("write");
        assert_eq!(uploaded.size_bytes, 8);
        assert_eq!(uploaded.location_hint, "gs://docs/a/report.pdf");

        let downloaded = client.read("docs", "a/report.pdf").await.expect("read");
        assert_eq!(downloaded.bytes.as_ref(), b"%PDF-1.4");
        assert_eq!(downloaded.size, 8);
        assert_eq!(downloaded.content_type, "application/pdf");
    }

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let client = memory_client();
        client
            .write("one", "k.txt", Bytes::from_static(b"x"), "text/plain")
            .await
            .expect("write");
        let err = client.read("two", "k.txt").await.unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_succeeds() {
        let client = memory_client();
        client.delete("docs", "missing.pdf").await.expect("delete");

        client
            .write("docs", "there.pdf", Bytes::from_static(b"1"), "application/pdf")
            .await
            .expect("write");
        client.delete("docs", "there.pdf").await.expect("delete");
        let err = client.read("docs", "there.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { ref key, .. } if key == "there.pdf"));
    }

    #[tokio::test]
    async fn test_failed_stat_degrades_only_that_entry() {
        let client = memory_client();
        let listed = ["in/a.pdf", "in/broken.pdf", "in/c.txt"]
            .into_iter()
            .map(|path| (path.to_string(), Metadata::new(EntryMode::FILE)))
            .collect();

        let described = client
            .describe_all("docs", listed, |path| async move {
                if path.ends_with("broken.pdf") {
                    Err(opendal::Error::new(ErrorKind::Unexpected, "stat refused"))
                } else {
                    Ok(Metadata::new(EntryMode::FILE).with_content_length(4))
                }
            })
            .await;

        assert_eq!(described.len(), 3);
        assert_eq!(described[0].name, "in/a.pdf");
        assert_eq!(described[0].size_bytes, 4);
        assert_eq!(described[1], StorageObjectDescriptor::placeholder("in/broken.pdf"));
        assert_eq!(described[2].content_type, "text/plain");
        assert_eq!(described[2].size_bytes, 4);
    }

    #[tokio::test]
    async fn test_list_respects_prefix_and_limit() {
        let client = ObjectClient::new(Provider::Aws, Backend::Memory, 2);
        for key in ["in/a.pdf", "in/b.pdf", "in/c.pdf", "out/d.pdf"] {
            client
                .write("docs", key, Bytes::from_static(b"data"), "application/pdf")
                .await
                .expect("write");
        }

        let listed = client.list("docs", "in/").await.expect("list");
        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|d| d.name.starts_with("in/")));
        assert!(listed.iter().all(|d| d.size_bytes == 4));
    }

    #[tokio::test]
    async fn test_emulated_presign_requires_existing_object() {
        let client = memory_client();
        let err = client
            .presign_read("docs", "nope.pdf", Duration::from_secs(3600))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));

        client
            .write("docs", "yes.pdf", Bytes::from_static(b"1"), "application/pdf")
            .await
            .expect("write");
        let signed = client
            .presign_read("docs", "yes.pdf", Duration::from_secs(3600))
            .await
            .expect("presign");
        assert!(signed.url.starts_with("memory://gcp/docs/yes.pdf?expires="));
        assert!(signed.expires_at > Utc::now());
    }

    #[test]
    fn test_operator_cache_is_shared_between_clones() {
        let client = memory_client();
        let clone = client.clone();
        client.operator("docs").expect("operator");
        assert_eq!(clone.operators.len(), 1);
    }
}
