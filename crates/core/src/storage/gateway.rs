//! The storage gateway.

use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::adapter::{AwsAdapter, AzureAdapter, GcpAdapter, ProviderAdapter};
use super::config::GatewayConfig;
use super::error::StorageError;
use super::multipart::{UploadSession, lock};
use super::provider::Provider;
use super::types::{
    CompletedPart, DownloadedObject, SignedUrl, StorageObjectDescriptor, UploadStatus,
    UploadedObject, content_type_for_key,
};

/// Signed URL lifetime bounds, in hours.
pub const SIGNED_URL_TTL_HOURS: std::ops::RangeInclusive<u32> = 1..=168;

/// Uniform facade over the configured providers.
///
/// Stateless for object operations. Chunked uploads are tracked in process
/// and keyed by a gateway-issued upload id.
pub struct StorageGateway {
    gcp: Option<ProviderAdapter>,
    aws: Option<ProviderAdapter>,
    azure: Option<ProviderAdapter>,
    uploads: DashMap<String, Arc<Mutex<UploadSession>>>,
    upload_idle_timeout: Duration,
}

impl fmt::Debug for StorageGateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageGateway")
            .field("providers", &self.configured_providers())
            .field("uploads", &self.uploads.len())
            .field("upload_idle_timeout", &self.upload_idle_timeout)
            .finish_non_exhaustive()
    }
}

impl StorageGateway {
    /// Build adapters for every configured provider.
    #[must_use]
    pub fn new(config: &GatewayConfig) -> Self {
        let limit = config.list_limit;
        let gateway = Self {
            gcp: config
                .gcp
                .as_ref()
                .map(|c| ProviderAdapter::Gcp(GcpAdapter::connect(c, limit))),
            aws: config
                .aws
                .as_ref()
                .map(|c| ProviderAdapter::Aws(AwsAdapter::connect(c, limit))),
            azure: config
                .azure
                .as_ref()
                .map(|c| ProviderAdapter::Azure(AzureAdapter::connect(c, limit))),
            uploads: DashMap::new(),
            upload_idle_timeout: config.upload_idle_timeout,
        };
        info!(providers = ?gateway.configured_providers(), "Storage gateway ready");
        gateway
    }

    /// Providers with a configured connection.
    #[must_use]
    pub fn configured_providers(&self) -> Vec<Provider> {
        Provider::ALL
            .into_iter()
            .filter(|p| self.slot(*p).is_some())
            .collect()
    }

    const fn slot(&self, provider: Provider) -> Option<&ProviderAdapter> {
        match provider {
            Provider::Gcp => self.gcp.as_ref(),
            Provider::Aws => self.aws.as_ref(),
            Provider::Azure => self.azure.as_ref(),
        }
    }

    /// Adapter for a provider.
    pub fn client(&self, provider: Provider) -> Result<&ProviderAdapter, StorageError> {
        self.slot(provider)
            .ok_or(StorageError::ProviderNotConfigured { provider })
    }

    /// List objects under a prefix, recursively.
    pub async fn list(
        &self,
        provider: Provider,
        bucket: &str,
        prefix: &str,
    ) -> Result<Vec<StorageObjectDescriptor>, StorageError> {
        let objects = self.client(provider)?.objects().list(bucket, prefix).await?;
        debug!(%provider, bucket, prefix, count = objects.len(), "Listed objects");
        Ok(objects)
    }

    /// Write an object in one shot.
    ///
    /// The content type is derived from the key when not supplied.
    pub async fn upload(
        &self,
        provider: Provider,
        bucket: &str,
        key: &str,
        bytes: Bytes,
        content_type: Option<&str>,
    ) -> Result<UploadedObject, StorageError> {
        let content_type = content_type.unwrap_or_else(|| content_type_for_key(key));
        let uploaded = self
            .client(provider)?
            .objects()
            .write(bucket, key, bytes, content_type)
            .await?;
        info!(%provider, bucket, key, size = uploaded.size_bytes, "Uploaded object");
        Ok(uploaded)
    }

    /// Read an object.
    pub async fn download(
        &self,
        provider: Provider,
        bucket: &str,
        key: &str,
    ) -> Result<DownloadedObject, StorageError> {
        self.client(provider)?.objects().read(bucket, key).await
    }

    /// Delete an object.
    pub async fn delete(&self, provider: Provider, bucket: &str, key: &str) -> Result<(), StorageError> {
        self.client(provider)?.objects().delete(bucket, key).await?;
        info!(%provider, bucket, key, "Deleted object");
        Ok(())
    }

    /// Time-limited read URL. Bounds on `ttl_hours` are enforced by callers.
    pub async fn generate_signed_url(
        &self,
        provider: Provider,
        bucket: &str,
        key: &str,
        ttl_hours: u32,
    ) -> Result<SignedUrl, StorageError> {
        let ttl = Duration::from_secs(u64::from(ttl_hours) * 3600);
        self.client(provider)?
            .objects()
            .presign_read(bucket, key, ttl)
            .await
    }

    /// Start a chunked upload and return its id.
    pub async fn initiate_upload(
        &self,
        provider: Provider,
        bucket: &str,
        key: &str,
        content_type: Option<&str>,
    ) -> Result<String, StorageError> {
        let adapter = self.client(provider)?;
        let content_type = content_type.unwrap_or_else(|| content_type_for_key(key));
        let handle = adapter.begin_upload(bucket, key, content_type).await?;

        let upload_id = Uuid::now_v7().simple().to_string();
        let session = UploadSession::new(
            upload_id.clone(),
            provider,
            bucket,
            key,
            content_type,
            handle,
        );
        self.uploads
            .insert(upload_id.clone(), Arc::new(Mutex::new(session)));
        info!(%provider, bucket, key, upload_id = %upload_id, "Initiated chunked upload");
        Ok(upload_id)
    }

    fn session(&self, upload_id: &str) -> Result<Arc<Mutex<UploadSession>>, StorageError> {
        self.uploads
            .get(upload_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| StorageError::upload_not_found(upload_id))
    }

    /// Transfer one part and return its token.
    ///
    /// Parts may arrive in any order and concurrently.
    pub async fn upload_part(
        &self,
        upload_id: &str,
        part_number: u32,
        bytes: Bytes,
    ) -> Result<String, StorageError> {
        let session = self.session(upload_id)?;
        let (adapter, handle, bucket, key) = {
            let mut guard = lock(&session);
            let adapter = self.client(guard.provider)?;
            let handle = guard.begin_part(part_number)?;
            (adapter, handle, guard.bucket.clone(), guard.key.clone())
        };

        let size = bytes.len() as u64;
        let transfer = PartTransfer::new(&session, part_number);
        let result = adapter
            .upload_part(&handle, &bucket, &key, part_number, bytes)
            .await;
        transfer.finish(result.as_ref().ok().map(|token| (token.as_str(), size)));

        if let Err(err) = &result {
            warn!(upload_id, part_number, error = %err, "Part upload failed");
        }
        result
    }

    /// Assemble the listed parts into the final object.
    ///
    /// The list may be in any order; parts are assembled by ascending part
    /// number. On failure the upload stays open and can be retried.
    pub async fn complete_upload(
        &self,
        upload_id: &str,
        bucket: &str,
        key: &str,
        parts: &[CompletedPart],
    ) -> Result<UploadedObject, StorageError> {
        let session = self.session(upload_id)?;
        let (adapter, handle, content_type, ordered, size) = {
            let mut guard = lock(&session);
            let adapter = self.client(guard.provider)?;
            let (ordered, size) = guard.begin_complete(bucket, key, parts)?;
            (
                adapter,
                guard.handle.clone(),
                guard.content_type.clone(),
                ordered,
                size,
            )
        };

        let completion = Completion::new(&session);
        match adapter
            .complete_upload(&handle, bucket, key, &content_type, &ordered)
            .await
        {
            Ok(()) => {
                completion.succeed();
                self.uploads.remove(upload_id);
                let provider = adapter.provider();
                info!(%provider, bucket, key, upload_id, parts = ordered.len(), size, "Completed chunked upload");
                Ok(UploadedObject {
                    provider,
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    location_hint: provider.location_hint(bucket, key),
                    size_bytes: size,
                })
            }
            Err(err) => {
                completion.fail();
                warn!(upload_id, error = %err, "Chunked upload completion failed");
                Err(err)
            }
        }
    }

    /// Cancel a chunked upload and release provider-side parts.
    pub async fn abort_upload(&self, upload_id: &str) -> Result<(), StorageError> {
        let session = self.session(upload_id)?;
        let (adapter, handle, bucket, key) = {
            let mut guard = lock(&session);
            let adapter = self.client(guard.provider)?;
            guard.begin_abort()?;
            (
                adapter,
                guard.handle.clone(),
                guard.bucket.clone(),
                guard.key.clone(),
            )
        };
        self.uploads.remove(upload_id);
        adapter.abort_upload(&handle, &bucket, &key).await?;
        info!(upload_id, bucket = %bucket, key = %key, "Aborted chunked upload");
        Ok(())
    }

    /// Snapshot of an upload in progress.
    pub fn upload_status(&self, upload_id: &str) -> Result<UploadStatus, StorageError> {
        let session = self.session(upload_id)?;
        let status = lock(&session).status();
        Ok(status)
    }

    /// Number of uploads being tracked.
    #[must_use]
    pub fn active_uploads(&self) -> usize {
        self.uploads.len()
    }

    /// Abort uploads idle past the configured timeout. Returns how many.
    pub async fn sweep_idle_uploads(&self) -> usize {
        let now = Instant::now();
        let idle: Vec<String> = self
            .uploads
            .iter()
            .filter(|entry| lock(entry.value()).is_idle(now, self.upload_idle_timeout))
            .map(|entry| entry.key().clone())
            .collect();

        let mut aborted = 0;
        for upload_id in idle {
            match self.abort_upload(&upload_id).await {
                Ok(()) => aborted += 1,
                Err(err) => warn!(upload_id = %upload_id, error = %err, "Idle upload abort failed"),
            }
        }
        if aborted > 0 {
            info!(aborted, "Swept idle chunked uploads");
        }
        aborted
    }
}

/// Tracks one running part transfer. If dropped before `finish` (the
/// request was cancelled) the transfer is released without acknowledgement.
struct PartTransfer<'a> {
    session: &'a Mutex<UploadSession>,
    part_number: u32,
    finished: bool,
}

impl<'a> PartTransfer<'a> {
    const fn new(session: &'a Mutex<UploadSession>, part_number: u32) -> Self {
        Self {
            session,
            part_number,
            finished: false,
        }
    }

    fn finish(mut self, outcome: Option<(&str, u64)>) {
        self.finished = true;
        lock(self.session).finish_part(self.part_number, outcome);
    }
}

impl Drop for PartTransfer<'_> {
    fn drop(&mut self) {
        if !self.finished {
            lock(self.session).finish_part(self.part_number, None);
        }
    }
}

/// Tracks a running completion. If dropped before it resolves (the request
/// was cancelled) the upload goes back to accepting parts.
struct Completion<'a> {
    session: &'a Mutex<UploadSession>,
    finished: bool,
}

impl<'a> Completion<'a> {
    const fn new(session: &'a Mutex<UploadSession>) -> Self {
        Self {
            session,
            finished: false,
        }
    }

    fn succeed(mut self) {
        self.finished = true;
        lock(self.session).mark_completed();
    }

    fn fail(mut self) {
        self.finished = true;
        lock(self.session).fail_complete();
    }
}

impl Drop for Completion<'_> {
    fn drop(&mut self) {
        if !self.finished {
            lock(self.session).fail_complete();
        }
    }
}
