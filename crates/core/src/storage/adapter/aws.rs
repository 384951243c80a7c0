//! Provider B: Amazon S3.

use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use bytes::Bytes;
use docgate_shared::AwsConnection;

use crate::storage::emulator::MemoryMultipart;
use crate::storage::error::{Operation, ProviderFault, StorageError};
use crate::storage::multipart::UploadHandle;
use crate::storage::objects::{Backend, ObjectClient};
use crate::storage::provider::Provider;
use crate::storage::transport::MultipartApi;
use crate::storage::types::CompletedPart;

/// S3 adapter: native multipart, entity tags as part tokens.
pub struct AwsAdapter {
    objects: ObjectClient,
    multipart: Arc<dyn MultipartApi>,
}

impl AwsAdapter {
    pub(crate) fn connect(connection: &AwsConnection, list_limit: usize) -> Self {
        let objects = ObjectClient::new(Provider::Aws, Backend::from(connection), list_limit);
        let multipart: Arc<dyn MultipartApi> = match connection {
            AwsConnection::S3 {
                region,
                access_key_id,
                secret_access_key,
                endpoint,
            } => Arc::new(SdkMultipart::new(
                region,
                access_key_id,
                secret_access_key,
                endpoint.as_deref(),
            )),
            AwsConnection::Memory => Arc::new(MemoryMultipart::new(objects.clone())),
        };
        Self { objects, multipart }
    }

    pub(crate) const fn objects(&self) -> &ObjectClient {
        &self.objects
    }

    pub(crate) async fn begin_upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<UploadHandle, StorageError> {
        let provider_upload_id = self
            .multipart
            .create(bucket, key, content_type)
            .await
            .map_err(|f| f.into_error(Provider::Aws, Operation::InitiateUpload, bucket, key))?;
        Ok(UploadHandle::Multipart { provider_upload_id })
    }

    pub(crate) async fn upload_part(
        &self,
        provider_upload_id: &str,
        bucket: &str,
        key: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, StorageError> {
        self.multipart
            .upload_part(bucket, key, provider_upload_id, part_number, body)
            .await
            .map_err(|f| f.into_error(Provider::Aws, Operation::UploadPart, bucket, key))
    }

    pub(crate) async fn complete_upload(
        &self,
        provider_upload_id: &str,
        bucket: &str,
        key: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError> {
        self.multipart
            .complete(bucket, key, provider_upload_id, parts)
            .await
            .map_err(|f| f.into_error(Provider::Aws, Operation::CompleteUpload, bucket, key))
    }

    pub(crate) async fn abort_upload(
        &self,
        provider_upload_id: &str,
        bucket: &str,
        key: &str,
    ) -> Result<(), StorageError> {
        self.multipart
            .abort(bucket, key, provider_upload_id)
            .await
            .map_err(|f| f.into_error(Provider::Aws, Operation::AbortUpload, bucket, key))
    }
}

/// Multipart over the AWS SDK.
struct SdkMultipart {
    client: Client,
}

impl SdkMultipart {
    fn new(
        region: &str,
        access_key_id: &str,
        secret_access_key: &str,
        endpoint: Option<&str>,
    ) -> Self {
        let credentials = Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "docgate-config",
        );
        let mut config = aws_sdk_s3::config::Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .credentials_provider(credentials);
        if let Some(endpoint) = endpoint {
            config = config.endpoint_url(endpoint).force_path_style(true);
        }
        Self {
            client: Client::from_conf(config.build()),
        }
    }
}

fn sdk_fault<E, R>(err: SdkError<E, R>) -> ProviderFault
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let code = err
        .as_service_error()
        .and_then(ProvideErrorMetadata::code)
        .map(str::to_string);
    let message = DisplayErrorContext(&err).to_string();
    match code.as_deref() {
        Some("InvalidPart" | "InvalidPartOrder" | "EntityTooSmall") => {
            ProviderFault::InvalidParts(format!(
                "{}: {message}",
                code.as_deref().unwrap_or_default()
            ))
        }
        Some("NoSuchKey" | "NotFound") => ProviderFault::NotFound(message),
        _ => ProviderFault::Other(message),
    }
}

fn s3_part_number(part_number: u32) -> Result<i32, ProviderFault> {
    i32::try_from(part_number)
        .map_err(|_| ProviderFault::InvalidParts(format!("part number {part_number} overflows")))
}

#[async_trait]
impl MultipartApi for SdkMultipart {
    async fn create(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
    ) -> Result<String, ProviderFault> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(sdk_fault)?;
        output
            .upload_id
            .ok_or_else(|| ProviderFault::Other("response carried no upload id".into()))
    }

    async fn upload_part(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        part_number: u32,
        body: Bytes,
    ) -> Result<String, ProviderFault> {
        let output = self
            .client
            .upload_part()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(s3_part_number(part_number)?)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(sdk_fault)?;
        output
            .e_tag
            .ok_or_else(|| ProviderFault::Other("response carried no ETag".into()))
    }

    async fn complete(
        &self,
        bucket: &str,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
    ) -> Result<(), ProviderFault> {
        let mut completed = Vec::with_capacity(parts.len());
        for part in parts {
            completed.push(
                S3CompletedPart::builder()
                    .part_number(s3_part_number(part.part_number)?)
                    .e_tag(&part.part_token)
                    .build(),
            );
        }
        let upload = CompletedMultipartUpload::builder()
            .set_parts(Some(completed))
            .build();

        self.client
            .complete_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(upload)
            .send()
            .await
            .map_err(sdk_fault)?;
        Ok(())
    }

    async fn abort(&self, bucket: &str, key: &str, upload_id: &str) -> Result<(), ProviderFault> {
        self.client
            .abort_multipart_upload()
            .bucket(bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(sdk_fault)?;
        Ok(())
    }
}
