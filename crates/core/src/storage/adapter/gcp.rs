//! Provider A: Google Cloud Storage.
//!
//! GCS has no part protocol the gateway can drive, so parts are buffered in
//! process and written as one object on completion.

use bytes::Bytes;
use docgate_shared::GcpConnection;

use crate::storage::error::StorageError;
use crate::storage::multipart::{PartBuffer, digest_hex};
use crate::storage::objects::{Backend, ObjectClient};
use crate::storage::provider::Provider;
use crate::storage::types::CompletedPart;

/// GCS adapter.
pub struct GcpAdapter {
    objects: ObjectClient,
}

impl GcpAdapter {
    pub(crate) fn connect(connection: &GcpConnection, list_limit: usize) -> Self {
        Self {
            objects: ObjectClient::new(Provider::Gcp, Backend::from(connection), list_limit),
        }
    }

    pub(crate) const fn objects(&self) -> &ObjectClient {
        &self.objects
    }

    /// Buffer a part; the token is its number plus a content digest.
    pub(crate) fn upload_part(buffer: &PartBuffer, part_number: u32, body: Bytes) -> String {
        let token = format!("{part_number:05}-{}", &digest_hex(&body)[..16]);
        buffer.insert(part_number, body);
        token
    }

    /// Concatenate buffered parts in the listed order and write once.
    pub(crate) async fn complete_upload(
        &self,
        buffer: &PartBuffer,
        bucket: &str,
        key: &str,
        content_type: &str,
        parts: &[CompletedPart],
    ) -> Result<(), StorageError> {
        let body = buffer.assemble(parts)?;
        self.objects.write(bucket, key, body, content_type).await?;
        buffer.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_depends_on_number_and_content() {
        let buffer = PartBuffer::default();
        let a = GcpAdapter::upload_part(&buffer, 1, Bytes::from_static(b"abc"));
        let b = GcpAdapter::upload_part(&buffer, 2, Bytes::from_static(b"abc"));
        let c = GcpAdapter::upload_part(&buffer, 1, Bytes::from_static(b"xyz"));
        assert!(a.starts_with("00001-"));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_complete_writes_concatenation() {
        let adapter = GcpAdapter::connect(&GcpConnection::Memory, 1000);
        let buffer = PartBuffer::default();
        let t1 = GcpAdapter::upload_part(&buffer, 1, Bytes::from_static(b"head-"));
        let t2 = GcpAdapter::upload_part(&buffer, 2, Bytes::from_static(b"tail"));

        adapter
            .complete_upload(
                &buffer,
                "bucket",
                "joined.txt",
                "text/plain",
                &[CompletedPart::new(1, t1), CompletedPart::new(2, t2)],
            )
            .await
            .expect("complete");

        let read = adapter.objects().read("bucket", "joined.txt").await.unwrap();
        assert_eq!(read.bytes.as_ref(), b"head-tail");
    }
}
