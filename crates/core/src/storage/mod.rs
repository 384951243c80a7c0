//! Multi-provider storage gateway.
//!
//! Uniform list, upload, download, delete and signed-URL operations over
//! Google Cloud Storage, Amazon S3 and Azure Blob Storage, plus chunked
//! uploads that hide each provider's part protocol behind one lifecycle:
//!
//! ```text
//! initiate_upload ─► upload_part (any order, concurrent) ─► complete_upload
//!                                 └──────────────► abort_upload / idle sweep
//! ```
//!
//! Object operations go through Apache OpenDAL. S3 part tags come from the
//! AWS SDK and Azure blocks are staged over SAS URLs; each connection can
//! also run fully in process for development and tests.

pub mod adapter;
pub mod config;
mod emulator;
pub mod error;
pub mod gateway;
pub mod multipart;
mod objects;
pub mod provider;
mod transport;
pub mod types;

pub use adapter::ProviderAdapter;
pub use config::GatewayConfig;
pub use error::{Operation, StorageError};
pub use gateway::{SIGNED_URL_TTL_HOURS, StorageGateway};
pub use multipart::MAX_PART_NUMBER;
pub use provider::Provider;
pub use types::{
    CompletedPart, DEFAULT_CONTENT_TYPE, DownloadedObject, SignedUrl, StorageObjectDescriptor,
    UploadState, UploadStatus, UploadedObject, content_type_for_key,
};
