//! Gateway configuration.

use std::time::Duration;

use docgate_shared::{AwsConnection, AzureConnection, GcpConnection, StorageSettings};

/// Storage gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayConfig {
    /// Provider A connection.
    pub gcp: Option<GcpConnection>,
    /// Provider B connection.
    pub aws: Option<AwsConnection>,
    /// Provider C connection.
    pub azure: Option<AzureConnection>,
    /// Chunked uploads idle longer than this are aborted by the sweep.
    pub upload_idle_timeout: Duration,
    /// Maximum entries returned by one listing.
    pub list_limit: usize,
}

impl GatewayConfig {
    /// Default idle timeout for chunked uploads: 24 hours.
    pub const DEFAULT_UPLOAD_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);
    /// Listing cap.
    pub const MAX_LIST_LIMIT: usize = 1000;

    /// Create a config with no providers configured.
    #[must_use]
    pub fn new() -> Self {
        Self {
            gcp: None,
            aws: None,
            azure: None,
            upload_idle_timeout: Self::DEFAULT_UPLOAD_IDLE_TIMEOUT,
            list_limit: Self::MAX_LIST_LIMIT,
        }
    }

    /// All three providers backed by in-process emulation.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new()
            .with_gcp(GcpConnection::Memory)
            .with_aws(AwsConnection::Memory)
            .with_azure(AzureConnection::Memory)
    }

    /// Set the provider A connection.
    #[must_use]
    pub fn with_gcp(mut self, connection: GcpConnection) -> Self {
        self.gcp = Some(connection);
        self
    }

    /// Set the provider B connection.
    #[must_use]
    pub fn with_aws(mut self, connection: AwsConnection) -> Self {
        self.aws = Some(connection);
        self
    }

    /// Set the provider C connection.
    #[must_use]
    pub fn with_azure(mut self, connection: AzureConnection) -> Self {
        self.azure = Some(connection);
        self
    }

    /// Set the idle timeout for chunked uploads.
    #[must_use]
    pub fn with_upload_idle_timeout(mut self, timeout: Duration) -> Self {
        self.upload_idle_timeout = timeout;
        self
    }

    /// Set the listing cap, clamped to `1..=MAX_LIST_LIMIT`.
    #[must_use]
    pub fn with_list_limit(mut self, limit: usize) -> Self {
        self.list_limit = limit.clamp(1, Self::MAX_LIST_LIMIT);
        self
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&StorageSettings> for GatewayConfig {
    fn from(settings: &StorageSettings) -> Self {
        Self {
            gcp: settings.gcp.clone(),
            aws: settings.aws.clone(),
            azure: settings.azure.clone(),
            upload_idle_timeout: Duration::from_secs(settings.upload_idle_timeout_secs),
            list_limit: 1,
        }
        .with_list_limit(settings.list_limit)
    }
}
