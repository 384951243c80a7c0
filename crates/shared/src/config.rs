//! Application configuration management.

use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage gateway configuration.
    #[serde(default)]
    pub storage: StorageSettings,
    /// Redaction session configuration.
    #[serde(default)]
    pub redaction: RedactionSettings,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Largest request body accepted (uploads, parts).
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    64 * 1024 * 1024
}

/// Connection settings for Google Cloud Storage (provider A).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GcpConnection {
    /// Live GCS account.
    Gcs {
        /// Base64-encoded service account JSON.
        #[serde(default)]
        credential: Option<String>,
        /// Path to a service account JSON file.
        #[serde(default)]
        credential_path: Option<String>,
        /// Endpoint override (emulators, private endpoints).
        #[serde(default)]
        endpoint: Option<String>,
    },
    /// In-process emulation (development and tests only).
    Memory,
}

/// Connection settings for Amazon S3 (provider B).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AwsConnection {
    /// Live S3 (or S3-compatible) account.
    S3 {
        /// AWS region.
        region: String,
        /// AWS access key ID.
        access_key_id: String,
        /// AWS secret access key.
        secret_access_key: String,
        /// Endpoint override for S3-compatible services.
        #[serde(default)]
        endpoint: Option<String>,
    },
    /// In-process emulation (development and tests only).
    Memory,
}

/// Connection settings for Azure Blob Storage (provider C).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AzureConnection {
    /// Live storage account authenticated by account key.
    AzureBlob {
        /// Storage account name.
        account: String,
        /// Storage account access key.
        access_key: String,
        /// Endpoint override (defaults to `https://{account}.blob.core.windows.net`).
        #[serde(default)]
        endpoint: Option<String>,
    },
    /// In-process emulation (development and tests only).
    Memory,
}

/// Storage gateway settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    /// Provider A connection, absent when not configured.
    #[serde(default)]
    pub gcp: Option<GcpConnection>,
    /// Provider B connection, absent when not configured.
    #[serde(default)]
    pub aws: Option<AwsConnection>,
    /// Provider C connection, absent when not configured.
    #[serde(default)]
    pub azure: Option<AzureConnection>,
    /// Multipart uploads idle longer than this are aborted by the sweep.
    #[serde(default = "default_upload_idle_timeout")]
    pub upload_idle_timeout_secs: u64,
    /// Interval between idle-upload sweeps.
    #[serde(default = "default_storage_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Maximum entries returned by a listing.
    #[serde(default = "default_list_limit")]
    pub list_limit: usize,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            gcp: None,
            aws: None,
            azure: None,
            upload_idle_timeout_secs: default_upload_idle_timeout(),
            sweep_interval_secs: default_storage_sweep_interval(),
            list_limit: default_list_limit(),
        }
    }
}

fn default_upload_idle_timeout() -> u64 {
    86_400 // 24 hours
}

fn default_storage_sweep_interval() -> u64 {
    300
}

fn default_list_limit() -> usize {
    1000
}

/// Redaction session settings.
#[derive(Debug, Clone, Deserialize)]
pub struct RedactionSettings {
    /// Idle time after which a session expires.
    #[serde(default = "default_session_ttl")]
    pub session_ttl_secs: u64,
    /// Interval between expired-session sweeps.
    #[serde(default = "default_redaction_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Fill color used when neither the rectangle nor the call names one.
    #[serde(default = "default_color")]
    pub default_color: String,
}

impl Default for RedactionSettings {
    fn default() -> Self {
        Self {
            session_ttl_secs: default_session_ttl(),
            sweep_interval_secs: default_redaction_sweep_interval(),
            default_color: default_color(),
        }
    }
}

fn default_session_ttl() -> u64 {
    3600 // 1 hour
}

fn default_redaction_sweep_interval() -> u64 {
    60
}

fn default_color() -> String {
    "#000000".to_string()
}

impl AppConfig {
    /// Loads configuration from environment and config files.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration cannot be loaded.
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(
                config::Environment::with_prefix("DOCGATE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_without_sources() {
        temp_env::with_vars_unset(["DOCGATE__SERVER__PORT", "RUN_MODE"], || {
            let config = AppConfig::load().expect("empty config should load");
            assert_eq!(config.server.port, 8080);
            assert_eq!(config.server.host, "0.0.0.0");
            assert!(config.storage.gcp.is_none());
            assert_eq!(config.storage.list_limit, 1000);
            assert_eq!(config.redaction.session_ttl_secs, 3600);
            assert_eq!(config.redaction.default_color, "#000000");
        });
    }

    #[test]
    fn test_environment_overrides() {
        temp_env::with_vars(
            [
                ("DOCGATE__SERVER__PORT", Some("9090")),
                ("DOCGATE__STORAGE__AWS__TYPE", Some("memory")),
                ("DOCGATE__REDACTION__SESSION_TTL_SECS", Some("120")),
            ],
            || {
                let config = AppConfig::load().expect("config should load");
                assert_eq!(config.server.port, 9090);
                assert_eq!(config.storage.aws, Some(AwsConnection::Memory));
                assert_eq!(config.redaction.session_ttl_secs, 120);
            },
        );
    }

    #[test]
    fn test_connection_tags_deserialize() {
        let aws: AwsConnection = serde_json::from_str(
            r#"{"type":"s3","region":"eu-west-1","access_key_id":"ak","secret_access_key":"sk"}"#,
        )
        .expect("valid s3 connection");
        assert!(matches!(aws, AwsConnection::S3 { ref region, endpoint: None, .. } if region == "eu-west-1"));

        let azure: AzureConnection =
            serde_json::from_str(r#"{"type":"azure_blob","account":"acct","access_key":"key"}"#)
                .expect("valid azure connection");
        assert!(matches!(azure, AzureConnection::AzureBlob { .. }));

        let gcp: GcpConnection = serde_json::from_str(r#"{"type":"gcs"}"#).expect("valid gcs");
        assert_eq!(
            gcp,
            GcpConnection::Gcs {
                credential: None,
                credential_path: None,
                endpoint: None
            }
        );
    }
}
