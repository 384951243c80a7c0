//! Shared configuration and error types for Docgate.
//!
//! This crate provides common types used across all other crates:
//! - Layered application configuration (files + environment)
//! - Provider connection settings for the storage gateway
//! - Application-wide error envelope

pub mod config;
pub mod error;

pub use config::{
    AppConfig, AwsConnection, AzureConnection, GcpConnection, RedactionSettings, ServerConfig,
    StorageSettings,
};
pub use error::{AppError, AppResult};
