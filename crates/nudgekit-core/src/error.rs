//! Core error types for nudgekit-core.
//!
//! The engine itself is designed to degrade rather than fail: a missing
//! store makes the frequency gate fail open, an unreachable sink drops
//! events. These types cover the places where an error is still worth
//! returning to the caller -- storage setup, config parsing, the form
//! relay.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for nudgekit-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Key-value store errors
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Analytics sink errors
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// Form-relay webhook errors
    #[error("Webhook error: {0}")]
    Webhook(#[from] WebhookError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Key-value store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Read or write failed
    #[error("Store query failed: {0}")]
    QueryFailed(String),

    /// Schema setup failed
    #[error("Store migration failed: {0}")]
    MigrationFailed(String),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),
}

/// Analytics sink errors. These are logged and dropped by the pipeline;
/// they only reach callers that talk to a sink directly (the CLI).
#[derive(Error, Debug)]
pub enum SinkError {
    /// Insert failed at the storage layer
    #[error("Insert failed: {0}")]
    InsertFailed(String),

    /// Sink endpoint rejected or never received the event
    #[error("Sink unreachable: {0}")]
    Unreachable(String),

    /// Background dispatcher is gone (session torn down)
    #[error("Sink dispatcher closed")]
    Closed,
}

/// Form-relay webhook errors. Unlike telemetry, these are surfaced to the
/// caller so the UI can render inline feedback.
#[derive(Error, Debug)]
pub enum WebhookError {
    /// Relay is not configured or disabled
    #[error("Webhook not configured")]
    NotConfigured,

    /// Endpoint URL failed validation
    #[error("Invalid webhook URL '{url}': {message}")]
    InvalidUrl { url: String, message: String },

    /// Request could not be sent
    #[error("Webhook request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status after all retries
    #[error("Webhook rejected with HTTP {status} after {attempts} attempts")]
    Rejected { status: u16, attempts: u32 },

    /// Payload could not be serialized
    #[error("Webhook payload error: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::QueryFailed(err.to_string())
    }
}

impl From<rusqlite::Error> for SinkError {
    fn from(err: rusqlite::Error) -> Self {
        SinkError::InsertFailed(err.to_string())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
