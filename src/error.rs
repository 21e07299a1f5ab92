//! Error types for cloudflare-sync-dns.

use thiserror::Error;

/// Result type alias for cloudflare-sync-dns.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Sync error types.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Malformed or incomplete settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IP lookup or reachability probe failed.
    #[error("Network error: {0}")]
    Network(String),

    /// Provider call failed or returned a failure envelope.
    #[error("API error: {0}")]
    Api(String),

    /// State store missing, unreadable or unparsable.
    #[error("Corrupt state store: {0}")]
    CorruptState(String),

    /// Local network did not come back after the reset.
    #[error("Verification failed: {0}")]
    Verification(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<reqwest::Error> for SyncError {
    fn from(e: reqwest::Error) -> Self {
        SyncError::Network(e.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(e: toml::de::Error) -> Self {
        SyncError::Config(e.to_string())
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Serialization(e.to_string())
    }
}
