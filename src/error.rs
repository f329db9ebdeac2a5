//! Error types for simplemirror
//!
//! All modules use `MirrorResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for mirror operations
pub type MirrorResult<T> = Result<T, MirrorError>;

/// All errors that can occur in simplemirror
#[derive(Error, Debug)]
pub enum MirrorError {
    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Upstream errors
    #[error("Upstream not reachable: {url}: {reason}")]
    UpstreamUnreachable { url: String, reason: String },

    #[error("Upstream error: {status} status on GET {url}")]
    UpstreamStatus { status: u16, url: String },

    #[error("Upstream error: {project}: upstream returned serial {observed}, expected at least {known}")]
    SerialRegression {
        project: String,
        observed: i64,
        known: i64,
    },

    #[error("Upstream error: response from {url} lacks the {header} header")]
    MissingSerialHeader { url: String, header: &'static str },

    #[error("Upstream error: timed out waiting for replication serial {serial} ({project})")]
    ReplicaWaitTimeout { project: String, serial: u64 },

    #[error("Upstream error: {0}")]
    Upstream(String),

    // Startup errors
    #[error("Mirror initialization failed: {0}")]
    MirrorInitFailed(String),

    // Store errors
    #[error("Transaction store error: {0}")]
    Store(String),

    #[error("Operation not permitted on a replica: {0}")]
    ReplicaReadOnly(String),

    // URL errors
    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("{0}")]
    User(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MirrorError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create an invalid URL error
    pub fn invalid_url(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::InvalidUrl {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    /// Check if the error reports a failed or inconsistent upstream
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            Self::UpstreamUnreachable { .. }
                | Self::UpstreamStatus { .. }
                | Self::SerialRegression { .. }
                | Self::MissingSerialHeader { .. }
                | Self::ReplicaWaitTimeout { .. }
                | Self::Upstream(_)
        )
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::MirrorInitFailed(_) => {
                Some("Check that mirror.simple_url (or mirror.master_url) is reachable")
            }
            Self::UpstreamUnreachable { .. } => Some("Check network access to the upstream index"),
            Self::ReplicaReadOnly(_) => Some("Run this operation against the master node"),
            Self::ReplicaWaitTimeout { .. } => {
                Some("Check replication from the master or raise mirror.replica_wait_timeout_secs")
            }
            _ => None,
        }
    }
}
