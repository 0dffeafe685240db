//! Remote cluster error types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while resolving, grouping or reconfiguring remote clusters
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteError {
    #[error("no such remote cluster: [{0}]")]
    NoSuchRemoteCluster(String),

    #[error("invalid remote cluster alias [{0}]: remote clusters must not have the empty string as its key")]
    InvalidAlias(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RemoteError {
    /// Get the error type as a string for metrics labeling
    pub fn error_type(&self) -> &'static str {
        match self {
            RemoteError::NoSuchRemoteCluster(_) => "no_such_remote_cluster",
            RemoteError::InvalidAlias(_) => "invalid_alias",
            RemoteError::Settings(_) => "settings",
            RemoteError::Connection(_) => "connection",
            RemoteError::Config(_) => "config",
        }
    }
}

impl From<std::io::Error> for RemoteError {
    fn from(err: std::io::Error) -> Self {
        RemoteError::Config(err.to_string())
    }
}

impl From<toml::de::Error> for RemoteError {
    fn from(err: toml::de::Error) -> Self {
        RemoteError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
