//! Executor error types

use fleetstack_core::{Accessor, NodeId};
use std::path::PathBuf;
use thiserror::Error;

/// Apply-time errors
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Unresolved accessor {0}: the source node has not been applied yet")]
    UnresolvedAccessor(Accessor),

    #[error("Secret file error: {path}: {message}")]
    SecretFile { path: PathBuf, message: String },

    #[error("Secret key '{key}' not found in {path}")]
    SecretKeyNotFound { path: PathBuf, key: String },

    #[error("Image build failed for {node}: {message}")]
    BuildFailed { node: NodeId, message: String },

    #[error("Provisioning failed for {node}: {message}")]
    ProvisionFailed { node: NodeId, message: String },

    #[error("Cluster apply failed for {node}: {message}")]
    ApplyFailed { node: NodeId, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
