//! Collaborator traits
//!
//! The executor never talks to a cloud, registry or cluster directly; it calls
//! these traits in the order the composed plan dictates.

use crate::error::{CloudError, Result};
use async_trait::async_trait;
use fleetstack_core::{NodeId, NodeKind, SecretSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Attributes known only after a node has been applied (host, port, volume-id, ...)
pub type RuntimeAttributes = BTreeMap<String, serde_json::Value>;

/// A planned node whose attributes have all been turned into concrete values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub physical_name: String,
    pub attributes: BTreeMap<String, serde_json::Value>,
    /// One-shot flags, passed through untouched
    pub one_shot: BTreeMap<String, bool>,
}

impl ResolvedNode {
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.attributes.get(key).and_then(|v| v.as_bool())
    }
}

/// Resolved image reference (name + tag)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageRef {
    pub name: String,
    pub tag: String,
}

impl ImageRef {
    pub fn new(name: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
        }
    }

    /// Reference declared on the image node itself (`name` + `tag`)
    pub fn declared(node: &ResolvedNode) -> Result<Self> {
        let name = node.get_str("name").ok_or_else(|| {
            CloudError::InvalidConfig(format!("image {} has no 'name' attribute", node.id))
        })?;
        let tag = node.get_str("tag").unwrap_or("latest");
        Ok(Self::new(name, tag))
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.tag)
    }
}

/// Secrets provider
///
/// Given a file path, returns the credential mapping stored there. The format is
/// the provider's concern.
#[async_trait]
pub trait SecretsProvider: Send + Sync {
    async fn load(&self, path: &Path) -> Result<BTreeMap<String, serde_json::Value>>;

    /// Resolve a single `path#key` source
    ///
    /// Without a key the whole mapping is returned as an object.
    async fn resolve(&self, source: &SecretSource) -> Result<serde_json::Value> {
        let mut values = self.load(&source.file).await?;
        match &source.key {
            Some(key) => values
                .remove(key)
                .ok_or_else(|| CloudError::SecretKeyNotFound {
                    path: source.file.clone(),
                    key: key.clone(),
                }),
            None => Ok(serde_json::Value::Object(values.into_iter().collect())),
        }
    }
}

/// Image builder / pusher
#[async_trait]
pub trait ImageBuilder: Send + Sync {
    async fn build_and_push(&self, image: &ResolvedNode) -> Result<ImageRef>;
}

/// Cloud provisioner for volumes, managed databases and caches
#[async_trait]
pub trait CloudProvisioner: Send + Sync {
    /// Returns the provisioner name (e.g. "aws")
    fn name(&self) -> &str;

    /// Create the resource and return its runtime attributes
    async fn create(&self, resource: &ResolvedNode) -> Result<RuntimeAttributes>;

    /// Runtime attributes of an existing resource, `None` when it does not exist
    async fn describe(&self, resource: &ResolvedNode) -> Result<Option<RuntimeAttributes>>;

    async fn destroy(&self, resource: &ResolvedNode) -> Result<()>;
}

/// Cluster applier for application manifests
#[async_trait]
pub trait ClusterApplier: Send + Sync {
    /// Apply the application into `namespace` and return its runtime attributes
    async fn apply(&self, namespace: &str, app: &ResolvedNode) -> Result<RuntimeAttributes>;

    async fn delete(&self, namespace: &str, app: &ResolvedNode) -> Result<()>;
}

/// Secrets provider reading YAML mappings from files under a root directory
pub struct FileSecretsProvider {
    root: std::path::PathBuf,
}

impl FileSecretsProvider {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl SecretsProvider for FileSecretsProvider {
    async fn load(&self, path: &Path) -> Result<BTreeMap<String, serde_json::Value>> {
        let full = self.root.join(path);
        let content =
            tokio::fs::read_to_string(&full)
                .await
                .map_err(|e| CloudError::SecretFile {
                    path: full.clone(),
                    message: e.to_string(),
                })?;
        let values: BTreeMap<String, serde_json::Value> =
            serde_yaml::from_str(&content).map_err(|e| CloudError::SecretFile {
                path: full.clone(),
                message: e.to_string(),
            })?;
        tracing::debug!(file = %full.display(), keys = values.len(), "Loaded secrets");
        Ok(values)
    }
}
