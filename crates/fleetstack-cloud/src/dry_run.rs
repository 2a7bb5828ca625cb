//! Dry-run backend
//!
//! Implements every collaborator trait without touching a registry, cloud or
//! cluster. Runtime attributes come back as placeholders so that accessors in later
//! layers still resolve.

use crate::error::Result;
use crate::provider::{
    CloudProvisioner, ClusterApplier, FileSecretsProvider, ImageBuilder, ImageRef, ResolvedNode,
    RuntimeAttributes, SecretsProvider,
};
use async_trait::async_trait;
use fleetstack_core::{NodeKind, SecretSource};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Default)]
pub struct DryRunBackend {
    /// When set, secret files are read to check that they exist; values stay masked
    secrets: Option<FileSecretsProvider>,
    log: Mutex<Vec<String>>,
}

impl DryRunBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check secret files under `root`
    pub fn with_secrets_root(mut self, root: impl AsRef<Path>) -> Self {
        self.secrets = Some(FileSecretsProvider::new(root));
        self
    }

    /// Actions performed so far, in order
    pub async fn actions(&self) -> Vec<String> {
        self.log.lock().await.clone()
    }

    async fn note(&self, line: String) {
        info!(action = %line, "[dry-run]");
        self.log.lock().await.push(line);
    }
}

fn placeholders(node: &ResolvedNode) -> RuntimeAttributes {
    node.kind
        .runtime_attributes()
        .iter()
        .map(|attr| {
            (
                attr.to_string(),
                serde_json::Value::String(format!("<{}.{}>", node.physical_name, attr)),
            )
        })
        .collect()
}

#[async_trait]
impl SecretsProvider for DryRunBackend {
    async fn load(&self, path: &Path) -> Result<BTreeMap<String, serde_json::Value>> {
        match &self.secrets {
            Some(files) => files.load(path).await,
            None => Ok(BTreeMap::new()),
        }
    }

    async fn resolve(&self, source: &SecretSource) -> Result<serde_json::Value> {
        if let Some(files) = &self.secrets {
            files.resolve(source).await?;
        }
        Ok(serde_json::Value::String(format!("<secret:{}>", source)))
    }
}

#[async_trait]
impl ImageBuilder for DryRunBackend {
    async fn build_and_push(&self, image: &ResolvedNode) -> Result<ImageRef> {
        let reference = ImageRef::declared(image)?;
        let push = image.get_bool("push").unwrap_or(false);
        self.note(format!(
            "build {}{}",
            reference,
            if push { " (push)" } else { "" }
        ))
        .await;
        Ok(reference)
    }
}

#[async_trait]
impl CloudProvisioner for DryRunBackend {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn create(&self, resource: &ResolvedNode) -> Result<RuntimeAttributes> {
        self.note(format!("create {} {}", resource.kind, resource.physical_name))
            .await;
        Ok(placeholders(resource))
    }

    async fn describe(&self, _resource: &ResolvedNode) -> Result<Option<RuntimeAttributes>> {
        Ok(None)
    }

    async fn destroy(&self, resource: &ResolvedNode) -> Result<()> {
        self.note(format!("destroy {} {}", resource.kind, resource.physical_name))
            .await;
        Ok(())
    }
}

#[async_trait]
impl ClusterApplier for DryRunBackend {
    async fn apply(&self, namespace: &str, app: &ResolvedNode) -> Result<RuntimeAttributes> {
        let flags: Vec<&str> = app
            .one_shot
            .iter()
            .filter(|(_, on)| **on)
            .map(|(flag, _)| flag.as_str())
            .collect();
        let suffix = if flags.is_empty() {
            String::new()
        } else {
            format!(" (once: {})", flags.join(", "))
        };
        self.note(format!("apply {}/{}{}", namespace, app.physical_name, suffix))
            .await;

        let mut attributes = placeholders(app);
        if app.kind == NodeKind::ClusterApplication {
            attributes.insert(
                "host".to_string(),
                serde_json::Value::String(format!("{}.{}.svc", app.physical_name, namespace)),
            );
            if let Some(port) = app.attributes.get("port") {
                attributes.insert("port".to_string(), port.clone());
            }
        }
        Ok(attributes)
    }

    async fn delete(&self, namespace: &str, app: &ResolvedNode) -> Result<()> {
        self.note(format!("delete {}/{}", namespace, app.physical_name))
            .await;
        Ok(())
    }
}
