//! Plan executor
//!
//! Applies an [`EnvironmentPlan`] layer by layer: images, then cloud resources,
//! then cluster applications. Within a layer nodes are applied in declared order,
//! except images, which have no references between them and are built concurrently.

use crate::action::{ActionType, ApplyResult};
use crate::error::Result;
use crate::provider::{
    CloudProvisioner, ClusterApplier, ImageBuilder, ImageRef, ResolvedNode, RuntimeAttributes,
    SecretsProvider,
};
use crate::runtime::RuntimeState;
use fleetstack_core::{EnvironmentPlan, Layer, NodeId, PlannedNode};
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, instrument, warn};

/// Plan executor
#[derive(Clone)]
pub struct Applier {
    secrets: Arc<dyn SecretsProvider>,
    images: Arc<dyn ImageBuilder>,
    cloud: Arc<dyn CloudProvisioner>,
    cluster: Arc<dyn ClusterApplier>,
}

impl Applier {
    pub fn new(
        secrets: Arc<dyn SecretsProvider>,
        images: Arc<dyn ImageBuilder>,
        cloud: Arc<dyn CloudProvisioner>,
        cluster: Arc<dyn ClusterApplier>,
    ) -> Self {
        Self {
            secrets,
            images,
            cloud,
            cluster,
        }
    }

    /// One backend implementing every collaborator trait
    pub fn with_backend<B>(backend: Arc<B>) -> Self
    where
        B: SecretsProvider + ImageBuilder + CloudProvisioner + ClusterApplier + 'static,
    {
        Self::new(backend.clone(), backend.clone(), backend.clone(), backend)
    }

    /// Replace the secrets provider
    pub fn secrets(mut self, secrets: Arc<dyn SecretsProvider>) -> Self {
        self.secrets = secrets;
        self
    }

    /// Bring the environment up
    ///
    /// Stops at the first failure; the returned result lists what was done so far.
    #[instrument(skip_all, fields(environment = %plan.environment))]
    pub async fn up(&self, plan: &EnvironmentPlan, state: &mut RuntimeState) -> ApplyResult {
        let started = Instant::now();
        let mut result = ApplyResult::new();

        if self.build_images(plan, state, &mut result).await {
            'layers: for layer in [Layer::Cloud, Layer::Cluster] {
                for node in plan.layer(layer).iter().flat_map(|g| g.nodes.iter()) {
                    if !self.apply_node(plan, layer, node, state, &mut result).await {
                        break 'layers;
                    }
                }
            }
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        info!(summary = %result.summary(), duration_ms = result.duration_ms, "Up finished");
        result
    }

    /// Tear the environment down
    ///
    /// Cluster applications first, then cloud resources, each in reverse declared
    /// order. Nodes marked `skip-delete` and images are left in place.
    #[instrument(skip_all, fields(environment = %plan.environment))]
    pub async fn down(&self, plan: &EnvironmentPlan, state: &mut RuntimeState) -> ApplyResult {
        let started = Instant::now();
        let mut result = ApplyResult::new();

        'layers: for layer in [Layer::Cluster, Layer::Cloud] {
            let nodes: Vec<&PlannedNode> = plan
                .layer(layer)
                .iter()
                .flat_map(|g| g.nodes.iter())
                .collect();
            for node in nodes.into_iter().rev() {
                if node.skip_delete {
                    info!(node = %node.id, "Skipping delete");
                    result.add_success(&node.id, layer, ActionType::Retain, "skip-delete");
                    continue;
                }

                let identity = state.identity(node);
                let outcome = match layer {
                    Layer::Cluster => self.cluster.delete(&plan.key, &identity).await,
                    _ => self.cloud.destroy(&identity).await,
                };
                match outcome {
                    Ok(()) => {
                        state.forget(&node.id);
                        result.add_success(
                            &node.id,
                            layer,
                            ActionType::Delete,
                            identity.physical_name,
                        );
                    }
                    Err(e) => {
                        warn!(node = %node.id, error = %e, "Delete failed");
                        result.add_failure(&node.id, layer, ActionType::Delete, e);
                        break 'layers;
                    }
                }
            }
        }

        result.duration_ms = started.elapsed().as_millis() as u64;
        info!(summary = %result.summary(), duration_ms = result.duration_ms, "Down finished");
        result
    }

    /// Build layer. Returns false on failure.
    async fn build_images(
        &self,
        plan: &EnvironmentPlan,
        state: &mut RuntimeState,
        result: &mut ApplyResult,
    ) -> bool {
        let mut to_build = Vec::new();
        for node in plan.layer(Layer::Build).iter().flat_map(|g| g.nodes.iter()) {
            let resolved = match state.materialize(node, self.secrets.as_ref()).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    result.add_failure(&node.id, Layer::Build, ActionType::Build, e);
                    return false;
                }
            };

            if resolved.get_bool("build") == Some(false) {
                match ImageRef::declared(&resolved) {
                    Ok(image) => {
                        record_image(state, &node.id, &image);
                        result.add_success(
                            &node.id,
                            Layer::Build,
                            ActionType::Retain,
                            image.to_string(),
                        );
                    }
                    Err(e) => {
                        result.add_failure(&node.id, Layer::Build, ActionType::Build, e);
                        return false;
                    }
                }
            } else {
                to_build.push(resolved);
            }
        }

        let builds = to_build
            .iter()
            .map(|image| async move { (image, self.images.build_and_push(image).await) });

        // Every build runs to completion; successes are recorded even when a sibling fails
        let mut failure = None;
        for (image, outcome) in join_all(builds).await {
            match outcome {
                Ok(reference) => {
                    info!(node = %image.id, image = %reference, "Image built");
                    record_image(state, &image.id, &reference);
                    result.add_success(
                        &image.id,
                        Layer::Build,
                        ActionType::Build,
                        reference.to_string(),
                    );
                }
                Err(e) => {
                    warn!(node = %image.id, error = %e, "Image build failed");
                    failure.get_or_insert((image.id.clone(), e));
                }
            }
        }

        match failure {
            Some((node, e)) => {
                result.add_failure(&node, Layer::Build, ActionType::Build, e);
                false
            }
            None => true,
        }
    }

    /// Cloud or cluster node. Returns false on failure.
    async fn apply_node(
        &self,
        plan: &EnvironmentPlan,
        layer: Layer,
        node: &PlannedNode,
        state: &mut RuntimeState,
        result: &mut ApplyResult,
    ) -> bool {
        let action = if layer == Layer::Cluster {
            ActionType::Apply
        } else {
            ActionType::Create
        };
        let resolved = match state.materialize(node, self.secrets.as_ref()).await {
            Ok(resolved) => resolved,
            Err(e) => {
                result.add_failure(&node.id, layer, action, e);
                return false;
            }
        };

        let outcome = match layer {
            Layer::Cluster => self
                .cluster
                .apply(&plan.key, &resolved)
                .await
                .map(|attrs| (ActionType::Apply, attrs)),
            _ => self.provision(&resolved).await,
        };

        match outcome {
            Ok((done, attributes)) => {
                info!(node = %node.id, action = %done, "Node applied");
                state.record(&node.id, attributes);
                result.add_success(&node.id, layer, done, resolved.physical_name);
                true
            }
            Err(e) => {
                warn!(node = %node.id, error = %e, "Apply failed");
                result.add_failure(&node.id, layer, action, e);
                false
            }
        }
    }

    /// describe, then create only when missing
    async fn provision(&self, resource: &ResolvedNode) -> Result<(ActionType, RuntimeAttributes)> {
        if let Some(existing) = self.cloud.describe(resource).await? {
            return Ok((ActionType::Exists, existing));
        }
        let created = self.cloud.create(resource).await?;
        Ok((ActionType::Create, created))
    }
}

fn record_image(state: &mut RuntimeState, node: &NodeId, image: &ImageRef) {
    state.record(
        node,
        BTreeMap::from([(
            "image".to_string(),
            serde_json::Value::String(image.to_string()),
        )]),
    );
}
