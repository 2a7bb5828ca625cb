//! Runtime state of a single apply run
//!
//! Symbolic accessors in a plan become concrete values here, once the node they
//! point at has been applied. Nothing is persisted between runs.

use crate::error::{CloudError, Result};
use crate::provider::{ResolvedNode, RuntimeAttributes, SecretsProvider};
use fleetstack_core::{Accessor, NodeId, PlannedNode, ResolvedValue};
use std::collections::BTreeMap;
use tracing::debug;

/// Runtime attributes materialised so far, per qualified node id
#[derive(Debug, Clone, Default)]
pub struct RuntimeState {
    values: BTreeMap<NodeId, RuntimeAttributes>,
}

impl RuntimeState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the runtime attributes of an applied node
    pub fn record(&mut self, node: &NodeId, attributes: RuntimeAttributes) {
        debug!(node = %node, attributes = attributes.len(), "Recorded runtime attributes");
        self.values.entry(node.clone()).or_default().extend(attributes);
    }

    pub fn forget(&mut self, node: &NodeId) {
        self.values.remove(node);
    }

    pub fn is_applied(&self, node: &NodeId) -> bool {
        self.values.contains_key(node)
    }

    pub fn attributes(&self, node: &NodeId) -> Option<&RuntimeAttributes> {
        self.values.get(node)
    }

    /// Concrete value behind an accessor
    pub fn get(&self, accessor: &Accessor) -> Result<&serde_json::Value> {
        self.values
            .get(&accessor.node)
            .and_then(|attrs| attrs.get(&accessor.attribute))
            .ok_or_else(|| CloudError::UnresolvedAccessor(accessor.clone()))
    }

    /// Turn every attribute of a planned node into a concrete value
    pub async fn materialize(
        &self,
        node: &PlannedNode,
        secrets: &dyn SecretsProvider,
    ) -> Result<ResolvedNode> {
        let mut attributes = BTreeMap::new();
        for (key, value) in &node.attributes {
            let concrete = match value {
                ResolvedValue::Literal(v) => v.clone(),
                ResolvedValue::Accessor(a) => self.get(a)?.clone(),
                ResolvedValue::Secret(s) => secrets.resolve(s).await?,
            };
            attributes.insert(key.clone(), concrete);
        }
        Ok(ResolvedNode {
            id: node.id.clone(),
            kind: node.kind,
            physical_name: node.physical_name.clone(),
            attributes,
            one_shot: node.one_shot.clone(),
        })
    }

    /// Identity of a node for teardown
    ///
    /// Only literal attributes and runtime values already recorded for the node are
    /// carried; accessors into other nodes and secrets are dropped.
    pub fn identity(&self, node: &PlannedNode) -> ResolvedNode {
        let mut attributes: BTreeMap<String, serde_json::Value> = node
            .attributes
            .iter()
            .filter_map(|(key, value)| match value {
                ResolvedValue::Literal(v) => Some((key.clone(), v.clone())),
                _ => None,
            })
            .collect();
        if let Some(runtime) = self.values.get(&node.id) {
            attributes.extend(runtime.clone());
        }
        ResolvedNode {
            id: node.id.clone(),
            kind: node.kind,
            physical_name: node.physical_name.clone(),
            attributes,
            one_shot: node.one_shot.clone(),
        }
    }
}
