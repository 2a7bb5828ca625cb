//! 環境コンポジション
//!
//! 宣言から環境ごとの適用計画を組み立てる。処理は以下の順で、各フェーズは
//! 前のフェーズの結果が確定してから始まる。
//!
//! 1. ゲート評価（[`GatedGraph::build`]）
//! 2. 参照解決（[`ReferenceResolver`]）
//! 3. グループ・レイヤーの組み立て
//!
//! 途中でエラーになった場合、部分的な計画は返さない。

mod gate;
mod graph;
mod group;
mod resolver;

pub use gate::{GateDecision, evaluate_gate};
pub use graph::{GatedGraph, GraphGroup, GraphNode};
pub use group::{effective_enabled, effective_members};
pub use resolver::ReferenceResolver;

use crate::error::{Result, StackError};
use crate::model::{
    EnvironmentPlan, Environment, Layer, PlannedGroup, PlannedNode, ResolvedValue, SkippedNode,
    Workspace,
};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// 単一環境のコンポジション
pub struct EnvironmentComposition<'a> {
    workspace: &'a Workspace,
    environment: &'a Environment,
    strict_ordering: bool,
}

impl<'a> EnvironmentComposition<'a> {
    pub fn new(workspace: &'a Workspace, environment: &str) -> Result<Self> {
        let environment = workspace.environment(environment)?;
        Ok(Self {
            workspace,
            environment,
            strict_ordering: workspace.settings.strict_ordering,
        })
    }

    /// 宣言順に反する参照をエラーにする
    pub fn strict_ordering(mut self, strict: bool) -> Self {
        self.strict_ordering = strict;
        self
    }

    /// 適用計画を組み立てる
    #[tracing::instrument(skip(self), fields(environment = %self.environment.name))]
    pub fn compose(&self) -> Result<EnvironmentPlan> {
        let graph = GatedGraph::build(self.workspace, self.environment)?;

        let resolver = ReferenceResolver::new(&graph);
        for node in graph.nodes() {
            resolver.validate(node)?;
        }

        let mut resolved: BTreeMap<&str, BTreeMap<String, ResolvedValue>> = BTreeMap::new();
        for node in graph.enabled_nodes() {
            self.check_ordering(&graph, node)?;
            let attributes = resolver.resolve_node(node)?;
            check_accessors(&graph, node, &attributes)?;
            resolved.insert(&node.node.id, attributes);
        }

        let plan = assemble(&self.workspace.name, &graph, resolved);
        info!(summary = %plan.summary(), "Composition complete");
        Ok(plan)
    }

    fn check_ordering(&self, graph: &GatedGraph, node: &GraphNode) -> Result<()> {
        for (attribute, reference) in node.node.references() {
            let Some(target) = graph.get(&reference.node) else {
                continue;
            };
            if !target.enabled || target.id == node.id {
                continue;
            }

            let reason = if target.layer > node.layer {
                format!("後のレイヤー ({}) に属しています", target.layer)
            } else if target.layer < node.layer
                || (target.group, target.position) < (node.group, node.position)
            {
                continue;
            } else if target.group == node.group {
                format!("グループ '{}' 内で後に宣言されています", graph.group(node.group).name)
            } else {
                format!(
                    "後に宣言されたグループ '{}' に属しています",
                    graph.group(target.group).name
                )
            };

            if self.strict_ordering {
                return Err(StackError::OrderingViolation {
                    consumer: node.id.clone(),
                    attribute: attribute.to_string(),
                    target: target.id.clone(),
                    reason,
                });
            }
            warn!(
                consumer = %node.id,
                attribute,
                target = %target.id,
                %reason,
                "Reference against declared order"
            );
        }
        Ok(())
    }
}

/// アクセサの参照先が参照元より先に適用されることを確かめる
///
/// 満たさない場合は適用時に値が確定しないため、strict-ordering に関係なくエラー。
fn check_accessors(
    graph: &GatedGraph,
    node: &GraphNode,
    attributes: &BTreeMap<String, ResolvedValue>,
) -> Result<()> {
    for (attribute, value) in attributes {
        let ResolvedValue::Accessor(accessor) = value else {
            continue;
        };
        let Some(target) = graph.get(&accessor.node.name) else {
            continue;
        };
        if !target.applied_before(node) {
            return Err(StackError::OrderingViolation {
                consumer: node.id.clone(),
                attribute: attribute.clone(),
                target: target.id.clone(),
                reason: format!("{} は参照元より先に適用されません", accessor),
            });
        }
    }
    Ok(())
}

/// 環境の適用計画を組み立てる
pub fn compose_environment(workspace: &Workspace, environment: &str) -> Result<EnvironmentPlan> {
    EnvironmentComposition::new(workspace, environment)?.compose()
}

fn assemble(
    workspace: &str,
    graph: &GatedGraph,
    mut resolved: BTreeMap<&str, BTreeMap<String, ResolvedValue>>,
) -> EnvironmentPlan {
    let mut plan = EnvironmentPlan {
        workspace: workspace.to_string(),
        environment: graph.environment().to_string(),
        key: graph.key().to_string(),
        build: Vec::new(),
        cloud: Vec::new(),
        cluster: Vec::new(),
        skipped: Vec::new(),
    };

    for (index, group) in graph.groups.iter().enumerate() {
        let nodes: Vec<PlannedNode> = effective_members(graph, index)
            .into_iter()
            .map(|n| PlannedNode {
                id: n.id.clone(),
                kind: n.node.kind,
                physical_name: physical_name(n, graph.key()),
                attributes: resolved.remove(n.node.id.as_str()).unwrap_or_default(),
                one_shot: n.node.one_shot.clone(),
                skip_delete: n.node.skip_delete,
            })
            .collect();

        if nodes.is_empty() {
            continue;
        }

        let planned = PlannedGroup {
            name: group.name.clone(),
            layer: group.layer,
            nodes,
        };
        match group.layer {
            Layer::Build => plan.build.push(planned),
            Layer::Cloud => plan.cloud.push(planned),
            Layer::Cluster => plan.cluster.push(planned),
        }
    }

    plan.skipped = graph
        .nodes()
        .filter_map(|n| {
            n.skip.clone().map(|reason| SkippedNode {
                id: n.id.clone(),
                kind: n.node.kind,
                group: graph.group(n.group).name.clone(),
                reason,
            })
        })
        .collect();

    plan
}

/// クラスタアプリはネームスペースで分離されるためIDのまま、それ以外は環境キーを付与
fn physical_name(node: &GraphNode, key: &str) -> String {
    match node.layer {
        Layer::Cluster => node.node.id.clone(),
        Layer::Build | Layer::Cloud => format!("{}-{}", node.node.id, key),
    }
}
