//! ゲート評価済みのリソースグラフ
//!
//! 参照解決はこのグラフに対してのみ行える。有効フラグはここで確定し、以降変化しない。

use super::gate::{GateState, evaluate_all};
use super::group::effective_enabled;
use crate::error::{Result, StackError};
use crate::model::{
    Attribute, ConditionalGate, Environment, Layer, NodeId, NodeKind, ResourceGroup, ResourceNode,
    Settings, SkipReason, Workspace,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// グラフ上のノード
#[derive(Debug, Clone)]
pub struct GraphNode {
    pub id: NodeId,
    pub node: ResourceNode,
    /// 所属グループのインデックス
    pub group: usize,
    /// グループ内の宣言位置
    pub position: usize,
    pub layer: Layer,
    /// 最終的な有効フラグ
    pub enabled: bool,
    pub skip: Option<SkipReason>,
}

impl GraphNode {
    /// `other` より先に適用が完了するか
    ///
    /// レイヤー、グループの宣言順、グループ内の位置の順に比べる。ビルドレイヤーの
    /// イメージは並行してビルドされるため、同じレイヤー内に先後はない。
    pub fn applied_before(&self, other: &GraphNode) -> bool {
        match self.layer.cmp(&other.layer) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => {
                self.layer != Layer::Build
                    && (self.group, self.position) < (other.group, other.position)
            }
        }
    }
}

/// グラフ上のグループ
#[derive(Debug, Clone)]
pub struct GraphGroup {
    pub name: String,
    pub layer: Layer,
    pub enabled: bool,
}

/// ゲート評価済みグラフ
#[derive(Debug, Clone)]
pub struct GatedGraph {
    pub(crate) environment: String,
    pub(crate) key: String,
    pub(crate) groups: Vec<GraphGroup>,
    pub(crate) nodes: Vec<GraphNode>,
    index: BTreeMap<String, usize>,
}

impl GatedGraph {
    /// 宣言を集めて全ゲートを評価する
    ///
    /// 共有グループ → 環境専用グループの順に並べ、ノードIDの重複を検出する。
    #[tracing::instrument(skip(workspace, environment), fields(environment = %environment.name))]
    pub fn build(workspace: &Workspace, environment: &Environment) -> Result<Self> {
        let groups: Vec<&ResourceGroup> = workspace
            .groups
            .iter()
            .chain(environment.groups.iter())
            .collect();
        let gates: Vec<&ConditionalGate> = workspace
            .gates
            .iter()
            .chain(environment.gates.iter())
            .collect();

        let mut index = BTreeMap::new();
        let mut declared = Vec::new();
        for (gi, group) in groups.iter().enumerate() {
            for (position, node) in group.nodes.iter().enumerate() {
                if node.kind.layer() != group.layer {
                    return Err(StackError::InvalidConfig(format!(
                        "{} ノード '{}' は {} レイヤーのグループ '{}' に置けません",
                        node.kind, node.id, group.layer, group.name
                    )));
                }
                if index.insert(node.id.clone(), declared.len()).is_some() {
                    return Err(StackError::DuplicateIdentifier(NodeId::new(
                        &environment.name,
                        &node.id,
                    )));
                }
                declared.push((gi, position, node));
            }
        }

        let gate_table = evaluate_all(environment, &gates, |id| index.contains_key(id))?;

        let graph_groups: Vec<GraphGroup> = groups
            .iter()
            .map(|g| GraphGroup {
                name: g.name.clone(),
                layer: g.layer,
                enabled: g.enabled && environment.component_enabled(g.component.as_deref()),
            })
            .collect();

        let nodes: Vec<GraphNode> = declared
            .into_iter()
            .map(|(gi, position, node)| {
                let group = &graph_groups[gi];
                let skip = skip_reason(group.enabled, node, gate_table.get(&node.id));
                GraphNode {
                    id: NodeId::new(&environment.name, &node.id),
                    node: with_settings_defaults(
                        node.clone(),
                        &workspace.settings,
                        &environment.name,
                    ),
                    group: gi,
                    position,
                    layer: group.layer,
                    enabled: skip.is_none(),
                    skip,
                }
            })
            .collect();

        let enabled = nodes.iter().filter(|n| n.enabled).count();
        info!(
            nodes = nodes.len(),
            enabled,
            gates = gates.len(),
            "Gates evaluated"
        );

        Ok(Self {
            environment: environment.name.clone(),
            key: environment.key(&workspace.name),
            groups: graph_groups,
            nodes,
            index,
        })
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn get(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter()
    }

    pub fn enabled_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.nodes.iter().filter(|n| n.enabled)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        self.get(id).is_some_and(|n| n.enabled)
    }

    pub fn group(&self, index: usize) -> &GraphGroup {
        &self.groups[index]
    }

    /// このグラフ上のノードIDを名前空間化
    pub fn node_id(&self, name: &str) -> NodeId {
        NodeId::new(&self.environment, name)
    }
}

fn skip_reason(
    group_enabled: bool,
    node: &ResourceNode,
    gate: Option<&GateState>,
) -> Option<SkipReason> {
    if !effective_enabled(group_enabled, node.enabled) {
        return Some(if group_enabled {
            SkipReason::Disabled
        } else {
            SkipReason::GroupDisabled
        });
    }
    match gate {
        Some(state) if !state.role_enabled => Some(SkipReason::RoleDisabled {
            role: state.role.clone(),
        }),
        Some(state) if !state.selected => Some(SkipReason::NotSelected {
            role: state.role.clone(),
        }),
        _ => None,
    }
}

/// 設定由来の既定値を補う
///
/// 宣言済みの属性は上書きしない。
fn with_settings_defaults(
    mut node: ResourceNode,
    settings: &Settings,
    environment: &str,
) -> ResourceNode {
    use serde_json::Value;

    let mut defaults: Vec<(&str, Value)> = Vec::new();
    match node.kind {
        NodeKind::ContainerImage => {
            // リポジトリを含まない名前には image-repo を前置する
            if let Some(repo) = settings.image_repo.as_deref()
                && let Some(Attribute::Literal(Value::String(name))) =
                    node.attributes.get_mut("name")
                && !name.contains('/')
            {
                *name = format!("{}/{}", repo.trim_end_matches('/'), name);
            }
            defaults.extend([
                ("tag", Value::from(environment)),
                ("build", Value::from(settings.build_images)),
                ("push", Value::from(settings.push_images)),
                ("pull", Value::from(settings.force_pull_images)),
                ("skip-cache", Value::from(settings.skip_image_cache)),
            ]);
        }
        NodeKind::Volume | NodeKind::ManagedDatabase | NodeKind::ManagedCache => {
            if let Some(region) = &settings.aws_region {
                defaults.push(("region", Value::from(region.as_str())));
            }
            if let Some(az) = &settings.aws_az1 {
                defaults.push(("availability-zone", Value::from(az.as_str())));
            }
        }
        NodeKind::ClusterApplication => {
            defaults.push(("use-cache", Value::from(settings.use_cache)));
            if node.literal("git-sync") == Some(&Value::Bool(true)) {
                if let Some(repo) = &settings.repo {
                    defaults.push(("git-repo", Value::from(repo.as_str())));
                }
                if let Some(branch) = &settings.branch {
                    defaults.push(("git-ref", Value::from(branch.as_str())));
                }
            }
        }
    }

    for (key, value) in defaults {
        node.attributes
            .entry(key.to_string())
            .or_insert_with(|| Attribute::Literal(value));
    }
    debug!(node = %node.id, kind = %node.kind, "Applied settings defaults");
    node
}
