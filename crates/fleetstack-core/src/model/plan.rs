//! 環境ごとの適用計画

use super::group::Layer;
use super::node::{NodeId, NodeKind};
use super::reference::ResolvedValue;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 環境全体の適用計画
///
/// 有効なノードだけを含む。同じ入力からは常に同じ計画が得られる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentPlan {
    pub workspace: String,
    pub environment: String,
    /// 物理名サフィックス（クラスタではネームスペースとしても使う）
    pub key: String,
    pub build: Vec<PlannedGroup>,
    pub cloud: Vec<PlannedGroup>,
    pub cluster: Vec<PlannedGroup>,
    /// 計画から除外されたノード
    pub skipped: Vec<SkippedNode>,
}

impl EnvironmentPlan {
    pub fn layer(&self, layer: Layer) -> &[PlannedGroup] {
        match layer {
            Layer::Build => &self.build,
            Layer::Cloud => &self.cloud,
            Layer::Cluster => &self.cluster,
        }
    }

    /// 全ノードを適用順に列挙
    pub fn nodes(&self) -> impl Iterator<Item = &PlannedNode> {
        Layer::ALL
            .into_iter()
            .flat_map(|layer| self.layer(layer).iter())
            .flat_map(|group| group.nodes.iter())
    }

    pub fn node(&self, name: &str) -> Option<&PlannedNode> {
        self.nodes().find(|n| n.id.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.node(name).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes().next().is_none()
    }

    /// true のままの一度きりトグル
    pub fn pending_one_shots(&self) -> Vec<PendingOneShot> {
        self.nodes()
            .flat_map(|node| {
                node.one_shot
                    .iter()
                    .filter(|(_, on)| **on)
                    .map(|(flag, _)| PendingOneShot {
                        node: node.id.clone(),
                        flag: flag.clone(),
                    })
            })
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        let count = |groups: &[PlannedGroup]| groups.iter().map(|g| g.nodes.len()).sum();
        PlanSummary {
            build: count(&self.build),
            cloud: count(&self.cloud),
            cluster: count(&self.cluster),
            skipped: self.skipped.len(),
        }
    }
}

/// 計画内のグループ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedGroup {
    pub name: String,
    pub layer: Layer,
    pub nodes: Vec<PlannedNode>,
}

/// 解決済みノード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub physical_name: String,
    pub attributes: BTreeMap<String, ResolvedValue>,
    pub one_shot: BTreeMap<String, bool>,
    pub skip_delete: bool,
}

impl PlannedNode {
    pub fn attribute(&self, key: &str) -> Option<&ResolvedValue> {
        self.attributes.get(key)
    }

    pub fn literal_str(&self, key: &str) -> Option<&str> {
        match self.attributes.get(key) {
            Some(ResolvedValue::Literal(serde_json::Value::String(s))) => Some(s),
            _ => None,
        }
    }

    pub fn literal_bool(&self, key: &str) -> Option<bool> {
        match self.attributes.get(key) {
            Some(ResolvedValue::Literal(serde_json::Value::Bool(b))) => Some(*b),
            _ => None,
        }
    }
}

/// 除外されたノード
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub group: String,
    pub reason: SkipReason,
}

/// 除外理由
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum SkipReason {
    /// グループ（またはそのコンポーネント）が無効
    GroupDisabled,
    /// ノード自身が enabled=#false
    Disabled,
    /// ロール全体が無効
    RoleDisabled { role: String },
    /// ゲートで別の選択肢が選ばれた
    NotSelected { role: String },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::GroupDisabled => f.write_str("グループ無効"),
            Self::Disabled => f.write_str("無効"),
            Self::RoleDisabled { role } => write!(f, "ロール '{}' 無効", role),
            Self::NotSelected { role } => write!(f, "ロール '{}' で未選択", role),
        }
    }
}

/// 反転待ちの一度きりトグル
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingOneShot {
    pub node: NodeId,
    pub flag: String,
}

/// 計画の概要
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanSummary {
    pub build: usize,
    pub cloud: usize,
    pub cluster: usize,
    pub skipped: usize,
}

impl fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} images, {} cloud resources, {} cluster apps, {} skipped",
            self.build, self.cloud, self.cluster, self.skipped
        )
    }
}
