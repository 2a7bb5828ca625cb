//! 環境定義

use super::gate::{Backing, ConditionalGate};
use super::group::ResourceGroup;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 環境（development, production など）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    /// 物理名のサフィックス。省略時は `{workspace}-{name}`
    #[serde(default)]
    pub key: Option<String>,
    /// この環境でマネージドサービスを選択肢に含めるか
    pub managed_backing: bool,
    /// コンポーネントごとの有効フラグ
    #[serde(default)]
    pub components: BTreeMap<String, bool>,
    /// ロールごとのバッキングトグル
    #[serde(default)]
    pub backings: BTreeMap<String, Backing>,
    /// この環境専用のグループ
    #[serde(default)]
    pub groups: Vec<ResourceGroup>,
    /// この環境専用のゲート
    #[serde(default)]
    pub gates: Vec<ConditionalGate>,
}

impl Environment {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: None,
            managed_backing: true,
            components: BTreeMap::new(),
            backings: BTreeMap::new(),
            groups: Vec::new(),
            gates: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: impl Into<String>, enabled: bool) -> Self {
        self.components.insert(component.into(), enabled);
        self
    }

    pub fn with_backing(mut self, role: impl Into<String>, backing: Backing) -> Self {
        self.backings.insert(role.into(), backing);
        self
    }

    pub fn with_managed_backing(mut self, available: bool) -> Self {
        self.managed_backing = available;
        self
    }

    pub fn with_group(mut self, group: ResourceGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn with_gate(mut self, gate: ConditionalGate) -> Self {
        self.gates.push(gate);
        self
    }

    /// コンポーネントの有効判定
    ///
    /// コンポーネント未指定なら常に有効。環境がコンポーネントを一つも列挙して
    /// いなければ全て有効、列挙していれば記載のないものは無効。
    pub fn component_enabled(&self, component: Option<&str>) -> bool {
        match component {
            Some(name) if !self.components.is_empty() => {
                self.components.get(name).copied().unwrap_or(false)
            }
            _ => true,
        }
    }

    /// ロールのトグル値（未指定はセルフホスト）
    pub fn backing_for(&self, role: &str) -> Backing {
        self.backings.get(role).copied().unwrap_or_default()
    }

    /// 物理名のサフィックス
    pub fn key(&self, workspace: &str) -> String {
        self.key
            .clone()
            .unwrap_or_else(|| format!("{}-{}", workspace, self.name))
    }
}
