//! ワークスペース定義

use super::environment::Environment;
use super::gate::ConditionalGate;
use super::group::ResourceGroup;
use super::settings::Settings;
use crate::error::{Result, StackError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// ワークスペース（宣言全体）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    pub name: String,
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub environments: BTreeMap<String, Environment>,
    /// 全環境で共有するグループ
    #[serde(default)]
    pub groups: Vec<ResourceGroup>,
    /// 全環境で共有するゲート
    #[serde(default)]
    pub gates: Vec<ConditionalGate>,
}

impl Workspace {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environments
            .insert(environment.name.clone(), environment);
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

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn environment(&self, name: &str) -> Result<&Environment> {
        self.environments
            .get(name)
            .ok_or_else(|| StackError::EnvironmentNotFound {
                name: name.to_string(),
                available: self.environment_names().join(", "),
            })
    }

    pub fn environment_names(&self) -> Vec<&str> {
        self.environments.keys().map(String::as_str).collect()
    }
}
