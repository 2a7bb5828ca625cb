//! 条件ゲートの評価
//!
//! マネージド / セルフホストのような相互排他な選択肢から、
//! 環境ごとにちょうど一つを有効にする。

use crate::error::{Result, StackError};
use crate::model::{Backing, ConditionalGate, Environment, NodeId};
use std::collections::BTreeMap;
use tracing::debug;

/// 単一ゲートの評価結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub role: String,
    /// 選ばれたバッキング（ロール無効時は None）
    pub selected: Option<Backing>,
    /// 候補ノードごとの有効フラグ（宣言順）
    pub states: Vec<(String, bool)>,
}

impl GateDecision {
    pub fn is_enabled(&self, node: &str) -> Option<bool> {
        self.states
            .iter()
            .find(|(id, _)| id == node)
            .map(|(_, enabled)| *enabled)
    }

    pub fn enabled_nodes(&self) -> impl Iterator<Item = &str> {
        self.states
            .iter()
            .filter(|(_, enabled)| *enabled)
            .map(|(id, _)| id.as_str())
    }
}

/// ゲートを評価する
///
/// - `role_enabled` が false なら、トグルに関係なく全候補を無効にする
/// - `managed_available` が false なら、マネージドの選択肢は候補から外れる
/// - トグルに一致する候補が一つでなければエラー
pub fn evaluate_gate(
    gate: &ConditionalGate,
    toggle: Backing,
    role_enabled: bool,
    managed_available: bool,
) -> Result<GateDecision> {
    let all_nodes = || {
        gate.alternatives
            .iter()
            .flat_map(|alt| alt.nodes.iter().cloned())
    };

    if !role_enabled {
        debug!(role = %gate.role, "Role disabled, all alternatives off");
        return Ok(GateDecision {
            role: gate.role.clone(),
            selected: None,
            states: all_nodes().map(|id| (id, false)).collect(),
        });
    }

    let matches: Vec<usize> = gate
        .alternatives
        .iter()
        .enumerate()
        .filter(|(_, alt)| managed_available || alt.backing != Backing::Managed)
        .filter(|(_, alt)| alt.backing == toggle)
        .map(|(i, _)| i)
        .collect();

    let chosen = match matches.as_slice() {
        [one] => *one,
        [] => {
            return Err(StackError::NoMatch {
                role: gate.role.clone(),
                backing: toggle,
            });
        }
        many => {
            return Err(StackError::AmbiguousGate {
                role: gate.role.clone(),
                backing: toggle,
                count: many.len(),
            });
        }
    };

    debug!(role = %gate.role, backing = %toggle, "Gate resolved");
    let states = gate
        .alternatives
        .iter()
        .enumerate()
        .flat_map(|(i, alt)| alt.nodes.iter().map(move |id| (id.clone(), i == chosen)))
        .collect();

    Ok(GateDecision {
        role: gate.role.clone(),
        selected: Some(toggle),
        states,
    })
}

/// ゲートがノードに与える状態
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GateState {
    pub role: String,
    pub role_enabled: bool,
    pub selected: bool,
}

/// 環境内の全ゲートを評価し、ノードごとの状態表を作る
pub(crate) fn evaluate_all(
    environment: &Environment,
    gates: &[&ConditionalGate],
    is_known: impl Fn(&str) -> bool,
) -> Result<BTreeMap<String, GateState>> {
    let mut table: BTreeMap<String, GateState> = BTreeMap::new();
    let mut seen_roles: Vec<&str> = Vec::new();

    for gate in gates {
        if seen_roles.contains(&gate.role.as_str()) {
            return Err(StackError::InvalidConfig(format!(
                "ロール '{}' のゲートが重複しています",
                gate.role
            )));
        }
        seen_roles.push(&gate.role);

        let role_enabled = environment.component_enabled(gate.component.as_deref());
        let decision = evaluate_gate(
            gate,
            environment.backing_for(&gate.role),
            role_enabled,
            environment.managed_backing,
        )?;

        for (node, selected) in decision.states {
            if !is_known(&node) {
                return Err(StackError::UnknownNode {
                    node: NodeId::new(&environment.name, node),
                    referenced_by: format!("gate '{}'", gate.role),
                });
            }
            if let Some(previous) = table.get(&node) {
                return Err(StackError::ConflictingGate {
                    node: NodeId::new(&environment.name, node),
                    first: previous.role.clone(),
                    second: gate.role.clone(),
                });
            }
            table.insert(
                node,
                GateState {
                    role: gate.role.clone(),
                    role_enabled,
                    selected,
                },
            );
        }
    }

    for role in environment.backings.keys() {
        if !seen_roles.contains(&role.as_str()) {
            tracing::warn!(role = %role, "Backing toggle set for a role without a gate");
        }
    }

    Ok(table)
}
