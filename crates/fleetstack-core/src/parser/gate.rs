//! gate ノードのパース

use super::{args, name_arg, prop_string};
use crate::error::{Result, StackError};
use crate::model::{Alternative, Backing, ConditionalGate};
use kdl::KdlNode;

/// gate ノードをパース
///
/// ```kdl
/// gate "superset-db" component="superset" {
///     alternative "managed" "superset-rds"
///     alternative "self-hosted" "superset-db-volume" "ss-db"
/// }
/// ```
pub fn parse_gate(node: &KdlNode) -> Result<ConditionalGate> {
    let role = name_arg(node, "gate")?;
    let mut gate = ConditionalGate::new(&role);
    gate.component = prop_string(node, "component");

    if let Some(children) = node.children() {
        for child in children.nodes() {
            if child.name().value() != "alternative" {
                return Err(StackError::InvalidConfig(format!(
                    "ゲート '{}' には alternative しか置けません: {}",
                    role,
                    child.name().value()
                )));
            }

            let mut values = args(child).filter_map(|e| e.value().as_string());
            let backing = values
                .next()
                .and_then(Backing::parse)
                .ok_or_else(|| {
                    StackError::InvalidConfig(format!(
                        "ゲート '{}' の alternative には managed か self-hosted を指定してください",
                        role
                    ))
                })?;
            gate.alternatives.push(Alternative::new(backing, values));
        }
    }

    if gate.alternatives.is_empty() {
        return Err(StackError::InvalidConfig(format!(
            "ゲート '{}' に alternative がありません",
            role
        )));
    }
    Ok(gate)
}
