//! environment ノードのパース

use super::gate::parse_gate;
use super::group::parse_group;
use super::{args, bool_arg, first_string, prop_bool, prop_string};
use crate::error::{Result, StackError};
use crate::model::{Backing, Environment};
use kdl::KdlNode;

/// environment ブロックを環境に適用
///
/// 同じ環境の宣言が複数あれば、後の宣言が前の値を上書きし、グループとゲートは追記される。
pub fn apply_environment(environment: &mut Environment, node: &KdlNode) -> Result<()> {
    if let Some(key) = prop_string(node, "key") {
        environment.key = Some(key);
    }
    if let Some(managed) = prop_bool(node, "managed-backing") {
        environment.managed_backing = managed;
    }

    let Some(children) = node.children() else {
        return Ok(());
    };

    for child in children.nodes() {
        match child.name().value() {
            "key" => {
                environment.key = first_string(child).map(str::to_string);
            }
            "managed-backing" | "managed_backing" => {
                environment.managed_backing = bool_arg(child)?;
            }
            "component" => {
                let name = first_string(child).ok_or_else(|| {
                    StackError::InvalidConfig(format!(
                        "環境 '{}' の component には名前が必要です",
                        environment.name
                    ))
                })?;
                let enabled = args(child)
                    .nth(1)
                    .and_then(|e| e.value().as_bool())
                    .unwrap_or(true);
                environment.components.insert(name.to_string(), enabled);
            }
            "backing" => {
                let mut values = args(child).filter_map(|e| e.value().as_string());
                let (Some(role), Some(value)) = (values.next(), values.next()) else {
                    return Err(StackError::InvalidConfig(format!(
                        "環境 '{}' の backing は \"ロール\" \"managed|self-hosted\" の形式で指定してください",
                        environment.name
                    )));
                };
                let backing = Backing::parse(value).ok_or_else(|| {
                    StackError::InvalidConfig(format!(
                        "不明な backing です: '{}'（ロール '{}'）",
                        value, role
                    ))
                })?;
                environment.backings.insert(role.to_string(), backing);
            }
            "group" => environment.groups.push(parse_group(child)?),
            "gate" => environment.gates.push(parse_gate(child)?),
            // テンプレート展開時に処理済み
            "variables" => {}
            other => {
                return Err(StackError::InvalidConfig(format!(
                    "環境 '{}' に不明なノードがあります: {}",
                    environment.name, other
                )));
            }
        }
    }
    Ok(())
}
