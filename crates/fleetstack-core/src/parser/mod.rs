//! KDLパーサー
//!
//! 展開済みのKDLからワークスペース宣言を組み立てる。
//! ノード種別ごとのパース処理はモジュールに分離している。

mod environment;
mod gate;
mod group;
mod settings;

use environment::apply_environment;
use gate::parse_gate;
use group::parse_group;
use settings::apply_settings;

pub use group::{parse_attribute, parse_resource_node};

use crate::error::{Result, StackError};
use crate::model::{Environment, Workspace};
use kdl::{KdlDocument, KdlEntry, KdlNode};
use std::fs;
use std::path::Path;
use tracing::debug;

/// KDLファイルをパース
///
/// `workspace` ノードがなければディレクトリ名をワークスペース名にする。
pub fn parse_kdl_file<P: AsRef<Path>>(path: P) -> Result<Workspace> {
    let content = fs::read_to_string(path.as_ref())?;
    let name = path
        .as_ref()
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    parse_kdl_string(&content, name)
}

/// KDL文字列をパース
pub fn parse_kdl_string(content: &str, default_name: String) -> Result<Workspace> {
    let doc: KdlDocument = content.parse()?;
    let mut workspace = Workspace::new(default_name);

    for node in doc.nodes() {
        match node.name().value() {
            "workspace" | "project" => {
                workspace.name = name_arg(node, "workspace")?;
            }
            "settings" => apply_settings(&mut workspace.settings, node)?,
            "environment" | "env" => {
                // 同名の環境が再宣言された場合（stack.{env}.kdl など）は先の宣言に重ねる
                let name = name_arg(node, "environment")?;
                let environment = workspace
                    .environments
                    .entry(name.clone())
                    .or_insert_with(|| Environment::new(name));
                apply_environment(environment, node)?;
            }
            "group" => workspace.groups.push(parse_group(node)?),
            "gate" => workspace.gates.push(parse_gate(node)?),
            // テンプレート展開時に処理済み
            "variables" => {}
            other => {
                debug!(node = other, "Skipping unknown top-level node");
            }
        }
    }

    Ok(workspace)
}

/// 位置引数（プロパティ以外のエントリ）
pub(crate) fn args(node: &KdlNode) -> impl Iterator<Item = &KdlEntry> {
    node.entries().iter().filter(|e| e.name().is_none())
}

/// 先頭の文字列引数
pub(crate) fn first_string(node: &KdlNode) -> Option<&str> {
    args(node).next().and_then(|e| e.value().as_string())
}

/// 名前引数を必須で取得
pub(crate) fn name_arg(node: &KdlNode, what: &str) -> Result<String> {
    first_string(node)
        .map(str::to_string)
        .ok_or_else(|| StackError::InvalidConfig(format!("{} には名前が必要です", what)))
}

pub(crate) fn prop_string(node: &KdlNode, key: &str) -> Option<String> {
    node.get(key)
        .and_then(|v| v.as_string())
        .map(str::to_string)
}

pub(crate) fn prop_bool(node: &KdlNode, key: &str) -> Option<bool> {
    node.get(key).and_then(|v| v.as_bool())
}

/// `key #true` 形式の真偽値
pub(crate) fn bool_arg(node: &KdlNode) -> Result<bool> {
    args(node)
        .next()
        .and_then(|e| e.value().as_bool())
        .ok_or_else(|| {
            StackError::InvalidConfig(format!(
                "'{}' には真偽値が必要です",
                node.name().value()
            ))
        })
}
