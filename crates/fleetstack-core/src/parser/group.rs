//! group ノードとリソースノードのパース

use super::{args, name_arg, prop_bool, prop_string};
use crate::error::{Result, StackError};
use crate::model::{
    Attribute, DeferredReference, Layer, NodeKind, ResourceGroup, ResourceNode, SecretSource,
};
use crate::template::kdl_value_to_json;
use kdl::{KdlEntry, KdlNode};

/// group ノードをパース
///
/// ```kdl
/// group "superset" layer="cloud" component="superset" {
///     volume "superset-db-volume" { size 32 }
/// }
/// ```
pub fn parse_group(node: &KdlNode) -> Result<ResourceGroup> {
    let name = name_arg(node, "group")?;
    let layer_name = prop_string(node, "layer").ok_or_else(|| {
        StackError::InvalidConfig(format!("グループ '{}' には layer の指定が必要です", name))
    })?;
    let layer = Layer::parse(&layer_name).ok_or_else(|| {
        StackError::InvalidConfig(format!(
            "グループ '{}' の layer が不正です: '{}'（build / cloud / cluster）",
            name, layer_name
        ))
    })?;

    let mut group = ResourceGroup::new(&name, layer);
    group.component = prop_string(node, "component");
    group.enabled = prop_bool(node, "enabled").unwrap_or(true);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            group.nodes.push(parse_resource_node(child)?);
        }
    }
    Ok(group)
}

/// リソースノードをパース
///
/// ノード名が種別、先頭の引数がIDになる。
pub fn parse_resource_node(node: &KdlNode) -> Result<ResourceNode> {
    let keyword = node.name().value();
    let kind = NodeKind::parse(keyword).ok_or_else(|| {
        StackError::InvalidConfig(format!("不明なリソース種別です: '{}'", keyword))
    })?;
    let id = name_arg(node, keyword)?;

    let mut resource = ResourceNode::new(&id, kind);
    resource.enabled = prop_bool(node, "enabled").unwrap_or(true);
    resource.skip_delete = prop_bool(node, "skip-delete")
        .or_else(|| prop_bool(node, "skip_delete"))
        .unwrap_or(false);

    if let Some(children) = node.children() {
        for child in children.nodes() {
            let key = child.name().value();
            if key == "once" {
                if kind != NodeKind::ClusterApplication {
                    return Err(StackError::InvalidConfig(format!(
                        "{} '{}': once フラグは app にのみ指定できます",
                        keyword, id
                    )));
                }
                parse_one_shot(&mut resource, child)?;
                continue;
            }
            let attribute = parse_attribute(child).map_err(|e| match e {
                StackError::InvalidConfig(message) => {
                    StackError::InvalidConfig(format!("{} '{}': {}", keyword, id, message))
                }
                other => other,
            })?;
            resource.attributes.insert(key.to_string(), attribute);
        }
    }
    Ok(resource)
}

/// `once { db-migrate #true }`
fn parse_one_shot(resource: &mut ResourceNode, node: &KdlNode) -> Result<()> {
    let Some(children) = node.children() else {
        return Ok(());
    };
    for flag in children.nodes() {
        let value = args(flag)
            .next()
            .and_then(|e| e.value().as_bool())
            .ok_or_else(|| {
                StackError::InvalidConfig(format!(
                    "{} の once フラグ '{}' には真偽値が必要です",
                    resource.id,
                    flag.name().value()
                ))
            })?;
        resource.one_shot.insert(flag.name().value().to_string(), value);
    }
    Ok(())
}

/// エントリの型注釈（`(ref)` など）
fn annotation(entry: &KdlEntry) -> Option<&str> {
    entry.ty().map(|t| t.value())
}

/// 属性ノードをパース
///
/// - `(ref)"node.attr"` は遅延参照。複数並べると先頭から順に評価する
/// - `(secret)"path#key"` はシークレット
/// - それ以外はリテラル。引数が複数ならリスト、子ノードだけならマップ
pub fn parse_attribute(node: &KdlNode) -> Result<Attribute> {
    let key = node.name().value();
    let entries: Vec<&KdlEntry> = args(node).collect();

    let refs = entries
        .iter()
        .filter(|e| annotation(e) == Some("ref"))
        .count();

    if refs > 0 {
        if refs != entries.len() {
            return Err(StackError::InvalidConfig(format!(
                "属性 '{}' で参照とリテラルは混在できません",
                key
            )));
        }
        let sources = entries
            .iter()
            .map(|e| {
                e.value()
                    .as_string()
                    .and_then(DeferredReference::parse)
                    .ok_or_else(|| {
                        StackError::InvalidConfig(format!(
                            "属性 '{}' の参照は \"ノード.属性\" の形式で指定してください",
                            key
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        let optional = prop_bool(node, "optional").unwrap_or(false);
        return Ok(Attribute::first_of(sources, !optional));
    }

    if let [entry] = entries.as_slice()
        && annotation(entry) == Some("secret")
    {
        let path = entry.value().as_string().ok_or_else(|| {
            StackError::InvalidConfig(format!("属性 '{}' のシークレットはパス文字列です", key))
        })?;
        return Ok(Attribute::Secret(SecretSource::parse(path)));
    }

    if let Some(ty) = entries.iter().find_map(|e| annotation(e)) {
        return Err(StackError::InvalidConfig(format!(
            "属性 '{}' に不明な型注釈があります: ({})",
            key, ty
        )));
    }

    match entries.as_slice() {
        [] => match node.children() {
            Some(children) => {
                let map = children
                    .nodes()
                    .iter()
                    .map(|c| -> Result<(String, serde_json::Value)> {
                        let value = parse_attribute(c)?.as_literal().cloned().ok_or_else(|| {
                            StackError::InvalidConfig(format!(
                                "属性 '{}' の中では参照を使えません",
                                key
                            ))
                        })?;
                        Ok((c.name().value().to_string(), value))
                    })
                    .collect::<Result<serde_json::Map<_, _>>>()?;
                Ok(Attribute::Literal(serde_json::Value::Object(map)))
            }
            None => Err(StackError::InvalidConfig(format!(
                "属性 '{}' に値がありません",
                key
            ))),
        },
        [single] => Ok(Attribute::Literal(kdl_value_to_json(single.value()))),
        many => Ok(Attribute::Literal(serde_json::Value::Array(
            many.iter().map(|e| kdl_value_to_json(e.value())).collect(),
        ))),
    }
}
