//! 遅延参照の解決
//!
//! ゲート評価済みグラフ上の純粋な計算で、プロビジョニングは一切行わない。
//! 適用時にしか分からない値はシンボリックなアクセサとして返す。

use super::graph::{GatedGraph, GraphNode};
use crate::error::{Result, StackError};
use crate::model::{
    Accessor, Attribute, DeferredReference, NodeKind, Resolution, ResolvedValue,
};
use std::collections::BTreeMap;
use tracing::debug;

/// 参照リゾルバ
pub struct ReferenceResolver<'g> {
    graph: &'g GatedGraph,
}

impl<'g> ReferenceResolver<'g> {
    /// ゲート評価済みのグラフからのみ作成できる
    pub fn new(graph: &'g GatedGraph) -> Self {
        Self { graph }
    }

    /// 単一の参照を解決する
    ///
    /// 参照先が無効なら `Absent`。
    pub fn resolve(&self, reference: &DeferredReference) -> Result<Resolution> {
        self.resolve_inner(reference, "-", &mut Vec::new())
    }

    /// 属性を解決する
    ///
    /// 必須の参照が全て `Absent` になった場合は `MissingDependency`。
    /// 任意の参照が `Absent` なら `None`（属性を省略）。
    pub fn resolve_attribute(
        &self,
        consumer: &str,
        attribute: &str,
        value: &Attribute,
    ) -> Result<Option<ResolvedValue>> {
        match value {
            Attribute::Literal(v) => Ok(Some(ResolvedValue::Literal(v.clone()))),
            Attribute::Secret(s) => Ok(Some(ResolvedValue::Secret(s.clone()))),
            Attribute::Reference { sources, required } => {
                let resolution = self.first_present(sources, consumer, &mut Vec::new())?;
                match resolution {
                    Resolution::Present(v) => Ok(Some(v)),
                    Resolution::Absent if *required => Err(StackError::MissingDependency {
                        consumer: self.graph.node_id(consumer),
                        attribute: attribute.to_string(),
                        sources: sources
                            .iter()
                            .map(|r| format!("{}.{}", self.graph.node_id(&r.node), r.attribute))
                            .collect::<Vec<_>>()
                            .join(", "),
                    }),
                    Resolution::Absent => {
                        debug!(consumer, attribute, "Optional reference is absent");
                        Ok(None)
                    }
                }
            }
        }
    }

    /// ノードの参照先を検証する
    ///
    /// 参照先ノードが存在し、その属性を宣言しているかランタイム属性として持つことを
    /// 確かめる。参照先の有効・無効には依存しないため、選ばれていない代替や後続の
    /// フォールバックへの誤記もここで見つかる。
    pub fn validate(&self, node: &GraphNode) -> Result<()> {
        for (_, reference) in node.node.references() {
            let target =
                self.graph
                    .get(&reference.node)
                    .ok_or_else(|| StackError::UnknownNode {
                        node: self.graph.node_id(&reference.node),
                        referenced_by: node.node.id.clone(),
                    })?;
            if !target.node.attributes.contains_key(&reference.attribute)
                && !target.node.kind.exports(&reference.attribute)
            {
                return Err(StackError::UnknownAttribute {
                    node: target.id.clone(),
                    attribute: reference.attribute.clone(),
                });
            }
        }
        Ok(())
    }

    /// ノードの全属性を解決する
    pub fn resolve_node(&self, node: &GraphNode) -> Result<BTreeMap<String, ResolvedValue>> {
        let mut resolved = BTreeMap::new();
        for (key, value) in &node.node.attributes {
            if let Some(v) = self.resolve_attribute(&node.node.id, key, value)? {
                resolved.insert(key.clone(), v);
            }
        }
        Ok(resolved)
    }

    fn first_present(
        &self,
        sources: &[DeferredReference],
        referenced_by: &str,
        stack: &mut Vec<String>,
    ) -> Result<Resolution> {
        for source in sources {
            let resolution = self.resolve_inner(source, referenced_by, stack)?;
            if !resolution.is_absent() {
                return Ok(resolution);
            }
        }
        Ok(Resolution::Absent)
    }

    fn resolve_inner(
        &self,
        reference: &DeferredReference,
        referenced_by: &str,
        stack: &mut Vec<String>,
    ) -> Result<Resolution> {
        let key = reference.to_string();
        if stack.contains(&key) {
            stack.push(key);
            return Err(StackError::CircularReference(stack.join(" -> ")));
        }

        let target = self
            .graph
            .get(&reference.node)
            .ok_or_else(|| StackError::UnknownNode {
                node: self.graph.node_id(&reference.node),
                referenced_by: referenced_by.to_string(),
            })?;

        if !target.enabled {
            return Ok(Resolution::Absent);
        }

        let value = match target.node.attributes.get(&reference.attribute) {
            Some(Attribute::Literal(v)) => Resolution::Present(ResolvedValue::Literal(v.clone())),
            Some(Attribute::Secret(s)) => Resolution::Present(ResolvedValue::Secret(s.clone())),
            Some(Attribute::Reference { sources, .. }) => {
                stack.push(key);
                let nested = self.first_present(sources, &target.node.id, stack)?;
                stack.pop();
                nested
            }
            None => Resolution::Present(self.exported(target, &reference.attribute)?),
        };
        Ok(value)
    }

    /// 種別ごとのランタイム属性
    ///
    /// ビルドしないイメージの `image` だけは宣言された `name:tag` がそのまま値になる。
    fn exported(&self, target: &GraphNode, attribute: &str) -> Result<ResolvedValue> {
        if target.node.kind == NodeKind::ContainerImage
            && attribute == "image"
            && target.node.literal("build") == Some(&serde_json::Value::Bool(false))
        {
            let name = target.node.literal("name").and_then(|v| v.as_str());
            let tag = target.node.literal("tag").and_then(|v| v.as_str());
            if let (Some(name), Some(tag)) = (name, tag) {
                return Ok(ResolvedValue::Literal(serde_json::Value::String(format!(
                    "{}:{}",
                    name, tag
                ))));
            }
        }

        if target.node.kind.exports(attribute) {
            return Ok(ResolvedValue::Accessor(Accessor {
                node: target.id.clone(),
                attribute: attribute.to_string(),
            }));
        }

        Err(StackError::UnknownAttribute {
            node: target.id.clone(),
            attribute: attribute.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Alternative, Backing, ConditionalGate, Environment, Layer, NodeId, ResourceGroup,
        ResourceNode, Workspace,
    };

    fn workspace(backing: Backing) -> Workspace {
        Workspace::new("data")
            .with_group(
                ResourceGroup::new("images", Layer::Build).with_node(
                    ResourceNode::new("superset-image", NodeKind::ContainerImage)
                        .with_attribute("name", Attribute::literal("repo/superset")),
                ),
            )
            .with_group(
                ResourceGroup::new("superset", Layer::Cloud)
                    .with_node(ResourceNode::new("superset-rds", NodeKind::ManagedDatabase)),
            )
            .with_group(
                ResourceGroup::new("superset", Layer::Cluster)
                    .with_node(
                        ResourceNode::new("ss-db", NodeKind::ClusterApplication)
                            .with_attribute("port", Attribute::literal(5432)),
                    )
                    .with_node(
                        ResourceNode::new("superset-ws", NodeKind::ClusterApplication)
                            .with_attribute(
                                "db-host",
                                Attribute::first_of(
                                    vec![
                                        DeferredReference::new("ss-db", "host"),
                                        DeferredReference::new("superset-rds", "host"),
                                    ],
                                    true,
                                ),
                            )
                            .with_attribute(
                                "db-port",
                                Attribute::first_of(
                                    vec![DeferredReference::new("ss-db", "port")],
                                    false,
                                ),
                            ),
                    ),
            )
            .with_gate(
                ConditionalGate::new("superset-db")
                    .with_alternative(Alternative::new(Backing::Managed, ["superset-rds"]))
                    .with_alternative(Alternative::new(Backing::SelfHosted, ["ss-db"])),
            )
            .with_environment(Environment::new("prd").with_backing("superset-db", backing))
    }

    fn graph(backing: Backing) -> GatedGraph {
        let ws = workspace(backing);
        GatedGraph::build(&ws, ws.environment("prd").unwrap()).unwrap()
    }

    #[test]
    fn test_reference_to_disabled_node_is_absent() {
        let graph = graph(Backing::SelfHosted);
        let resolver = ReferenceResolver::new(&graph);
        let r = resolver
            .resolve(&DeferredReference::new("superset-rds", "host"))
            .unwrap();
        assert_eq!(r, Resolution::Absent);
    }

    #[test]
    fn test_runtime_attribute_is_symbolic() {
        let graph = graph(Backing::Managed);
        let resolver = ReferenceResolver::new(&graph);
        let r = resolver
            .resolve(&DeferredReference::new("superset-rds", "host"))
            .unwrap();
        assert_eq!(
            r,
            Resolution::Present(ResolvedValue::Accessor(Accessor {
                node: NodeId::new("prd", "superset-rds"),
                attribute: "host".to_string(),
            }))
        );
    }

    #[test]
    fn test_literal_attribute_is_concrete() {
        let graph = graph(Backing::SelfHosted);
        let resolver = ReferenceResolver::new(&graph);
        let r = resolver
            .resolve(&DeferredReference::new("ss-db", "port"))
            .unwrap();
        assert_eq!(
            r,
            Resolution::Present(ResolvedValue::Literal(serde_json::json!(5432)))
        );
    }

    #[test]
    fn test_built_image_is_symbolic() {
        let graph = graph(Backing::SelfHosted);
        let resolver = ReferenceResolver::new(&graph);
        let r = resolver
            .resolve(&DeferredReference::new("superset-image", "image"))
            .unwrap();
        assert_eq!(
            r.into_value(),
            Some(ResolvedValue::Accessor(Accessor {
                node: NodeId::new("prd", "superset-image"),
                attribute: "image".to_string(),
            }))
        );
    }

    #[test]
    fn test_prebuilt_image_uses_name_and_tag() {
        let ws = Workspace::new("data")
            .with_group(
                ResourceGroup::new("images", Layer::Build).with_node(
                    ResourceNode::new("superset-image", NodeKind::ContainerImage)
                        .with_attribute("name", Attribute::literal("repo/superset"))
                        .with_attribute("build", Attribute::literal(false)),
                ),
            )
            .with_environment(Environment::new("prd"));
        let graph = GatedGraph::build(&ws, ws.environment("prd").unwrap()).unwrap();
        let resolver = ReferenceResolver::new(&graph);
        let r = resolver
            .resolve(&DeferredReference::new("superset-image", "image"))
            .unwrap();
        assert_eq!(
            r.into_value(),
            Some(ResolvedValue::Literal(serde_json::json!("repo/superset:prd")))
        );
    }

    #[test]
    fn test_validate_checks_every_source() {
        let graph = graph(Backing::SelfHosted);
        let resolver = ReferenceResolver::new(&graph);
        assert!(resolver.validate(graph.get("superset-ws").unwrap()).is_ok());

        // 先頭の参照先が有効でも後続の誤記は検出する
        let typo = GraphNode {
            node: ResourceNode::new("superset-ws", NodeKind::ClusterApplication).with_attribute(
                "db-host",
                Attribute::first_of(
                    vec![
                        DeferredReference::new("ss-db", "host"),
                        DeferredReference::new("rdss", "host"),
                    ],
                    true,
                ),
            ),
            ..graph.get("superset-ws").unwrap().clone()
        };
        match resolver.validate(&typo).unwrap_err() {
            StackError::UnknownNode {
                node,
                referenced_by,
            } => {
                assert_eq!(node, NodeId::new("prd", "rdss"));
                assert_eq!(referenced_by, "superset-ws");
            }
            other => panic!("Expected UnknownNode, got {other:?}"),
        }

        // 選ばれていない代替の属性名も検証する
        let typo = GraphNode {
            node: ResourceNode::new("superset-ws", NodeKind::ClusterApplication).with_attribute(
                "db-port",
                Attribute::first_of(vec![DeferredReference::new("superset-rds", "prot")], false),
            ),
            ..graph.get("superset-ws").unwrap().clone()
        };
        match resolver.validate(&typo).unwrap_err() {
            StackError::UnknownAttribute { node, attribute } => {
                assert_eq!(node, NodeId::new("prd", "superset-rds"));
                assert_eq!(attribute, "prot");
            }
            other => panic!("Expected UnknownAttribute, got {other:?}"),
        }
    }

    #[test]
    fn test_first_enabled_source_wins() {
        for (backing, expected) in [
            (Backing::SelfHosted, "ss-db"),
            (Backing::Managed, "superset-rds"),
        ] {
            let graph = graph(backing);
            let resolver = ReferenceResolver::new(&graph);
            let ws = graph.get("superset-ws").unwrap();
            let attrs = resolver.resolve_node(ws).unwrap();
            match &attrs["db-host"] {
                ResolvedValue::Accessor(a) => assert_eq!(a.node.name, expected),
                other => panic!("Expected accessor, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_optional_absent_attribute_is_omitted() {
        let graph = graph(Backing::Managed);
        let resolver = ReferenceResolver::new(&graph);
        let attrs = resolver
            .resolve_node(graph.get("superset-ws").unwrap())
            .unwrap();
        assert!(!attrs.contains_key("db-port"));
    }

    #[test]
    fn test_required_absent_attribute_fails_fast() {
        let graph = graph(Backing::SelfHosted);
        let resolver = ReferenceResolver::new(&graph);
        let err = resolver
            .resolve_attribute(
                "superset-ws",
                "cache-host",
                &Attribute::reference("superset-rds", "host"),
            )
            .unwrap_err();
        match &err {
            StackError::MissingDependency {
                consumer,
                attribute,
                sources,
            } => {
                assert_eq!(consumer, &NodeId::new("prd", "superset-ws"));
                assert_eq!(attribute, "cache-host");
                assert_eq!(sources, "prd/superset-rds.host");
            }
            other => panic!("Expected MissingDependency, got {other:?}"),
        }
        assert!(err.to_string().contains("prd/superset-rds"));
    }

    #[test]
    fn test_unknown_node_and_attribute() {
        let graph = graph(Backing::SelfHosted);
        let resolver = ReferenceResolver::new(&graph);

        let err = resolver
            .resolve(&DeferredReference::new("nope", "host"))
            .unwrap_err();
        assert!(matches!(err, StackError::UnknownNode { .. }));

        let err = resolver
            .resolve(&DeferredReference::new("ss-db", "password"))
            .unwrap_err();
        match err {
            StackError::UnknownAttribute { node, attribute } => {
                assert_eq!(node, NodeId::new("prd", "ss-db"));
                assert_eq!(attribute, "password");
            }
            other => panic!("Expected UnknownAttribute, got {other:?}"),
        }
    }

    #[test]
    fn test_circular_reference() {
        let ws = Workspace::new("data")
            .with_group(
                ResourceGroup::new("apps", Layer::Cluster)
                    .with_node(
                        ResourceNode::new("a", NodeKind::ClusterApplication)
                            .with_attribute("peer", Attribute::reference("b", "peer")),
                    )
                    .with_node(
                        ResourceNode::new("b", NodeKind::ClusterApplication)
                            .with_attribute("peer", Attribute::reference("a", "peer")),
                    ),
            )
            .with_environment(Environment::new("dev"));
        let graph = GatedGraph::build(&ws, ws.environment("dev").unwrap()).unwrap();
        let resolver = ReferenceResolver::new(&graph);

        let err = resolver
            .resolve(&DeferredReference::new("a", "peer"))
            .unwrap_err();
        match err {
            StackError::CircularReference(chain) => {
                assert_eq!(chain, "a.peer -> b.peer -> a.peer");
            }
            other => panic!("Expected CircularReference, got {other:?}"),
        }
    }

    #[test]
    fn test_reference_chain_resolves_transitively() {
        let ws = Workspace::new("data")
            .with_group(
                ResourceGroup::new("apps", Layer::Cluster)
                    .with_node(
                        ResourceNode::new("db", NodeKind::ClusterApplication)
                            .with_attribute("user", Attribute::literal("superset")),
                    )
                    .with_node(
                        ResourceNode::new("ws", NodeKind::ClusterApplication)
                            .with_attribute("db-user", Attribute::reference("db", "user")),
                    )
                    .with_node(
                        ResourceNode::new("worker", NodeKind::ClusterApplication)
                            .with_attribute("db-user", Attribute::reference("ws", "db-user")),
                    ),
            )
            .with_environment(Environment::new("dev"));
        let graph = GatedGraph::build(&ws, ws.environment("dev").unwrap()).unwrap();
        let resolver = ReferenceResolver::new(&graph);

        let r = resolver
            .resolve(&DeferredReference::new("worker", "db-user"))
            .unwrap();
        assert_eq!(
            r.into_value(),
            Some(ResolvedValue::Literal(serde_json::json!("superset")))
        );
    }
}
