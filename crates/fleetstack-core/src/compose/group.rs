//! グループ単位の有効判定

use super::graph::{GatedGraph, GraphNode};

/// グループフラグとノードフラグの論理積
///
/// グループの無効化は絶対で、ノード側のフラグでは覆せない。
pub fn effective_enabled(group_enabled: bool, node_enabled: bool) -> bool {
    group_enabled && node_enabled
}

/// グループ内で実際に適用されるノードを宣言順に返す
pub fn effective_members(graph: &GatedGraph, group: usize) -> Vec<&GraphNode> {
    let group_enabled = graph.group(group).enabled;
    graph
        .nodes()
        .filter(|n| n.group == group)
        .filter(|n| effective_enabled(group_enabled, n.enabled))
        .collect()
}
