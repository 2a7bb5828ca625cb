//! リソースグループ定義

use super::node::ResourceNode;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 適用レイヤー（適用順に並ぶ）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Layer {
    /// コンテナイメージのビルド・プッシュ
    Build,
    /// クラウドリソース（ボリューム、マネージドDB/キャッシュ）
    Cloud,
    /// クラスタにデプロイするアプリケーション
    Cluster,
}

impl Layer {
    pub const ALL: [Layer; 3] = [Layer::Build, Layer::Cloud, Layer::Cluster];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "build" | "image" | "build-image" => Some(Self::Build),
            "cloud" | "cloud-resource" => Some(Self::Cloud),
            "cluster" | "cluster-app" | "k8s" => Some(Self::Cluster),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Cloud => "cloud",
            Self::Cluster => "cluster",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// リソースグループ
///
/// ノードは宣言順に適用される。依存先を先に並べるのは宣言する側の責任で、
/// トポロジカルソートによる並べ替えは行わない。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceGroup {
    pub name: String,
    pub layer: Layer,
    /// 環境レベルのコンポーネントフラグ名
    #[serde(default)]
    pub component: Option<String>,
    /// 宣言上の有効フラグ
    pub enabled: bool,
    pub nodes: Vec<ResourceNode>,
}

impl ResourceGroup {
    pub fn new(name: impl Into<String>, layer: Layer) -> Self {
        Self {
            name: name.into(),
            layer,
            component: None,
            enabled: true,
            nodes: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_node(mut self, node: ResourceNode) -> Self {
        self.nodes.push(node);
        self
    }
}
