//! リソースノード定義

use super::group::Layer;
use super::reference::{DeferredReference, SecretSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// 環境で名前空間化されたノードID
///
/// 表示形式は `{environment}/{name}`。異なる環境のノードが同じIDを共有することはない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId {
    pub environment: String,
    pub name: String,
}

impl NodeId {
    pub fn new(environment: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.environment, self.name)
    }
}

/// ノード種別
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Volume,
    ManagedDatabase,
    ManagedCache,
    ContainerImage,
    ClusterApplication,
}

impl NodeKind {
    /// KDLのノード名からパース
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "volume" => Some(Self::Volume),
            "managed-database" | "managed_database" | "database" => Some(Self::ManagedDatabase),
            "managed-cache" | "managed_cache" | "cache" => Some(Self::ManagedCache),
            "image" | "container-image" => Some(Self::ContainerImage),
            "app" | "application" | "cluster-app" => Some(Self::ClusterApplication),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Volume => "volume",
            Self::ManagedDatabase => "managed-database",
            Self::ManagedCache => "managed-cache",
            Self::ContainerImage => "image",
            Self::ClusterApplication => "app",
        }
    }

    /// 適用時にのみ確定する属性
    ///
    /// これらを参照するとシンボリックなアクセサが返る。
    pub fn runtime_attributes(&self) -> &'static [&'static str] {
        match self {
            Self::Volume => &["volume-id"],
            Self::ManagedDatabase => &["host", "port", "endpoint"],
            Self::ManagedCache => &["host", "port"],
            Self::ContainerImage => &["image"],
            Self::ClusterApplication => &["host", "port"],
        }
    }

    pub fn exports(&self, attribute: &str) -> bool {
        self.runtime_attributes().contains(&attribute)
    }

    /// この種別を置けるレイヤー
    pub fn layer(&self) -> Layer {
        match self {
            Self::ContainerImage => Layer::Build,
            Self::Volume | Self::ManagedDatabase | Self::ManagedCache => Layer::Cloud,
            Self::ClusterApplication => Layer::Cluster,
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// 属性値
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Attribute {
    /// リテラル値
    Literal(serde_json::Value),
    /// 遅延参照。先頭から順に評価し、最初に Absent でない値を採用する
    Reference {
        sources: Vec<DeferredReference>,
        required: bool,
    },
    /// シークレットプロバイダーから読み込む値
    Secret(SecretSource),
}

impl Attribute {
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        Self::Literal(value.into())
    }

    /// 必須の単一参照
    pub fn reference(node: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::Reference {
            sources: vec![DeferredReference::new(node, attribute)],
            required: true,
        }
    }

    /// 最初に有効なものを採用する参照
    pub fn first_of(sources: Vec<DeferredReference>, required: bool) -> Self {
        Self::Reference { sources, required }
    }

    pub fn as_literal(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Literal(v) => Some(v),
            _ => None,
        }
    }
}

/// リソースノード
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceNode {
    /// 環境内で一意なID
    pub id: String,
    pub kind: NodeKind,
    /// 宣言上の有効フラグ（ゲート・グループの判定前）
    pub enabled: bool,
    /// `down` 時に削除しない
    #[serde(default)]
    pub skip_delete: bool,
    #[serde(default)]
    pub attributes: BTreeMap<String, Attribute>,
    /// 一度きりのマイグレーショントグル
    ///
    /// 初回適用に成功したら運用者が false に戻す。コアはこの値を変更しない。
    #[serde(default)]
    pub one_shot: BTreeMap<String, bool>,
}

impl ResourceNode {
    pub fn new(id: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            kind,
            enabled: true,
            skip_delete: false,
            attributes: BTreeMap::new(),
            one_shot: BTreeMap::new(),
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Attribute) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub fn with_one_shot(mut self, flag: impl Into<String>, value: bool) -> Self {
        self.one_shot.insert(flag.into(), value);
        self
    }

    pub fn literal(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key).and_then(Attribute::as_literal)
    }

    /// 全ての遅延参照を (属性名, 参照) で列挙
    pub fn references(&self) -> impl Iterator<Item = (&str, &DeferredReference)> {
        self.attributes.iter().flat_map(|(key, attr)| {
            let sources: &[DeferredReference] = match attr {
                Attribute::Reference { sources, .. } => sources,
                _ => &[],
            };
            sources.iter().map(move |r| (key.as_str(), r))
        })
    }
}
