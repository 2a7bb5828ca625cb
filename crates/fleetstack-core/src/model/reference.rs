//! 遅延参照と解決結果

use super::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// 他ノードの属性への遅延参照 (`node.attribute`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeferredReference {
    pub node: String,
    pub attribute: String,
}

impl DeferredReference {
    pub fn new(node: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            attribute: attribute.into(),
        }
    }

    /// `node.attribute` 形式をパース
    ///
    /// ノードIDにドットを含められるよう、最後のドットで分割する。
    pub fn parse(s: &str) -> Option<Self> {
        let (node, attribute) = s.rsplit_once('.')?;
        if node.is_empty() || attribute.is_empty() {
            return None;
        }
        Some(Self::new(node, attribute))
    }
}

impl fmt::Display for DeferredReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.attribute)
    }
}

/// シークレットの参照元
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SecretSource {
    pub file: PathBuf,
    /// 省略時はファイル全体をマッピングとして扱う
    #[serde(default)]
    pub key: Option<String>,
}

impl SecretSource {
    /// `path` または `path#key` をパース
    pub fn parse(s: &str) -> Self {
        match s.split_once('#') {
            Some((file, key)) if !key.is_empty() => Self {
                file: PathBuf::from(file),
                key: Some(key.to_string()),
            },
            _ => Self {
                file: PathBuf::from(s.trim_end_matches('#')),
                key: None,
            },
        }
    }
}

impl fmt::Display for SecretSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}#{}", self.file.display(), key),
            None => write!(f, "{}", self.file.display()),
        }
    }
}

/// シンボリックなアクセサ
///
/// 「作成後のデータベースの host」のように、適用時に外部アプライヤーが実体化する。
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Accessor {
    pub node: NodeId,
    pub attribute: String,
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${{{}.{}}}", self.node, self.attribute)
    }
}

/// 解決済みの属性値
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolvedValue {
    Literal(serde_json::Value),
    Accessor(Accessor),
    Secret(SecretSource),
}

impl fmt::Display for ResolvedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(serde_json::Value::String(s)) => f.write_str(s),
            Self::Literal(v) => write!(f, "{}", v),
            Self::Accessor(a) => write!(f, "{}", a),
            Self::Secret(s) => write!(f, "secret:{}", s),
        }
    }
}

/// 参照の解決結果
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Present(ResolvedValue),
    /// 参照先ノードが無効
    Absent,
}

impl Resolution {
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    pub fn into_value(self) -> Option<ResolvedValue> {
        match self {
            Self::Present(v) => Some(v),
            Self::Absent => None,
        }
    }
}
