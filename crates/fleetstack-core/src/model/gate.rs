//! 条件ゲート定義

use serde::{Deserialize, Serialize};
use std::fmt;

/// バッキングモード
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Backing {
    /// マネージドサービス（RDS, ElastiCache など）
    Managed,
    /// クラスタ内で自前運用（デフォルト）
    #[default]
    SelfHosted,
}

impl Backing {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "managed" => Some(Self::Managed),
            "self-hosted" | "self_hosted" | "selfhosted" | "in-cluster" => Some(Self::SelfHosted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Managed => "managed",
            Self::SelfHosted => "self-hosted",
        }
    }

    /// bool トグル（例: use_rds）から変換
    pub fn from_managed_flag(use_managed: bool) -> Self {
        if use_managed {
            Self::Managed
        } else {
            Self::SelfHosted
        }
    }
}

impl fmt::Display for Backing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// ゲートの選択肢
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternative {
    pub backing: Backing,
    /// この選択肢が選ばれたときに有効になるノード
    pub nodes: Vec<String>,
}

impl Alternative {
    pub fn new(backing: Backing, nodes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            backing,
            nodes: nodes.into_iter().map(Into::into).collect(),
        }
    }
}

/// 同じ役割を持つ相互排他なノード群
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalGate {
    /// 役割（例: "superset-db"）
    pub role: String,
    /// 環境レベルのコンポーネントフラグ名
    #[serde(default)]
    pub component: Option<String>,
    pub alternatives: Vec<Alternative>,
}

impl ConditionalGate {
    pub fn new(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            component: None,
            alternatives: Vec::new(),
        }
    }

    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    pub fn with_alternative(mut self, alternative: Alternative) -> Self {
        self.alternatives.push(alternative);
        self
    }
}
