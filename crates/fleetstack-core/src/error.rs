use crate::model::{Backing, NodeId};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("KDLパースエラー: {0}")]
    KdlParse(#[from] kdl::KdlError),

    #[error("ファイル読み込みエラー: {0}")]
    Io(#[from] std::io::Error),

    #[error("IO エラー: {path}\n理由: {message}")]
    IoError { path: PathBuf, message: String },

    #[error("無効な設定: {0}")]
    InvalidConfig(String),

    #[error("テンプレートエラー: {file}\n理由: {message}")]
    TemplateError { file: PathBuf, message: String },

    #[error("テンプレート展開エラー: {0}")]
    TemplateRenderError(String),

    #[error("ファイル発見エラー: {path}\n理由: {message}")]
    DiscoveryError { path: PathBuf, message: String },

    #[error(
        "ワークスペースルートが見つかりません\n探索開始位置: {0}\nヒント: stack.kdl ファイルを含むディレクトリで実行してください"
    )]
    ProjectRootNotFound(PathBuf),

    #[error("環境が見つかりません: {name}（利用可能: {available}）")]
    EnvironmentNotFound { name: String, available: String },

    #[error("ロール '{role}' で backing '{backing}' に一致する候補が {count} 個あります")]
    AmbiguousGate {
        role: String,
        backing: Backing,
        count: usize,
    },

    #[error("ロール '{role}' で backing '{backing}' に一致する候補がありません")]
    NoMatch { role: String, backing: Backing },

    #[error(
        "{consumer} の属性 '{attribute}' が解決できません: 参照先 {sources} は無効化されています"
    )]
    MissingDependency {
        consumer: NodeId,
        attribute: String,
        sources: String,
    },

    #[error("ノードIDが重複しています: {0}")]
    DuplicateIdentifier(NodeId),

    #[error("順序違反: {consumer} の属性 '{attribute}' が {target} を参照しています（{reason}）")]
    OrderingViolation {
        consumer: NodeId,
        attribute: String,
        target: NodeId,
        reason: String,
    },

    #[error("ノード {node} が複数のゲートに属しています: '{first}' と '{second}'")]
    ConflictingGate {
        node: NodeId,
        first: String,
        second: String,
    },

    #[error("ノードが見つかりません: {node}（参照元: {referenced_by}）")]
    UnknownNode { node: NodeId, referenced_by: String },

    #[error("ノード {node} に属性 '{attribute}' がありません")]
    UnknownAttribute { node: NodeId, attribute: String },

    #[error("循環参照が検出されました: {0}")]
    CircularReference(String),
}

pub type Result<T> = std::result::Result<T, StackError>;
