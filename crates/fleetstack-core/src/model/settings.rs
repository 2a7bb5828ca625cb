//! ワークスペース設定

use serde::{Deserialize, Serialize};

/// ワークスペース全体の設定値
///
/// 環境ごとに異なる値は [`Environment`](super::Environment) 側に持つ。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// イメージリポジトリ（例: ghcr.io/owner）
    #[serde(default)]
    pub image_repo: Option<String>,
    #[serde(default = "default_true")]
    pub build_images: bool,
    #[serde(default)]
    pub push_images: bool,
    #[serde(default)]
    pub force_pull_images: bool,
    #[serde(default)]
    pub skip_image_cache: bool,
    #[serde(default = "default_true")]
    pub use_cache: bool,
    #[serde(default)]
    pub aws_region: Option<String>,
    #[serde(default)]
    pub aws_az1: Option<String>,
    /// git-sync で使うリポジトリ
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub branch: Option<String>,
    /// 宣言順に反する参照をエラーにする
    #[serde(default)]
    pub strict_ordering: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image_repo: None,
            build_images: true,
            push_images: false,
            force_pull_images: false,
            skip_image_cache: false,
            use_cache: true,
            aws_region: None,
            aws_az1: None,
            repo: None,
            branch: None,
            strict_ordering: false,
        }
    }
}
