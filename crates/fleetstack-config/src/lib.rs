//! ユーザー設定
//!
//! `~/.config/fleetstack/config.yaml` に置く、ワークスペースをまたいだ既定値。
//!
//! ```yaml
//! default_environment: dev
//! strict_ordering: true
//! check_secrets: true
//! ```

pub mod error;

pub use error::*;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// 設定ファイルのパスを直接指定する環境変数
pub const CONFIG_PATH_ENV: &str = "FLEETSTACK_CONFIG_PATH";

const CONFIG_FILE: &str = "config.yaml";

/// ユーザー設定
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    /// `--env` 省略時の環境
    pub default_environment: Option<String>,
    /// ワークスペースの strict-ordering を上書き
    pub strict_ordering: Option<bool>,
    /// `up` の前にシークレットファイルを読めるか確認する
    pub check_secrets: bool,
}

impl UserConfig {
    /// 設定ファイルを探して読み込む（なければ既定値）
    pub fn load() -> Result<Self> {
        match find_user_config()? {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_yaml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!(path = %path.display(), ?config, "Loaded user config");
        Ok(config)
    }

    /// CLIの指定を優先して環境名を決める
    pub fn environment(&self, cli: Option<&str>) -> Option<String> {
        cli.map(str::to_string)
            .or_else(|| self.default_environment.clone())
    }
}

/// FleetStackの設定ディレクトリを取得
pub fn get_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or(ConfigError::ConfigDirNotFound)?
        .join("fleetstack");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
    }

    Ok(config_dir)
}

/// ユーザー設定ファイルを探す
///
/// 1. 環境変数 `FLEETSTACK_CONFIG_PATH`（存在しなければエラー）
/// 2. `~/.config/fleetstack/config.yaml`
pub fn find_user_config() -> Result<Option<PathBuf>> {
    if let Ok(config_path) = std::env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(config_path);
        if path.exists() {
            return Ok(Some(path));
        }
        return Err(ConfigError::ConfigFileNotFound(path));
    }

    Ok(dirs::config_dir()
        .map(|dir| dir.join("fleetstack").join(CONFIG_FILE))
        .filter(|path| path.exists()))
}
