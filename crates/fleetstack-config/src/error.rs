use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("設定ディレクトリが見つかりません")]
    ConfigDirNotFound,

    #[error(
        "設定ファイルが見つかりません: {0}\n\
        FLEETSTACK_CONFIG_PATH の値を確認してください"
    )]
    ConfigFileNotFound(PathBuf),

    #[error("設定ファイルの形式が不正です: {path}\n理由: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("IO エラー: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
