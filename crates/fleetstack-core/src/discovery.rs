//! ファイル自動発見
//!
//! 規約ベースのディレクトリ構造から宣言ファイルを集める。
//!
//! ```text
//! stack.kdl | .fleetstack/stack.kdl   ルート
//! groups/**/*.kdl                     追加のグループ・ゲート定義
//! stack.{env}.kdl                     環境別オーバーライド
//! stack.local.kdl                     ローカルオーバーライド
//! .env, .env.{env}                    テンプレート変数
//! ```

use crate::error::{Result, StackError};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// ルートディレクトリを上書きする環境変数
pub const PROJECT_ROOT_ENV: &str = "FLEETSTACK_PROJECT_ROOT";

const ROOT_FILE: &str = "stack.kdl";
const HIDDEN_DIR: &str = ".fleetstack";

/// 発見されたファイル群
#[derive(Debug, Clone, Default)]
pub struct DiscoveredFiles {
    pub root: Option<PathBuf>,
    /// groups/**/*.kdl（アルファベット順）
    pub groups: Vec<PathBuf>,
    pub environment_override: Option<PathBuf>,
    pub local_override: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
    pub environment_env_file: Option<PathBuf>,
}

impl DiscoveredFiles {
    /// 展開・パースする順に並べたKDLファイル
    pub fn kdl_files(&self) -> Vec<&Path> {
        self.root
            .iter()
            .chain(self.groups.iter())
            .chain(self.environment_override.iter())
            .chain(self.local_override.iter())
            .map(PathBuf::as_path)
            .collect()
    }
}

fn has_root_file(dir: &Path) -> Option<PathBuf> {
    [dir.join(ROOT_FILE), dir.join(HIDDEN_DIR).join(ROOT_FILE)]
        .into_iter()
        .find(|p| p.exists())
}

/// ワークスペースルートを検出
///
/// 1. 環境変数 `FLEETSTACK_PROJECT_ROOT`
/// 2. カレントディレクトリから上に向かって `stack.kdl` か `.fleetstack/stack.kdl` を探す
#[tracing::instrument]
pub fn find_project_root() -> Result<PathBuf> {
    if let Ok(root) = std::env::var(PROJECT_ROOT_ENV) {
        let path = PathBuf::from(&root);
        debug!(env_root = %root, "Checking {}", PROJECT_ROOT_ENV);
        if has_root_file(&path).is_some() {
            info!(project_root = %path.display(), "Found project root from environment variable");
            return Ok(path);
        }
        warn!(env_root = %root, "No stack.kdl under {}", PROJECT_ROOT_ENV);
    }

    let start_dir = std::env::current_dir()?;
    find_project_root_from(&start_dir)
}

/// 指定ディレクトリから上に向かってルートを探す
pub fn find_project_root_from(start_dir: &Path) -> Result<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        if let Some(file) = has_root_file(&current) {
            info!(project_root = %current.display(), file = %file.display(), "Found project root");
            return Ok(current);
        }
        if !current.pop() {
            break;
        }
    }

    warn!(start_dir = %start_dir.display(), "Project root not found");
    Err(StackError::ProjectRootNotFound(start_dir.to_path_buf()))
}

/// ルートからファイルを発見
pub fn discover_files(project_root: &Path) -> Result<DiscoveredFiles> {
    discover_files_with_env(project_root, None)
}

/// 環境指定でファイルを発見
///
/// 環境が指定されると `stack.{env}.kdl` と `.env.{env}` も対象になる。
#[tracing::instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn discover_files_with_env(
    project_root: &Path,
    environment: Option<&str>,
) -> Result<DiscoveredFiles> {
    let mut discovered = DiscoveredFiles {
        root: has_root_file(project_root),
        ..Default::default()
    };

    let groups_dir = project_root.join("groups");
    if groups_dir.is_dir() {
        discovered.groups = discover_kdl_files(&groups_dir)?;
        info!(group_files = discovered.groups.len(), "Discovered group files");
    }

    if let Some(env) = environment {
        discovered.environment_override = first_existing(project_root, &format!("stack.{env}.kdl"));
        discovered.environment_env_file = first_existing(project_root, &format!(".env.{env}"));
    }
    discovered.local_override = first_existing(project_root, "stack.local.kdl");
    discovered.env_file = first_existing(project_root, ".env");

    debug!(?discovered, "File discovery complete");
    Ok(discovered)
}

/// ルート直下、次に .fleetstack/ 下
fn first_existing(project_root: &Path, name: &str) -> Option<PathBuf> {
    [project_root.join(name), project_root.join(HIDDEN_DIR).join(name)]
        .into_iter()
        .find(|p| p.exists())
}

/// ディレクトリ配下の .kdl ファイルをアルファベット順で列挙
fn discover_kdl_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let pattern = dir.join("**").join("*.kdl");
    let pattern = pattern.to_string_lossy();
    let entries = glob::glob(&pattern).map_err(|e| StackError::DiscoveryError {
        path: dir.to_path_buf(),
        message: format!("パターンが不正です: {}", e),
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| StackError::DiscoveryError {
            path: dir.to_path_buf(),
            message: format!("ファイルの読み込みに失敗: {}", e),
        })?;
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    fn create_test_project(base: &Path) -> Result<()> {
        fs::write(base.join("stack.kdl"), "workspace \"data\"")?;
        fs::create_dir_all(base.join("groups/cluster"))?;
        fs::write(base.join("groups/superset.kdl"), "")?;
        fs::write(base.join("groups/airflow.kdl"), "")?;
        fs::write(base.join("groups/cluster/jupyter.kdl"), "")?;
        fs::write(base.join("groups/README.md"), "")?;
        fs::write(base.join("stack.prd.kdl"), "")?;
        fs::write(base.join("stack.local.kdl"), "")?;
        fs::write(base.join(".env"), "A=1")?;
        fs::write(base.join(".env.prd"), "A=2")?;
        Ok(())
    }

    #[test]
    fn test_discover_files() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        create_test_project(temp_dir.path())?;

        let discovered = discover_files(temp_dir.path())?;

        assert!(discovered.root.is_some());
        assert_eq!(discovered.groups.len(), 3);
        assert!(discovered.groups[0].ends_with("groups/airflow.kdl"));
        assert!(discovered.groups[1].ends_with("groups/cluster/jupyter.kdl"));
        assert!(discovered.groups[2].ends_with("groups/superset.kdl"));
        assert!(discovered.local_override.is_some());
        assert!(discovered.env_file.is_some());
        // 環境未指定なら環境別ファイルは対象外
        assert!(discovered.environment_override.is_none());
        assert!(discovered.environment_env_file.is_none());
        Ok(())
    }

    #[test]
    fn test_discover_files_with_env() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        create_test_project(temp_dir.path())?;

        let discovered = discover_files_with_env(temp_dir.path(), Some("prd"))?;
        assert!(
            discovered
                .environment_override
                .as_ref()
                .unwrap()
                .ends_with("stack.prd.kdl")
        );
        assert!(discovered.environment_env_file.is_some());

        let files = discovered.kdl_files();
        assert_eq!(files.len(), 6);
        assert!(files[0].ends_with("stack.kdl"));
        assert!(files[4].ends_with("stack.prd.kdl"));
        assert!(files[5].ends_with("stack.local.kdl"));
        Ok(())
    }

    #[test]
    fn test_discover_in_hidden_dir() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::create_dir_all(root.join(".fleetstack"))?;
        fs::write(root.join(".fleetstack/stack.kdl"), "")?;
        fs::write(root.join(".fleetstack/stack.local.kdl"), "")?;

        let discovered = discover_files(root)?;
        assert!(
            discovered
                .root
                .as_ref()
                .unwrap()
                .ends_with(".fleetstack/stack.kdl")
        );
        assert!(discovered.local_override.is_some());
        Ok(())
    }

    #[test]
    fn test_root_file_priority_over_hidden_dir() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("stack.kdl"), "")?;
        fs::create_dir_all(root.join(".fleetstack"))?;
        fs::write(root.join(".fleetstack/stack.kdl"), "")?;

        let discovered = discover_files(root)?;
        assert_eq!(discovered.root, Some(root.join("stack.kdl")));
        Ok(())
    }

    #[test]
    fn test_find_project_root_walks_up() -> Result<()> {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("stack.kdl"), "")?;
        let nested = root.join("groups/deep");
        fs::create_dir_all(&nested)?;

        assert_eq!(find_project_root_from(&nested)?, root);
        Ok(())
    }

    #[test]
    fn test_find_project_root_not_found() {
        let temp_dir = tempfile::tempdir().unwrap();
        let err = find_project_root_from(temp_dir.path()).unwrap_err();
        assert!(matches!(err, StackError::ProjectRootNotFound(_)));
    }

    #[test]
    #[serial]
    fn test_find_project_root_from_env() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("stack.kdl"), "").unwrap();

        temp_env::with_var(PROJECT_ROOT_ENV, Some(temp_dir.path()), || {
            assert_eq!(find_project_root().unwrap(), temp_dir.path());
        });
    }
}
