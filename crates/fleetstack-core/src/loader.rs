//! 統合ローダー
//!
//! ファイル発見、テンプレート展開、パースをまとめて行う。

use crate::discovery::{DiscoveredFiles, discover_files_with_env, find_project_root};
use crate::error::{Result, StackError};
use crate::model::Workspace;
use crate::parser::parse_kdl_string;
use crate::template::{TemplateProcessor, Variables, extract_variables_for_environment};
use std::path::Path;
use tracing::{debug, info, instrument};

/// カレントディレクトリからワークスペースをロード
#[instrument]
pub fn load_workspace(environment: Option<&str>) -> Result<Workspace> {
    let project_root = find_project_root()?;
    load_workspace_from_root_with_env(&project_root, environment)
}

/// 指定したルートからワークスペースをロード
pub fn load_workspace_from_root(project_root: &Path) -> Result<Workspace> {
    load_workspace_from_root_with_env(project_root, None)
}

/// 環境指定でワークスペースをロード
///
/// 読み込み順: stack.kdl → groups/**/*.kdl → stack.{env}.kdl → stack.local.kdl
#[instrument(skip(project_root), fields(project_root = %project_root.display()))]
pub fn load_workspace_from_root_with_env(
    project_root: &Path,
    environment: Option<&str>,
) -> Result<Workspace> {
    debug!("Step 1: Discovering files");
    let discovered = discover_files_with_env(project_root, environment)?;
    if discovered.root.is_none() {
        return Err(StackError::ProjectRootNotFound(project_root.to_path_buf()));
    }

    debug!("Step 2: Preparing template processor");
    let mut processor = prepare_template_processor(&discovered, project_root, environment)?;

    debug!("Step 3: Expanding templates");
    let mut expanded = String::new();
    for file in discovered.kdl_files() {
        debug!(file = %file.display(), "Rendering");
        expanded.push_str(&processor.render_file(file)?);
        expanded.push_str("\n\n");
    }
    info!(content_size = expanded.len(), "Template expansion complete");

    debug!("Step 4: Parsing KDL");
    let name = project_root
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unnamed")
        .to_string();
    let workspace = parse_kdl_string(&expanded, name)?;
    info!(
        workspace = %workspace.name,
        environments = workspace.environments.len(),
        groups = workspace.groups.len(),
        gates = workspace.gates.len(),
        "Workspace loaded"
    );

    Ok(workspace)
}

/// 変数を集めてテンプレートプロセッサを準備
///
/// 後から追加したものが優先される:
/// .env → .env.{env} → 環境変数 → variables ブロック
fn prepare_template_processor(
    discovered: &DiscoveredFiles,
    project_root: &Path,
    environment: Option<&str>,
) -> Result<TemplateProcessor> {
    let mut processor = TemplateProcessor::new();
    processor.add_variable(
        "WORKSPACE_ROOT",
        serde_json::Value::String(project_root.to_string_lossy().to_string()),
    );
    processor.add_variable(
        "ENV",
        serde_json::Value::String(environment.unwrap_or_default().to_string()),
    );

    if let Some(env_file) = &discovered.env_file {
        processor.add_env_file_variables(env_file)?;
    }
    if let Some(env_file) = &discovered.environment_env_file {
        processor.add_env_file_variables(env_file)?;
    }
    processor.add_env_variables();

    let mut variables = Variables::new();
    for file in discovered.kdl_files() {
        let content = std::fs::read_to_string(file).map_err(|e| StackError::IoError {
            path: file.to_path_buf(),
            message: e.to_string(),
        })?;
        variables.extend(extract_variables_for_environment(&content, environment)?);
    }
    debug!(vars = ?variables, "Adding collected variables");
    processor.add_variables(variables);

    Ok(processor)
}
