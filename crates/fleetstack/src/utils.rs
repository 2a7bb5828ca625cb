use crate::Context;
use colored::Colorize;
use fleetstack_cloud::ApplyResult;
use fleetstack_core::{
    EnvironmentComposition, EnvironmentPlan, Layer, Workspace, discover_files_with_env,
    load_workspace_from_root_with_env,
};
use std::path::Path;

/// 環境名を決めてワークスペースをロードする
///
/// 優先順: CLI指定 → ユーザー設定の default_environment → 唯一の環境
pub fn load_for_environment(
    ctx: &Context,
    requested: Option<String>,
) -> anyhow::Result<(Workspace, String)> {
    let requested = ctx.user_config.environment(requested.as_deref());
    let workspace = load_workspace_from_root_with_env(&ctx.project_root, requested.as_deref())?;

    match requested {
        Some(name) => {
            workspace.environment(&name)?;
            Ok((workspace, name))
        }
        None => {
            let name = determine_environment(&workspace)?;
            // stack.{env}.kdl と .env.{env} を含めて読み直す
            let workspace = load_workspace_from_root_with_env(&ctx.project_root, Some(&name))?;
            Ok((workspace, name))
        }
    }
}

/// 環境が一つだけならそれを使う
pub fn determine_environment(workspace: &Workspace) -> anyhow::Result<String> {
    let names = workspace.environment_names();
    match names.as_slice() {
        [only] => Ok(only.to_string()),
        [] => Err(anyhow::anyhow!(
            "環境が定義されていません: stack.kdl に environment ブロックを追加してください"
        )),
        _ => Err(anyhow::anyhow!(
            "環境名を指定してください: stack <command> <env> または STACK_ENV=<env>\n利用可能な環境: {}",
            names.join(", ")
        )),
    }
}

/// strict-ordering の決定（CLI → ユーザー設定 → settings）
pub fn strict_ordering(cli: bool, ctx: &Context, workspace: &Workspace) -> bool {
    cli || ctx
        .user_config
        .strict_ordering
        .unwrap_or(workspace.settings.strict_ordering)
}

pub fn compose(
    workspace: &Workspace,
    environment: &str,
    strict: bool,
) -> anyhow::Result<EnvironmentPlan> {
    let plan = EnvironmentComposition::new(workspace, environment)?
        .strict_ordering(strict)
        .compose()?;
    Ok(plan)
}

/// 読み込んだ宣言ファイルを表示
pub fn print_loaded_files(project_root: &Path, environment: &str) {
    println!("📄 読み込んだ宣言ファイル:");
    if let Ok(discovered) = discover_files_with_env(project_root, Some(environment)) {
        for file in discovered.kdl_files() {
            let shown = file.strip_prefix(project_root).unwrap_or(file);
            println!("  • {}", shown.display().to_string().cyan());
        }
    }
}

/// 計画をレイヤーごとに表示
pub fn print_plan(plan: &EnvironmentPlan) {
    println!(
        "環境: {} (key: {})",
        plan.environment.cyan(),
        plan.key.cyan()
    );

    for layer in Layer::ALL {
        let groups = plan.layer(layer);
        if groups.is_empty() {
            continue;
        }
        println!();
        println!("{}", format!("[{}]", layer).bold());
        for group in groups {
            println!("  {} {}", "group".dimmed(), group.name.bold());
            for node in &group.nodes {
                println!(
                    "    • {} ({}) → {}",
                    node.id.to_string().cyan(),
                    node.kind,
                    node.physical_name
                );
                for (key, value) in &node.attributes {
                    println!("        {} = {}", key, value);
                }
                for (flag, on) in &node.one_shot {
                    println!("        once {} = {}", flag, on);
                }
            }
        }
    }

    if !plan.skipped.is_empty() {
        println!();
        println!("{}", "除外されたノード:".yellow());
        for skipped in &plan.skipped {
            println!(
                "  - {} ({}, group {}): {}",
                skipped.id, skipped.kind, skipped.group, skipped.reason
            );
        }
    }

    println!();
    println!("{}", plan.summary());
}

/// 実行したアクションを順に表示
pub fn print_apply_result(result: &ApplyResult) {
    for action in &result.succeeded {
        println!(
            "  {} {:<7} {:<7} {} {}",
            "✓".green(),
            action.layer.as_str(),
            action.action_type.to_string(),
            action.node,
            action.message.dimmed()
        );
    }
    for action in &result.failed {
        println!(
            "  {} {:<7} {:<7} {} {}",
            "✗".red(),
            action.layer.as_str(),
            action.action_type.to_string(),
            action.node,
            action.error.as_deref().unwrap_or_default().red()
        );
    }
    println!();
    println!("{} ({} ms)", result.summary(), result.duration_ms);
}
