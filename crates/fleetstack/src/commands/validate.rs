use crate::Context;
use crate::utils;
use colored::Colorize;
use fleetstack_core::load_workspace_from_root_with_env;

pub fn handle(ctx: &Context, environment: Option<String>) -> anyhow::Result<()> {
    println!("{}", "宣言を検証中...".blue());
    println!(
        "プロジェクトルート: {}",
        ctx.project_root.display().to_string().cyan()
    );

    let environments = match ctx.user_config.environment(environment.as_deref()) {
        Some(name) => vec![name],
        None => {
            let workspace = load_workspace_from_root_with_env(&ctx.project_root, None)?;
            workspace
                .environment_names()
                .into_iter()
                .map(str::to_string)
                .collect()
        }
    };
    if environments.is_empty() {
        return Err(anyhow::anyhow!(
            "環境が定義されていません: stack.kdl に environment ブロックを追加してください"
        ));
    }

    for name in &environments {
        let result = utils::load_for_environment(ctx, Some(name.clone())).and_then(
            |(workspace, environment)| {
                let strict = utils::strict_ordering(false, ctx, &workspace);
                utils::compose(&workspace, &environment, strict)
            },
        );
        match result {
            Ok(plan) => println!("  {} {}: {}", "✓".green(), name.cyan(), plan.summary()),
            Err(e) => {
                eprintln!();
                eprintln!("{}", format!("✗ 環境 '{}' の構成エラー", name).red().bold());
                eprintln!("  {}", e);
                std::process::exit(1);
            }
        }
    }

    println!("{}", "✓ 宣言は正常です！".green().bold());
    Ok(())
}
