use crate::Context;
use crate::utils;
use colored::Colorize;
use fleetstack_cloud::{Applier, DryRunBackend, RuntimeState};
use std::sync::Arc;

pub async fn handle(
    ctx: &Context,
    environment: Option<String>,
    strict: bool,
    check_secrets: bool,
) -> anyhow::Result<()> {
    println!("{}", "環境を起動中...".green());
    let (workspace, environment) = utils::load_for_environment(ctx, environment)?;
    utils::print_loaded_files(&ctx.project_root, &environment);

    let strict = utils::strict_ordering(strict, ctx, &workspace);
    let plan = utils::compose(&workspace, &environment, strict)?;
    println!("環境: {}", environment.cyan());
    println!("計画: {}", plan.summary());
    println!();

    let mut backend = DryRunBackend::new();
    if check_secrets || ctx.user_config.check_secrets {
        backend = backend.with_secrets_root(&ctx.project_root);
    }
    let applier = Applier::with_backend(Arc::new(backend));
    let mut state = RuntimeState::new();
    let result = applier.up(&plan, &mut state).await;
    utils::print_apply_result(&result);

    if !result.is_success() {
        return Err(anyhow::anyhow!(
            "環境 '{}' の起動に失敗しました",
            environment
        ));
    }

    let pending = plan.pending_one_shots();
    if !pending.is_empty() {
        println!();
        println!(
            "{}",
            "⚠ 一度きりのフラグが true のままです。次回の up の前に false に戻してください:"
                .yellow()
        );
        for one_shot in &pending {
            println!("  • {} once {}", one_shot.node, one_shot.flag.yellow());
        }
    }

    println!();
    println!("{}", "✓ 起動完了".green().bold());
    Ok(())
}
