use crate::Context;
use crate::utils;
use colored::Colorize;
use fleetstack_cloud::{Applier, DryRunBackend, RuntimeState};
use std::sync::Arc;

pub async fn handle(ctx: &Context, environment: Option<String>) -> anyhow::Result<()> {
    println!("{}", "環境を削除中...".yellow());
    let (workspace, environment) = utils::load_for_environment(ctx, environment)?;
    utils::print_loaded_files(&ctx.project_root, &environment);

    let strict = utils::strict_ordering(false, ctx, &workspace);
    let plan = utils::compose(&workspace, &environment, strict)?;
    println!("環境: {}", environment.cyan());
    println!();

    let applier = Applier::with_backend(Arc::new(DryRunBackend::new()));
    let mut state = RuntimeState::new();
    let result = applier.down(&plan, &mut state).await;
    utils::print_apply_result(&result);

    if !result.is_success() {
        return Err(anyhow::anyhow!(
            "環境 '{}' の削除に失敗しました",
            environment
        ));
    }

    println!();
    println!("{}", "✓ 削除完了".green().bold());
    Ok(())
}
