use crate::Context;
use crate::utils;
use colored::Colorize;

pub fn handle(ctx: &Context, environment: Option<String>) -> anyhow::Result<()> {
    let (workspace, environment) = utils::load_for_environment(ctx, environment)?;
    let strict = utils::strict_ordering(false, ctx, &workspace);
    let plan = utils::compose(&workspace, &environment, strict)?;

    println!(
        "{:<8} {:<32} {:<17} {}",
        "LAYER".bold(),
        "NODE".bold(),
        "KIND".bold(),
        "PHYSICAL NAME".bold()
    );
    for group in fleetstack_core::Layer::ALL
        .into_iter()
        .flat_map(|layer| plan.layer(layer).iter())
    {
        for node in &group.nodes {
            println!(
                "{:<8} {:<32} {:<17} {}",
                group.layer.as_str(),
                node.id.to_string(),
                node.kind.keyword(),
                node.physical_name
            );
        }
    }

    for skipped in &plan.skipped {
        println!(
            "{:<8} {:<32} {:<17} {}",
            "-",
            skipped.id.to_string(),
            skipped.kind.keyword(),
            format!("({})", skipped.reason).dimmed()
        );
    }
    Ok(())
}
