use crate::Context;
use crate::utils;

pub fn handle(
    ctx: &Context,
    environment: Option<String>,
    json: bool,
    strict: bool,
) -> anyhow::Result<()> {
    let (workspace, environment) = utils::load_for_environment(ctx, environment)?;
    let strict = utils::strict_ordering(strict, ctx, &workspace);
    let plan = utils::compose(&workspace, &environment, strict)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
    } else {
        utils::print_loaded_files(&ctx.project_root, &environment);
        println!();
        utils::print_plan(&plan);
    }
    Ok(())
}
