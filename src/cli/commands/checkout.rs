//! checkout command - check out a commit or branch across the forest

use anyhow::Result;

use crate::engine::{derive_checkout_plan, execute_plan, Context};
use crate::ui::output::{self, Verbosity};

/// Derive a checkout plan from the arguments and execute it.
pub fn run(
    ctx: &Context,
    committish: Option<&str>,
    new_branch: Option<&str>,
    track: bool,
    force: bool,
) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let (meta, config) = super::open_meta(ctx)?;

    let plan = super::engine_result(derive_checkout_plan(
        meta.store(),
        committish,
        new_branch,
        track,
    ))?;
    if plan.is_noop() {
        output::print("nothing to do", verbosity);
        return Ok(());
    }

    let rt = tokio::runtime::Runtime::new()?;
    super::engine_result(rt.block_on(execute_plan(&meta, &plan, force, config.fetch())))?;

    if let Some(new_branch) = &plan.new_branch {
        match &new_branch.tracking {
            Some(tracking) => output::print(
                format!(
                    "created branch '{}' tracking '{}'",
                    new_branch.name,
                    tracking.upstream_shorthand()
                ),
                verbosity,
            ),
            None => output::print(format!("created branch '{}'", new_branch.name), verbosity),
        }
    }
    match (&plan.switch_branch, &plan.commit) {
        (Some(branch), _) => {
            output::print(format!("switched to branch '{}'", branch), verbosity)
        }
        (None, Some(commit)) => {
            output::print(format!("HEAD is now at {}", commit.short(12)), verbosity)
        }
        (None, None) => {}
    }
    Ok(())
}
