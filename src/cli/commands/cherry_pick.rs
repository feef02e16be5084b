//! cherry-pick command - replay a commit across the forest

use anyhow::Result;

use crate::engine::{cherry_pick, Context};
use crate::ui::output::{self, Verbosity};

/// Replay one commit onto HEAD and report the created commits.
pub fn run(ctx: &Context, committish: &str, json: bool) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let (meta, _config) = super::open_meta(ctx)?;
    let commit = super::engine_result(super::resolve_target(meta.store(), committish))?;

    let picked = meta.store().commit_meta(&commit)?;

    let rt = tokio::runtime::Runtime::new()?;
    let result = super::engine_result(rt.block_on(cherry_pick(&meta, &commit)))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    output::print(
        format!(
            "picked '{}' as {}",
            picked.summary,
            result.new_commit.short(12)
        ),
        verbosity,
    );
    for (name, rewritten) in &result.submodule_commits {
        for (original, replayed) in rewritten {
            output::print(
                format!(
                    "  {}: {} -> {}",
                    name,
                    original.short(12),
                    replayed.short(12)
                ),
                verbosity,
            );
        }
    }
    Ok(())
}
