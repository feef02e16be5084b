//! reset command - soft/mixed/hard and path-scoped resets

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::engine::{reset, reset_paths, Context};
use crate::git::ResetKind;
use crate::ui::output::{self, Verbosity};

/// Run a reset. With paths the reset is index-only and path-scoped; the
/// soft/hard flags make no sense there and are rejected.
pub fn run(
    ctx: &Context,
    committish: &str,
    soft: bool,
    hard: bool,
    paths: &[PathBuf],
) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let (meta, _config) = super::open_meta(ctx)?;
    let commit = super::engine_result(super::resolve_target(meta.store(), committish))?;

    if !paths.is_empty() {
        if soft || hard {
            bail!("a path-scoped reset only updates the index; drop --soft/--hard");
        }
        let cwd = super::invocation_cwd(ctx)?;
        super::engine_result(reset_paths(&meta, &cwd, &commit, paths))?;
        output::print(
            format!("unstaged changes after reset to {}", commit.short(12)),
            verbosity,
        );
        return Ok(());
    }

    let kind = if soft {
        ResetKind::Soft
    } else if hard {
        ResetKind::Hard
    } else {
        ResetKind::Mixed
    };

    let rt = tokio::runtime::Runtime::new()?;
    super::engine_result(rt.block_on(reset(&meta, &commit, kind)))?;
    output::print(format!("HEAD is now at {}", commit.short(12)), verbosity);
    Ok(())
}
