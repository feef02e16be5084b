//! cli::commands
//!
//! Command handlers. Each handler opens the meta repository, delegates to
//! the engine (owning a tokio runtime for the async entry points), and
//! formats the outcome for the user.

pub mod checkout;
pub mod cherry_pick;
pub mod completion;
pub mod reset;

use std::path::PathBuf;

use anyhow::{Context as _, Result};

use crate::cli::args::Command;
use crate::core::config::Config;
use crate::core::types::Oid;
use crate::engine::{Context, EngineError};
use crate::git::ObjectStore;
use crate::meta::MetaRepo;

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Checkout {
            committish,
            new_branch,
            track,
            force,
        } => checkout::run(ctx, committish.as_deref(), new_branch.as_deref(), track, force),
        Command::Reset {
            committish,
            soft,
            mixed: _,
            hard,
            paths,
        } => reset::run(ctx, &committish, soft, hard, &paths),
        Command::CherryPick { committish, json } => cherry_pick::run(ctx, &committish, json),
        Command::Completion { shell } => completion::run(shell),
    }
}

/// Working directory for the invocation.
pub(crate) fn invocation_cwd(ctx: &Context) -> Result<PathBuf> {
    match &ctx.cwd {
        Some(cwd) => Ok(cwd.clone()),
        None => std::env::current_dir().context("failed to determine working directory"),
    }
}

/// Open the meta repository and its configuration.
pub(crate) fn open_meta(ctx: &Context) -> Result<(MetaRepo, Config)> {
    let cwd = invocation_cwd(ctx)?;
    let probe = ObjectStore::discover(&cwd).context("failed to open repository")?;
    let config = Config::load(probe.git_dir()).context("failed to load configuration")?;
    let meta =
        MetaRepo::discover(&cwd, config.remote()).context("failed to open meta repository")?;
    Ok((meta, config))
}

/// Convert an engine result into an anyhow result, keeping [`crate::engine::UserError`]
/// downcastable so `main` can print it without chain noise.
pub(crate) fn engine_result<T>(result: std::result::Result<T, EngineError>) -> Result<T> {
    result.map_err(|err| match err {
        EngineError::User(user) => anyhow::Error::new(user),
        other => anyhow::Error::new(other),
    })
}

/// Resolve a committish that must name a commit.
pub(crate) fn resolve_target(store: &ObjectStore, spec: &str) -> std::result::Result<Oid, EngineError> {
    store
        .resolve_committish(spec)?
        .ok_or_else(|| EngineError::user(format!("could not resolve '{spec}' as a commit")))
}
