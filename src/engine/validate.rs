//! engine::validate
//!
//! Consistency pre-flight: dry-runs a prospective checkout across the meta
//! repository and every affected submodule without mutating anything, and
//! returns the full list of problems rather than stopping at the first.
//! An empty list means the real checkout is safe to execute.

use std::path::PathBuf;

use crate::core::types::{Oid, SubmoduleName};
use crate::git::{CheckoutStrategy, ObjectStore, StoreError};
use crate::meta::{commit_relation, MetaRepo, RepoStatus};

use super::{fanout, EngineError};

/// One submodule that a checkout would move.
#[derive(Debug, Clone)]
pub struct SubmoduleMove {
    /// The submodule's name.
    pub name: SubmoduleName,
    /// Absolute path of its working directory.
    pub path: PathBuf,
    /// Commit currently recorded for it in the meta HEAD tree, if any.
    pub recorded: Option<Oid>,
    /// Commit recorded for it at the checkout target.
    pub target: Oid,
}

/// Dry-run a checkout of `target` against the meta repository and each of
/// `moves`. Side-effect-free; collects every problem before returning.
pub async fn validate(
    meta: &MetaRepo,
    target: &Oid,
    moves: &[SubmoduleMove],
) -> Result<Vec<String>, EngineError> {
    let mut problems = Vec::new();

    // Trial checkout of the meta tree catches the tree-level conflicts the
    // later real checkout would hit.
    match meta.store().checkout_tree(target, CheckoutStrategy::Trial) {
        Ok(()) => {}
        Err(StoreError::CheckoutConflict { paths }) => problems.push(format!(
            "checking out {} would overwrite local changes: {}",
            target.short(12),
            paths.join(", ")
        )),
        Err(other) => return Err(other.into()),
    }

    let results = fanout::run_all(moves.to_vec(), validate_one).await;
    problems.extend(fanout::collect_problems(results)?);

    // Fan-out order is arbitrary; report deterministically
    problems.sort();
    Ok(problems)
}

/// Dry-run one submodule move: a trial tree checkout plus a status
/// comparison against the currently recorded commit.
fn validate_one(mv: SubmoduleMove) -> Result<Vec<String>, EngineError> {
    let store = ObjectStore::open(&mv.path)?;
    let mut problems = Vec::new();

    match store.checkout_tree(&mv.target, CheckoutStrategy::Trial) {
        Ok(()) => {}
        Err(StoreError::CheckoutConflict { paths }) => problems.push(format!(
            "submodule '{}' checkout would overwrite local changes: {}",
            mv.name,
            paths.join(", ")
        )),
        Err(other) => return Err(other.into()),
    }

    if let Some(recorded) = &mv.recorded {
        let status = RepoStatus::compute(&store, recorded)?;

        // Both sides moved away from the recorded commit: ambiguous,
        // cannot discard safely.
        if !status.index_relation.is_same() && !status.workdir_relation.is_same() {
            problems.push(format!(
                "submodule '{}' has new commits in index and HEAD",
                mv.name
            ));
        }

        // A HEAD that matches neither the recorded commit nor the new
        // target is a foreign commit this checkout would strand.
        if let Some(head) = &status.head {
            if *head != mv.target && !commit_relation(&store, head, recorded)?.is_same() {
                problems.push(format!("submodule '{}' has a new commit", mv.name));
            }
        }
    }

    Ok(problems)
}
