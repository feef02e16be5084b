//! engine::reset
//!
//! The reset engine: soft/mixed/hard resets of the meta repository with
//! hard-reset propagation into open submodules, and index-only path-scoped
//! resets that cross submodule boundaries.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::core::paths::{classify, repo_relative, PathTarget};
use crate::core::types::{Oid, SubmoduleName};
use crate::git::{CheckoutStrategy, IndexUpdate, ObjectStore, ResetKind, GITLINK_MODE};
use crate::meta::MetaRepo;

use super::{fanout, EngineError, UserError};

/// Reset the meta repository to `commit`.
///
/// The branch ref (or detached HEAD) always moves. `Soft` stops there;
/// `Mixed` also replaces the index; `Hard` also replaces the working tree
/// and then force-checkouts every open submodule whose recorded commit
/// changed, discarding local submodule changes without a dry run. Closed
/// submodules are never touched, and `Soft`/`Mixed` never touch any
/// submodule at all: gitlink state lives entirely in the meta tree/index.
pub async fn reset(meta: &MetaRepo, commit: &Oid, kind: ResetKind) -> Result<(), EngineError> {
    tracing::debug!(commit = %commit.short(12), ?kind, "reset");

    if !matches!(kind, ResetKind::Hard) {
        meta.store().reset(commit, kind)?;
        return Ok(());
    }

    let open = meta.open_submodules()?;
    {
        let _shield = meta.shield_submodules(&open)?;
        meta.store().reset(commit, ResetKind::Hard)?;
    }

    let links = meta.store().gitlink_entries(commit)?;
    let mut moves: Vec<(PathBuf, Oid)> = Vec::new();
    for name in open {
        let Some(target) = links.get(&name) else {
            continue;
        };
        let sub = meta.open_submodule_store(&name)?;
        if sub.try_head_commit()?.as_ref() == Some(target) {
            continue;
        }
        moves.push((meta.submodule_workdir(&name), target.clone()));
    }

    let results = fanout::run_all(moves, |(path, target): (PathBuf, Oid)| {
        let store = ObjectStore::open(&path)?;
        store.checkout_tree(&target, CheckoutStrategy::Force)?;
        store.detach_head(&target)?;
        Ok(())
    })
    .await;
    fanout::collect_results(results)?;
    Ok(())
}

/// Planned index mutations for one repository.
#[derive(Debug)]
struct RepoResetPlan {
    store: ObjectStore,
    /// Commit the paths reset against (submodules use their own HEAD).
    commit: Oid,
    /// Replace the whole index with the commit's tree first.
    full: bool,
    updates: Vec<IndexUpdate>,
}

/// Index-only, path-scoped reset.
///
/// Paths are resolved relative to `cwd` and classified as meta-level or
/// inside an open submodule. Meta paths restage the entry from `commit`'s
/// tree; submodule paths recurse against the **submodule's own** current
/// HEAD with the path made submodule-relative. Working trees are never
/// touched.
///
/// The whole call validates before the first index write: an unresolvable
/// path, or a staged submodule pointer that disagrees with that
/// submodule's checked-out commit, fails everything with the index
/// unchanged.
pub fn reset_paths(
    meta: &MetaRepo,
    cwd: &Path,
    commit: &Oid,
    paths: &[PathBuf],
) -> Result<(), EngineError> {
    let open = meta.open_submodules()?;

    let mut meta_updates: Vec<IndexUpdate> = Vec::new();
    let mut sub_plans: BTreeMap<SubmoduleName, RepoResetPlan> = BTreeMap::new();
    let mut refused: BTreeSet<SubmoduleName> = BTreeSet::new();
    let mut problems: Vec<String> = Vec::new();

    for path in paths {
        let rel = repo_relative(meta.workdir(), cwd, path)?;
        match classify(&rel, &open) {
            PathTarget::Meta(rel) => match plan_entry(meta.store(), commit, &rel)? {
                Some(update) => meta_updates.push(update),
                None => problems.push(format!(
                    "pathspec '{}' did not match any file at {}",
                    rel.display(),
                    commit.short(12)
                )),
            },
            PathTarget::Submodule { name, rest } => {
                if refused.contains(&name) {
                    continue;
                }
                if !sub_plans.contains_key(&name) {
                    let store = meta.open_submodule_store(&name)?;
                    let head = store.head_commit()?;

                    // A staged pointer that disagrees with the checked-out
                    // commit would be silently invalidated by resetting
                    // content against HEAD; refuse the whole call.
                    if let Some((staged, mode)) = meta.store().staged_entry(name.as_rel_path())? {
                        if mode == GITLINK_MODE && staged != head {
                            problems.push(format!(
                                "submodule '{}' has a staged commit {} that does not match its checked out commit {}",
                                name,
                                staged.short(12),
                                head.short(12)
                            ));
                            refused.insert(name);
                            continue;
                        }
                    }

                    sub_plans.insert(
                        name.clone(),
                        RepoResetPlan {
                            store,
                            commit: head,
                            full: false,
                            updates: Vec::new(),
                        },
                    );
                }
                let plan = match sub_plans.get_mut(&name) {
                    Some(plan) => plan,
                    None => continue,
                };

                if rest.as_os_str().is_empty() {
                    // The mount path itself: restore the submodule's whole
                    // index at its own checked-out commit. The meta-level
                    // gitlink is not touched.
                    plan.full = true;
                } else {
                    match plan_entry(&plan.store, &plan.commit, &rest)? {
                        Some(update) => plan.updates.push(update),
                        None => problems.push(format!(
                            "pathspec '{}' did not match any file in submodule '{}'",
                            rest.display(),
                            name
                        )),
                    }
                }
            }
        }
    }

    if !problems.is_empty() {
        return Err(UserError::from_problems(problems).into());
    }

    // All paths validated; apply, meta first.
    if !meta_updates.is_empty() {
        meta.store().apply_index_updates(&meta_updates)?;
    }
    for (_, plan) in sub_plans {
        if plan.full {
            plan.store.read_index_from_commit(&plan.commit)?;
        }
        if !plan.updates.is_empty() {
            plan.store.apply_index_updates(&plan.updates)?;
        }
    }
    Ok(())
}

/// Plan one staged-entry restoration: stage the entry from the commit's
/// tree, or unstage when the commit has no such path but the index does.
/// `None` means the path matches nothing anywhere.
fn plan_entry(
    store: &ObjectStore,
    commit: &Oid,
    rel: &Path,
) -> Result<Option<IndexUpdate>, EngineError> {
    match store.tree_entry_at(commit, rel)? {
        Some((id, mode)) => Ok(Some(IndexUpdate::Set {
            path: rel.to_path_buf(),
            id,
            mode,
        })),
        None => {
            if store.staged_entry(rel)?.is_some() {
                Ok(Some(IndexUpdate::Remove {
                    path: rel.to_path_buf(),
                }))
            } else {
                Ok(None)
            }
        }
    }
}
