//! engine::cherry_pick
//!
//! Replays one meta commit onto the current meta HEAD, recursively
//! cherry-picking into every submodule whose gitlink changed.
//!
//! The algorithm is strictly all-or-nothing: every conflict, at the meta
//! level or inside any submodule, is detected before a single ref moves,
//! so an aborted operation leaves no visible commit anywhere. Replayed
//! submodule commits are always freshly created objects, even when their
//! content matches an existing commit, so callers must use the returned
//! identity map rather than assuming shas survive across repositories.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::Serialize;

use crate::core::types::{Oid, SubmoduleName};
use crate::git::{CheckoutStrategy, GitlinkUpdate, MergeResolution, ObjectStore};
use crate::meta::MetaRepo;

use super::{fanout, EngineError, UserError};

/// Result of a cherry-pick: the new meta commit plus, per submodule that
/// actually received new commits, the original-to-replayed commit map.
#[derive(Debug, Clone, Serialize)]
pub struct CherrypickResult {
    /// The newly created meta commit.
    pub new_commit: Oid,
    /// Freshly created submodule commits, keyed by submodule name and
    /// then by the original commit id. Submodules replayed without new
    /// commits do not appear.
    pub submodule_commits: BTreeMap<SubmoduleName, BTreeMap<Oid, Oid>>,
}

/// What the pick does to one gitlink path.
#[derive(Debug, Clone)]
enum LinkAction {
    /// Already satisfied at HEAD; nothing to do.
    Skip,
    /// Remove the gitlink and close the submodule.
    Remove,
    /// Newly introduced: materialize at the recorded commit as-is.
    Adopt { target: Oid },
    /// Replay the commit range `(base, target]` onto the submodule HEAD.
    Replay { base: Oid, target: Oid },
}

#[derive(Debug, Clone)]
struct LinkPlan {
    name: SubmoduleName,
    action: LinkAction,
}

/// One submodule replay, shipped to a worker task.
#[derive(Debug, Clone)]
struct ReplayTask {
    name: SubmoduleName,
    path: PathBuf,
    base: Oid,
    target: Oid,
    url: Option<String>,
}

/// Outcome of one submodule replay.
#[derive(Debug)]
struct ReplayOutcome {
    name: SubmoduleName,
    path: PathBuf,
    final_target: Oid,
    rewritten: BTreeMap<Oid, Oid>,
}

/// Replay the change introduced by `commit` onto the current meta HEAD.
///
/// `commit` must have exactly one parent `P`; the diff `P -> commit` is
/// classified per path into content changes (merged three-way in memory)
/// and gitlink changes (handled per the rules on [`LinkAction`]). On
/// success the new meta commit reuses `commit`'s message and authorship,
/// HEAD advances to it, and every affected submodule ends checked out at
/// its replayed commit.
pub async fn cherry_pick(meta: &MetaRepo, commit: &Oid) -> Result<CherrypickResult, EngineError> {
    let parents = meta.store().commit_parents(commit)?;
    let parent = match parents.as_slice() {
        [parent] => parent.clone(),
        _ => {
            return Err(EngineError::user(format!(
                "cherry-pick requires a commit with exactly one parent, {} has {}",
                commit.short(12),
                parents.len()
            )))
        }
    };
    let head = meta.store().head_commit()?;

    // Phase 1: classify every gitlink change; collect all conflicts.
    let entries = meta.store().diff_entries(&parent, commit)?;
    let mut plans: Vec<LinkPlan> = Vec::new();
    let mut gitlink_paths: Vec<PathBuf> = Vec::new();
    let mut conflicts: Vec<String> = Vec::new();
    for entry in entries.iter().filter(|e| e.touches_gitlink()) {
        gitlink_paths.push(entry.path.clone());
        let name = SubmoduleName::new(entry.path.to_string_lossy().into_owned())
            .map_err(|e| EngineError::Internal(e.to_string()))?;

        // A path changing between gitlink and plain content cannot be
        // replayed structurally.
        if entry.old.as_ref().is_some_and(|s| !s.is_gitlink)
            || entry.new.as_ref().is_some_and(|s| !s.is_gitlink)
        {
            conflicts.push(format!(
                "path '{}' changes between a submodule and regular content",
                name
            ));
            continue;
        }

        let old = entry.old.as_ref().map(|s| s.id.clone());
        let new = entry.new.as_ref().map(|s| s.id.clone());
        let current = meta.store().gitlink_at(&head, &name)?;

        let action = match (old, new, current) {
            // Deleted by the pick, already absent at HEAD
            (_, None, None) => LinkAction::Skip,
            // Deleted by the pick, unchanged at HEAD
            (Some(base), None, Some(current)) if current == base => LinkAction::Remove,
            // Added or changed by the pick, already identical at HEAD
            (_, Some(target), Some(current)) if current == target => LinkAction::Skip,
            // Newly introduced, nothing at HEAD to conflict with
            (None, Some(target), None) => LinkAction::Adopt { target },
            // HEAD still sits at the pick's base: replay the range
            (Some(base), Some(target), Some(current)) if current == base => {
                LinkAction::Replay { base, target }
            }
            // Everything else: HEAD moved away from both sides
            _ => {
                conflicts.push(format!(
                    "submodule '{}' changed on both sides of the pick",
                    name
                ));
                continue;
            }
        };
        plans.push(LinkPlan { name, action });
    }
    if !conflicts.is_empty() {
        return Err(UserError::from_problems(conflicts).into());
    }

    // Phase 2: probe the content-level merge before touching anything.
    // Gitlink paths are resolved separately, so only content conflicts
    // can surface here.
    let probe: Vec<GitlinkUpdate> = gitlink_paths
        .iter()
        .map(|path| GitlinkUpdate {
            path: path.clone(),
            target: None,
        })
        .collect();
    if let MergeResolution::Conflicts(paths) = meta.store().replay_tree(&head, &parent, commit, &probe)? {
        return Err(UserError::from_problems(
            paths
                .into_iter()
                .map(|path| format!("the change to '{}' cannot be applied without conflicts", path))
                .collect(),
        )
        .into());
    }

    // Phase 3: materialize closed submodules, then replay ranges. Replays
    // only create objects; no HEAD moves until everything succeeded.
    // URL resolution follows the registry tracked at the picked commit,
    // which is the only place a newly introduced submodule is registered
    let registry = meta.registry_at(commit)?;
    let meta_url = meta.remote_url()?;
    let mut replays: Vec<ReplayTask> = Vec::new();
    for plan in &plans {
        match &plan.action {
            LinkAction::Adopt { target } => {
                let url = registry.resolved_url(&plan.name, meta_url.as_deref())?;
                meta.materialize_submodule(&plan.name, &url, target)?;
            }
            LinkAction::Replay { base, target } => {
                let url = registry
                    .resolved_url(&plan.name, meta_url.as_deref())
                    .ok();
                if !meta.is_open(&plan.name) {
                    let url = url.clone().ok_or_else(|| {
                        EngineError::user(format!(
                            "submodule '{}' is not in the registry",
                            plan.name
                        ))
                    })?;
                    meta.materialize_submodule(&plan.name, &url, base)?;
                }
                replays.push(ReplayTask {
                    name: plan.name.clone(),
                    path: meta.submodule_workdir(&plan.name),
                    base: base.clone(),
                    target: target.clone(),
                    url,
                });
            }
            LinkAction::Skip | LinkAction::Remove => {}
        }
    }

    let results = fanout::run_all(replays, replay_submodule).await;
    let outcomes = fanout::collect_results(results)?;

    // Phase 4: build the replayed meta tree with every gitlink resolved.
    let mut overrides: Vec<GitlinkUpdate> = Vec::new();
    let mut finalized: BTreeMap<SubmoduleName, &ReplayOutcome> = BTreeMap::new();
    for outcome in &outcomes {
        finalized.insert(outcome.name.clone(), outcome);
    }
    for plan in &plans {
        let path = plan.name.as_rel_path().to_path_buf();
        match &plan.action {
            LinkAction::Skip => {}
            LinkAction::Remove => overrides.push(GitlinkUpdate { path, target: None }),
            LinkAction::Adopt { target } => overrides.push(GitlinkUpdate {
                path,
                target: Some(target.clone()),
            }),
            LinkAction::Replay { .. } => {
                let outcome = finalized.get(&plan.name).ok_or_else(|| {
                    EngineError::Internal(format!("missing replay outcome for '{}'", plan.name))
                })?;
                overrides.push(GitlinkUpdate {
                    path,
                    target: Some(outcome.final_target.clone()),
                });
            }
        }
    }

    let tree = match meta.store().replay_tree(&head, &parent, commit, &overrides)? {
        MergeResolution::Clean(tree) => tree,
        MergeResolution::Conflicts(paths) => {
            return Err(EngineError::Internal(format!(
                "content conflicts after a clean probe: {}",
                paths.join(", ")
            )))
        }
    };
    let new_commit = meta
        .store()
        .commit_with_metadata_of(&tree, &[head.clone()], commit)?;

    // Phase 5: the meta mutation happens-before dependent submodule
    // mutations. Advance the ref, then the meta working state.
    meta.store()
        .advance_head(&new_commit, &format!("cherry-pick: {}", commit.short(12)))?;
    {
        let open = meta.open_submodules()?;
        let _shield = meta.shield_submodules(&open)?;
        meta.store()
            .checkout_tree(&new_commit, CheckoutStrategy::Safe)?;
    }

    // Phase 6: finalize submodules: check out replayed tips, close removed
    // submodules.
    let moves: Vec<(PathBuf, Oid)> = outcomes
        .iter()
        .map(|o| (o.path.clone(), o.final_target.clone()))
        .collect();
    let results = fanout::run_all(moves, |(path, target): (PathBuf, Oid)| {
        let store = ObjectStore::open(&path)?;
        store.checkout_tree(&target, CheckoutStrategy::Safe)?;
        store.detach_head(&target)?;
        Ok(())
    })
    .await;
    fanout::collect_results(results)?;

    for plan in &plans {
        if matches!(plan.action, LinkAction::Remove) {
            meta.close_submodule(&plan.name)?;
        }
    }

    let submodule_commits: BTreeMap<SubmoduleName, BTreeMap<Oid, Oid>> = outcomes
        .into_iter()
        .filter(|o| !o.rewritten.is_empty())
        .map(|o| (o.name, o.rewritten))
        .collect();

    Ok(CherrypickResult {
        new_commit,
        submodule_commits,
    })
}

/// Replay `(base, target]` onto a submodule's current HEAD, creating one
/// fresh commit per picked commit. Object creation only; the submodule's
/// HEAD and working tree are left for the finalize phase.
fn replay_submodule(task: ReplayTask) -> Result<ReplayOutcome, EngineError> {
    let store = ObjectStore::open(&task.path)?;
    if !store.contains_commit(&task.target)? {
        let url = task.url.as_deref().ok_or_else(|| {
            EngineError::user(format!("submodule '{}' is not in the registry", task.name))
        })?;
        store.fetch_commit(url, &task.target)?;
    }

    let mut current = store.head_commit()?;
    let mut rewritten = BTreeMap::new();
    for pick in store.commits_between(&task.base, &task.target)? {
        match store.cherrypick_one(&pick, &current)? {
            MergeResolution::Clean(tree) => {
                let replayed =
                    store.commit_with_metadata_of(&tree, &[current.clone()], &pick)?;
                tracing::debug!(
                    submodule = %task.name,
                    original = %pick.short(12),
                    replayed = %replayed.short(12),
                    "replayed submodule commit"
                );
                rewritten.insert(pick, replayed.clone());
                current = replayed;
            }
            MergeResolution::Conflicts(paths) => {
                return Err(EngineError::user(format!(
                    "cherry-pick would conflict in submodule '{}' on: {}",
                    task.name,
                    paths.join(", ")
                )))
            }
        }
    }

    Ok(ReplayOutcome {
        name: task.name,
        path: task.path,
        final_target: current,
        rewritten,
    })
}
