//! engine::checkout
//!
//! The checkout executor: propagates a meta-level target commit into every
//! open submodule recorded at that commit, and applies derived checkout
//! plans (branch creation, tracking, switching) on top.

use std::path::PathBuf;

use crate::core::types::Oid;
use crate::git::{CheckoutStrategy, ObjectStore};
use crate::meta::MetaRepo;

use super::resolve::CheckoutPlan;
use super::validate::{validate, SubmoduleMove};
use super::{fanout, EngineError, UserError};

/// A fetch of one missing submodule target.
#[derive(Debug, Clone)]
struct FetchTask {
    path: PathBuf,
    url: String,
    target: Oid,
}

/// Check out `commit` across the meta repository and every open submodule
/// present in its tree.
///
/// 1. Candidates are the submodules that are open *and* recorded at
///    `commit`; missing targets are fetched through the registry URL
///    (relative URLs resolved against the meta remote).
/// 2. Unless `force`, the consistency validator gates execution: any
///    problem aborts the whole operation before any mutation, and all
///    problems are surfaced together.
/// 3. The meta tree checkout runs with open submodules shielded from the
///    raw tree operation, then meta HEAD detaches to `commit`. This
///    happens before any submodule moves.
/// 4. Each candidate submodule gets the same tree-checkout plus
///    detached-HEAD sequence against its own store.
///
/// With `force`, checkout-strategy failures during execution are fatal; the
/// safety gate was deliberately bypassed and no recovery is attempted.
pub async fn checkout_commit(
    meta: &MetaRepo,
    commit: &Oid,
    force: bool,
    fetch: bool,
) -> Result<(), EngineError> {
    let target_links = meta.store().gitlink_entries(commit)?;
    let open = meta.open_submodules()?;
    let head = meta.store().try_head_commit()?;

    // URL resolution follows the registry tracked at the target commit
    let registry = meta.registry_at(commit)?;
    let meta_url = meta.remote_url()?;

    // Candidate set: open ∩ present at the target, minus no-ops
    let mut moves: Vec<SubmoduleMove> = Vec::new();
    let mut fetches: Vec<FetchTask> = Vec::new();
    for name in &open {
        let Some(target) = target_links.get(name) else {
            continue;
        };
        let sub = meta.open_submodule_store(name)?;
        if sub.try_head_commit()?.as_ref() == Some(target) {
            continue;
        }
        if !sub.contains_commit(target)? {
            if !fetch {
                return Err(EngineError::user(format!(
                    "submodule '{}' is missing commit {} and fetching is disabled",
                    name,
                    target.short(12)
                )));
            }
            let url = registry.resolved_url(name, meta_url.as_deref())?;
            fetches.push(FetchTask {
                path: meta.submodule_workdir(name),
                url,
                target: target.clone(),
            });
        }
        let recorded = match &head {
            Some(head) => meta.store().gitlink_at(head, name)?,
            None => None,
        };
        moves.push(SubmoduleMove {
            name: name.clone(),
            path: meta.submodule_workdir(name),
            recorded,
            target: target.clone(),
        });
    }

    if !fetches.is_empty() {
        tracing::debug!(count = fetches.len(), "fetching missing submodule targets");
        let results = fanout::run_all(fetches, |task: FetchTask| {
            let store = ObjectStore::open(&task.path)?;
            store.fetch_commit(&task.url, &task.target)?;
            Ok(())
        })
        .await;
        fanout::collect_results(results)?;
    }

    if !force {
        let problems = validate(meta, commit, &moves).await?;
        if !problems.is_empty() {
            return Err(UserError::from_problems(problems).into());
        }
    }

    let strategy = if force {
        CheckoutStrategy::Force
    } else {
        CheckoutStrategy::Safe
    };

    // Meta mutation first; open submodules are hidden from the raw tree
    // operation and restored when the shield drops.
    tracing::debug!(commit = %commit.short(12), force, "checking out meta tree");
    {
        let _shield = meta.shield_submodules(&open)?;
        meta.store().checkout_tree(commit, strategy)?;
    }
    meta.store().detach_head(commit)?;

    let results = fanout::run_all(moves, move |mv: SubmoduleMove| {
        let store = ObjectStore::open(&mv.path)?;
        store.checkout_tree(&mv.target, strategy)?;
        store.detach_head(&mv.target)?;
        Ok(())
    })
    .await;
    fanout::collect_results(results)?;
    Ok(())
}

/// Apply a derived [`CheckoutPlan`]: optional commit checkout, branch
/// creation with upstream configuration, and the final branch switch.
pub async fn execute_plan(
    meta: &MetaRepo,
    plan: &CheckoutPlan,
    force: bool,
    fetch: bool,
) -> Result<(), EngineError> {
    if let Some(commit) = &plan.commit {
        checkout_commit(meta, commit, force, fetch).await?;
    }

    if let Some(new_branch) = &plan.new_branch {
        let target = match &plan.commit {
            Some(commit) => commit.clone(),
            None => meta.store().head_commit()?,
        };
        let upstream = new_branch
            .tracking
            .as_ref()
            .map(super::resolve::Tracking::upstream_shorthand);
        meta.store()
            .create_branch(&new_branch.name, &target, upstream.as_deref())?;
    }

    if let Some(branch) = &plan.switch_branch {
        meta.store().switch_branch(branch)?;
    }

    Ok(())
}
