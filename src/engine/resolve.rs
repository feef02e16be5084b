//! engine::resolve
//!
//! Branch/committish resolution: turns the user's (committish, new branch,
//! track) triple into a [`CheckoutPlan`]. Pure derivation; only read-only
//! store queries, no mutation of any repository.
//!
//! The rules are priority-ordered and subtle. In short:
//!
//! 1. `--track` with a committish and no explicit branch name demands an
//!    exact `<remote>/<branch>` committish and synthesizes the local
//!    branch of that short name.
//! 2. `--track` without any branch name to derive is an error.
//! 3. A committish that resolves directly is used as-is; a local branch
//!    committish also becomes the branch to switch to. A committish that
//!    does not resolve may still name exactly one remote's tracking branch,
//!    which implicitly creates a tracking branch of the same short name.
//! 4. No committish means "stay put"; the current branch, if any, becomes
//!    the tracking candidate.
//! 5. An explicit new branch is created at the resolved position and
//!    switched to, tracking the candidate from steps 3-4 when `--track`.

use crate::core::types::{BranchName, Oid};
use crate::git::{ObjectStore, StoreError};

use super::EngineError;

/// A derived checkout plan. `commit == None` means "stay on the current
/// commit; only branch operations apply".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckoutPlan {
    /// Commit to check out, if any.
    pub commit: Option<Oid>,
    /// Branch to create, if any.
    pub new_branch: Option<NewBranch>,
    /// Branch to attach HEAD to at the end, if any.
    pub switch_branch: Option<BranchName>,
}

impl CheckoutPlan {
    /// Whether the plan does nothing at all.
    pub fn is_noop(&self) -> bool {
        self.commit.is_none() && self.new_branch.is_none() && self.switch_branch.is_none()
    }
}

/// A branch to create as part of a checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBranch {
    /// Name of the branch to create.
    pub name: BranchName,
    /// Upstream to configure, if any.
    pub tracking: Option<Tracking>,
}

/// Upstream configuration for a new branch.
#[derive(Debug, Clone, PartialEq)]
pub struct Tracking {
    /// Remote name; `None` for a local upstream branch.
    pub remote: Option<String>,
    /// Upstream branch name (short form).
    pub branch: String,
}

impl Tracking {
    /// The upstream in the short form git config understands
    /// (`origin/feature`, or a bare local branch name).
    pub fn upstream_shorthand(&self) -> String {
        match &self.remote {
            Some(remote) => format!("{}/{}", remote, self.branch),
            None => self.branch.clone(),
        }
    }
}

/// The branch a new branch would track, remembered while rules 3-4 run.
#[derive(Debug, Clone)]
enum TrackingSource {
    Local(BranchName),
    Remote { remote: String, branch: String },
}

/// Derive a checkout plan from user-supplied arguments.
///
/// See the module docs for the rule ordering. All code paths that take a
/// `committish` either yield a plan with a commit or fail outright.
pub fn derive_checkout_plan(
    store: &ObjectStore,
    committish: Option<&str>,
    new_branch: Option<&str>,
    track: bool,
) -> Result<CheckoutPlan, EngineError> {
    // Rules 1 and 2: --track without an explicit new branch
    if track && new_branch.is_none() {
        let Some(spec) = committish else {
            return Err(EngineError::user(
                "--track requires a branch name: supply a remote branch or use -b",
            ));
        };
        return derive_tracked_checkout(store, spec);
    }

    // Rules 3 and 4: establish the commit and the tracking candidate
    let mut plan = CheckoutPlan::default();
    let mut source: Option<TrackingSource> = None;

    match committish {
        Some(spec) => match store.resolve_committish(spec)? {
            Some(commit) => {
                plan.commit = Some(commit);
                if spec != "HEAD" {
                    source = branch_named(store, spec)?;
                    if let Some(TrackingSource::Local(branch)) = &source {
                        // A local branch committish also means "switch to it";
                        // remote branches stay detached.
                        plan.switch_branch = Some(branch.clone());
                    }
                }
            }
            None => {
                if new_branch.is_none() {
                    if let Some(implicit) = implicit_tracking_branch(store, spec)? {
                        return Ok(implicit);
                    }
                }
                return Err(EngineError::user(format!(
                    "could not resolve '{spec}' as a branch or commit"
                )));
            }
        },
        None => {
            // Stay on the current commit; the attached branch, if any,
            // is still a valid tracking candidate.
            if let Some(current) = store.current_branch()? {
                source = Some(TrackingSource::Local(current));
            }
        }
    }

    // Rule 5: explicit new branch
    if let Some(name) = new_branch {
        if store.local_branch_exists(name) {
            return Err(EngineError::user(format!(
                "a branch named '{name}' already exists"
            )));
        }
        let branch = BranchName::new(name).map_err(|e| EngineError::user(e.to_string()))?;
        let tracking = if track {
            match source {
                None => {
                    return Err(EngineError::user(format!(
                        "cannot set up tracking for '{name}': the starting point is not a branch"
                    )))
                }
                Some(TrackingSource::Local(upstream)) => Some(Tracking {
                    remote: None,
                    branch: upstream.as_str().to_string(),
                }),
                Some(TrackingSource::Remote { remote, branch }) => Some(Tracking {
                    remote: Some(remote),
                    branch,
                }),
            }
        } else {
            None
        };
        plan.new_branch = Some(NewBranch {
            name: branch.clone(),
            tracking,
        });
        // Overrides any switch decision from rule 3
        plan.switch_branch = Some(branch);
    }

    Ok(plan)
}

/// Rule 1: `--track origin/feature` with no explicit branch name.
fn derive_tracked_checkout(store: &ObjectStore, spec: &str) -> Result<CheckoutPlan, EngineError> {
    let remotes = store.remote_names()?;
    let Some((remote, branch)) = split_remote_shorthand(&remotes, spec) else {
        return Err(EngineError::user(format!(
            "'{spec}' is not a remote tracking branch"
        )));
    };
    let Some(tip) = store.remote_branch_tip(&remote, &branch)? else {
        return Err(EngineError::user(format!(
            "remote branch '{spec}' does not exist"
        )));
    };
    if store.local_branch_exists(&branch) {
        return Err(EngineError::user(format!(
            "a branch named '{branch}' already exists"
        )));
    }
    let name = BranchName::new(&branch).map_err(|e| EngineError::user(e.to_string()))?;
    Ok(CheckoutPlan {
        commit: Some(tip),
        new_branch: Some(NewBranch {
            name: name.clone(),
            tracking: Some(Tracking {
                remote: Some(remote),
                branch,
            }),
        }),
        switch_branch: Some(name),
    })
}

/// Rule 3b: a committish that is no commit may still name exactly one
/// remote's tracking branch. Exactly one match synthesizes an implicit
/// tracking branch; zero or multiple matches fall through to the caller's
/// resolution error. Multiple matches are deliberately a hard error with
/// no tie-break between remotes.
fn implicit_tracking_branch(
    store: &ObjectStore,
    spec: &str,
) -> Result<Option<CheckoutPlan>, EngineError> {
    let mut matches = Vec::new();
    for remote in store.remote_names()? {
        if let Some(tip) = store.remote_branch_tip(&remote, spec)? {
            matches.push((remote, tip));
        }
    }
    if matches.len() != 1 {
        return Ok(None);
    }
    let (remote, tip) = matches.remove(0);
    let name = match BranchName::new(spec) {
        Ok(name) => name,
        Err(_) => return Ok(None),
    };
    Ok(Some(CheckoutPlan {
        commit: Some(tip),
        new_branch: Some(NewBranch {
            name: name.clone(),
            tracking: Some(Tracking {
                remote: Some(remote),
                branch: spec.to_string(),
            }),
        }),
        switch_branch: Some(name),
    }))
}

/// Whether `spec` names an existing local or remote branch.
fn branch_named(store: &ObjectStore, spec: &str) -> Result<Option<TrackingSource>, StoreError> {
    if store.local_branch_exists(spec) {
        if let Ok(name) = BranchName::new(spec) {
            return Ok(Some(TrackingSource::Local(name)));
        }
    }
    let remotes = store.remote_names()?;
    if let Some((remote, branch)) = split_remote_shorthand(&remotes, spec) {
        if store.remote_branch_tip(&remote, &branch)?.is_some() {
            return Ok(Some(TrackingSource::Remote { remote, branch }));
        }
    }
    Ok(None)
}

/// Split `origin/feature/x` into `("origin", "feature/x")` against the
/// configured remote names. The longest matching remote wins.
fn split_remote_shorthand(remotes: &[String], spec: &str) -> Option<(String, String)> {
    let mut best: Option<(&str, &str)> = None;
    for remote in remotes {
        if let Some(rest) = spec.strip_prefix(&format!("{}/", remote)) {
            if !rest.is_empty() && best.map_or(true, |(b, _)| remote.len() > b.len()) {
                best = Some((remote, rest));
            }
        }
    }
    best.map(|(remote, branch)| (remote.to_string(), branch.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    mod split_remote_shorthand {
        use super::*;

        fn remotes(names: &[&str]) -> Vec<String> {
            names.iter().map(|s| s.to_string()).collect()
        }

        #[test]
        fn splits_on_known_remote() {
            assert_eq!(
                split_remote_shorthand(&remotes(&["origin"]), "origin/feature/x"),
                Some(("origin".to_string(), "feature/x".to_string()))
            );
        }

        #[test]
        fn unknown_remote_does_not_split() {
            assert_eq!(
                split_remote_shorthand(&remotes(&["origin"]), "upstream/feature"),
                None
            );
        }

        #[test]
        fn bare_remote_name_does_not_split() {
            assert_eq!(split_remote_shorthand(&remotes(&["origin"]), "origin/"), None);
            assert_eq!(split_remote_shorthand(&remotes(&["origin"]), "origin"), None);
        }

        #[test]
        fn longest_remote_wins() {
            assert_eq!(
                split_remote_shorthand(&remotes(&["fork", "fork/nested"]), "fork/nested/main"),
                Some(("fork/nested".to_string(), "main".to_string()))
            );
        }
    }

    mod tracking {
        use super::*;

        #[test]
        fn remote_shorthand() {
            let tracking = Tracking {
                remote: Some("origin".into()),
                branch: "feature".into(),
            };
            assert_eq!(tracking.upstream_shorthand(), "origin/feature");
        }

        #[test]
        fn local_shorthand() {
            let tracking = Tracking {
                remote: None,
                branch: "main".into(),
            };
            assert_eq!(tracking.upstream_shorthand(), "main");
        }
    }

    mod plan {
        use super::*;

        #[test]
        fn default_is_noop() {
            assert!(CheckoutPlan::default().is_noop());
        }

        #[test]
        fn commit_makes_it_meaningful() {
            let plan = CheckoutPlan {
                commit: Some(Oid::new("abc123def4567890abc123def4567890abc12345").unwrap()),
                ..Default::default()
            };
            assert!(!plan.is_noop());
        }
    }
}
