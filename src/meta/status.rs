//! meta::status
//!
//! Status snapshot builder.
//!
//! A [`RepoStatus`] captures, for one repository, how its index and working
//! directory relate to a target commit. Snapshots are computed fresh for
//! every validation and never cached across mutations; a snapshot taken
//! before a checkout says nothing about the repository afterwards.

use crate::core::types::Oid;
use crate::git::{ObjectStore, StoreError};

/// How one side of a repository relates to a target commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    /// Identical to the target.
    Same,
    /// Strictly ahead of the target (target is an ancestor).
    Ahead,
    /// Strictly behind the target (a descendant exists at the target).
    Behind,
    /// Neither side contains the other.
    Diverged,
    /// The target is unknown to this repository's store.
    Unknown,
}

impl Relation {
    /// Whether this relation means "nothing to do".
    pub fn is_same(&self) -> bool {
        matches!(self, Relation::Same)
    }
}

/// Snapshot of a repository's index and working directory relative to a
/// target commit.
#[derive(Debug, Clone)]
pub struct RepoStatus {
    /// Current HEAD commit, `None` for an unborn HEAD.
    pub head: Option<Oid>,
    /// Relation of the index to the target commit's tree.
    pub index_relation: Relation,
    /// Relation of the working directory to the target commit's tree.
    pub workdir_relation: Relation,
}

impl RepoStatus {
    /// Compute a fresh snapshot of `store` against `target`.
    pub fn compute(store: &ObjectStore, target: &Oid) -> Result<Self, StoreError> {
        let head = store.try_head_commit()?;
        if !store.contains_commit(target)? {
            return Ok(Self {
                head,
                index_relation: Relation::Unknown,
                workdir_relation: Relation::Unknown,
            });
        }
        let index_relation = if store.index_matches(target)? {
            Relation::Same
        } else {
            Relation::Diverged
        };
        let workdir_relation = if store.workdir_matches(target)? {
            Relation::Same
        } else {
            Relation::Diverged
        };
        Ok(Self {
            head,
            index_relation,
            workdir_relation,
        })
    }

    /// Whether both index and working directory match the target.
    pub fn is_clean(&self) -> bool {
        self.index_relation.is_same() && self.workdir_relation.is_same()
    }
}

/// Relate one commit to another through ancestry.
pub fn commit_relation(store: &ObjectStore, ours: &Oid, target: &Oid) -> Result<Relation, StoreError> {
    if ours == target {
        return Ok(Relation::Same);
    }
    if !store.contains_commit(target)? || !store.contains_commit(ours)? {
        return Ok(Relation::Unknown);
    }
    if store.is_ancestor(target, ours)? {
        return Ok(Relation::Ahead);
    }
    if store.is_ancestor(ours, target)? {
        return Ok(Relation::Behind);
    }
    Ok(Relation::Diverged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_is_same() {
        assert!(Relation::Same.is_same());
        assert!(!Relation::Diverged.is_same());
        assert!(!Relation::Unknown.is_same());
    }

    #[test]
    fn clean_requires_both_sides() {
        let status = RepoStatus {
            head: None,
            index_relation: Relation::Same,
            workdir_relation: Relation::Same,
        };
        assert!(status.is_clean());

        let status = RepoStatus {
            head: None,
            index_relation: Relation::Same,
            workdir_relation: Relation::Diverged,
        };
        assert!(!status.is_clean());
    }
}
