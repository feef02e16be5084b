//! git::store
//!
//! Object-store adapter implemented over git2.
//!
//! This module is the **single doorway** to every object-store operation:
//! commits, trees, indexes, refs, checkouts, merges and fetches. No other
//! module imports `git2`. This keeps error handling consistent and puts a
//! strong-typed boundary between the engine and the store binding.
//!
//! # Checkout strategies
//!
//! Tree checkouts are strategy-parameterized:
//!
//! - [`CheckoutStrategy::Trial`] - dry run; reports the conflicts a safe
//!   checkout would hit, touches nothing
//! - [`CheckoutStrategy::Safe`] - fails on conflicting local changes
//! - [`CheckoutStrategy::Force`] - discards local changes
//!
//! # Error Handling
//!
//! git2 errors are normalized into typed [`StoreError`] variants. Conflict
//! failures carry the conflicting paths so callers can aggregate them into
//! a single report.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::types::{BranchName, Oid, SubmoduleName, TypeError};

/// Tree/index entry mode of a gitlink (submodule pointer).
pub const GITLINK_MODE: i32 = 0o160000;

/// Refspec used when a remote cannot serve a bare sha and the heads are
/// mirrored instead; the temporary refs are deleted right after the fetch.
const FALLBACK_FETCH_REFSPEC: &str = "+refs/heads/*:refs/gitweave/fetch/*";
const FALLBACK_FETCH_PREFIX: &str = "refs/gitweave/fetch/";

/// Errors from object-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Not inside a git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was searched
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// Object not found in the store.
    #[error("object not found: {oid}")]
    ObjectNotFound {
        /// The OID that was not found
        oid: String,
    },

    /// Invalid object id format.
    #[error("invalid object id: {oid}")]
    InvalidOid {
        /// The invalid OID string
        oid: String,
    },

    /// A tree checkout would clobber local state.
    #[error("checkout would overwrite local changes: {}", paths.join(", "))]
    CheckoutConflict {
        /// The conflicting workdir paths
        paths: Vec<String>,
    },

    /// Fetching a commit from a remote URL failed.
    #[error("fetch from {url} failed: {message}")]
    FetchFailed {
        /// The URL that was fetched from
        url: String,
        /// The underlying failure
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl StoreError {
    /// Create a StoreError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound => {
                if context.starts_with("refs/") || context.contains("HEAD") {
                    StoreError::RefNotFound {
                        refname: context.to_string(),
                    }
                } else {
                    StoreError::ObjectNotFound {
                        oid: context.to_string(),
                    }
                }
            }
            git2::ErrorCode::InvalidSpec => StoreError::InvalidOid {
                oid: context.to_string(),
            },
            _ => StoreError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<TypeError> for StoreError {
    fn from(err: TypeError) -> Self {
        match err {
            TypeError::InvalidOid(msg) => StoreError::InvalidOid { oid: msg },
            other => StoreError::Internal {
                message: other.to_string(),
            },
        }
    }
}

/// Strategy for tree checkouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutStrategy {
    /// Dry run: detect conflicts, touch nothing.
    Trial,
    /// Fail on conflicting local changes.
    Safe,
    /// Discard local changes.
    Force,
}

/// Reset flavors, matching git's own semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// Move the ref only.
    Soft,
    /// Move the ref and replace the index.
    Mixed,
    /// Move the ref, replace index and working tree.
    Hard,
}

/// Outcome of an in-memory merge or cherry-pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeResolution {
    /// Merge succeeded; the resulting tree id.
    Clean(Oid),
    /// Merge left unresolved conflicts on these paths.
    Conflicts(Vec<String>),
}

/// One side of a tree-to-tree diff entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntryInfo {
    /// Object id of the blob or gitlink target.
    pub id: Oid,
    /// Whether the entry is a gitlink.
    pub is_gitlink: bool,
}

/// One changed path between two trees.
#[derive(Debug, Clone)]
pub struct DiffEntry {
    /// Path relative to the repository root.
    pub path: PathBuf,
    /// Entry on the old side, if present.
    pub old: Option<TreeEntryInfo>,
    /// Entry on the new side, if present.
    pub new: Option<TreeEntryInfo>,
}

impl DiffEntry {
    /// Whether either side of the change is a gitlink.
    pub fn touches_gitlink(&self) -> bool {
        self.old.as_ref().map_or(false, |e| e.is_gitlink)
            || self.new.as_ref().map_or(false, |e| e.is_gitlink)
    }
}

/// A planned index mutation, applied atomically per repository by
/// [`ObjectStore::apply_index_updates`].
#[derive(Debug, Clone)]
pub enum IndexUpdate {
    /// Stage `id` with `mode` at `path`.
    Set {
        path: PathBuf,
        id: Oid,
        mode: i32,
    },
    /// Remove the staged entry at `path`.
    Remove { path: PathBuf },
}

/// Gitlink override applied while building a replayed tree.
#[derive(Debug, Clone)]
pub struct GitlinkUpdate {
    /// Gitlink path relative to the repository root.
    pub path: PathBuf,
    /// New target, or `None` to drop the entry.
    pub target: Option<Oid>,
}

/// Information about a commit.
#[derive(Debug, Clone)]
pub struct CommitMeta {
    /// The commit OID
    pub oid: Oid,
    /// First line of the commit message
    pub summary: String,
    /// Full commit message
    pub message: String,
    /// Author name
    pub author_name: String,
    /// Author email
    pub author_email: String,
    /// Author timestamp
    pub author_time: chrono::DateTime<chrono::Utc>,
}

/// The object-store interface.
///
/// One instance wraps one repository: the meta repository or a single
/// submodule. Engine code that fans out across submodules opens a fresh
/// `ObjectStore` inside each worker task; handles are never shared across
/// tasks.
pub struct ObjectStore {
    repo: git2::Repository,
}

impl std::fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStore")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl ObjectStore {
    // =========================================================================
    // Opening and repository info
    // =========================================================================

    /// Discover and open the repository containing `path`.
    pub fn discover(path: &Path) -> Result<Self, StoreError> {
        let repo = git2::Repository::discover(path).map_err(|_| StoreError::NotARepo {
            path: path.to_path_buf(),
        })?;
        if repo.is_bare() {
            return Err(StoreError::BareRepo);
        }
        Ok(Self { repo })
    }

    /// Open the repository rooted exactly at `path`.
    ///
    /// Used for submodules, where discovery must not walk up into the meta
    /// repository.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let repo = git2::Repository::open(path).map_err(|_| StoreError::NotARepo {
            path: path.to_path_buf(),
        })?;
        if repo.is_bare() {
            return Err(StoreError::BareRepo);
        }
        Ok(Self { repo })
    }

    /// Initialize a new repository at `path` (materializing a submodule).
    pub fn init_at(path: &Path) -> Result<Self, StoreError> {
        let repo = git2::Repository::init(path).map_err(|e| StoreError::Internal {
            message: format!("init at {}: {}", path.display(), e.message()),
        })?;
        Ok(Self { repo })
    }

    /// Path to the working directory.
    pub fn workdir(&self) -> Result<&Path, StoreError> {
        self.repo.workdir().ok_or(StoreError::BareRepo)
    }

    /// Path to the .git directory.
    pub fn git_dir(&self) -> &Path {
        self.repo.path()
    }

    // =========================================================================
    // HEAD and ref resolution
    // =========================================================================

    /// Get the HEAD commit OID.
    pub fn head_commit(&self) -> Result<Oid, StoreError> {
        let head = self
            .repo
            .head()
            .map_err(|e| StoreError::from_git2(e, "HEAD"))?;
        let oid = head
            .peel_to_commit()
            .map_err(|e| StoreError::from_git2(e, "HEAD"))?
            .id();
        from_git_oid(oid)
    }

    /// Get the HEAD commit OID, or `None` for an unborn HEAD.
    pub fn try_head_commit(&self) -> Result<Option<Oid>, StoreError> {
        match self.head_commit() {
            Ok(oid) => Ok(Some(oid)),
            Err(StoreError::RefNotFound { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Get the current branch name, if HEAD is attached to one.
    pub fn current_branch(&self) -> Result<Option<BranchName>, StoreError> {
        let head = match self.repo.head() {
            Ok(head) => head,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) => return Err(StoreError::from_git2(e, "HEAD")),
        };
        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }
        Ok(None) // Detached HEAD
    }

    /// Resolve a committish (branch, tag, sha prefix, `HEAD~2`, ...) to a
    /// commit OID. Returns `None` when the spec does not name a commit.
    pub fn resolve_committish(&self, spec: &str) -> Result<Option<Oid>, StoreError> {
        let object = match self.repo.revparse_single(spec) {
            Ok(object) => object,
            Err(e)
                if matches!(
                    e.code(),
                    git2::ErrorCode::NotFound
                        | git2::ErrorCode::InvalidSpec
                        | git2::ErrorCode::Ambiguous
                ) =>
            {
                return Ok(None)
            }
            Err(e) => return Err(StoreError::from_git2(e, spec)),
        };
        match object.peel(git2::ObjectType::Commit) {
            Ok(peeled) => match peeled.into_commit() {
                Ok(commit) => Ok(Some(from_git_oid(commit.id())?)),
                Err(_) => Ok(None),
            },
            // Resolvable but not a commit (e.g. a blob sha)
            Err(_) => Ok(None),
        }
    }

    /// Move HEAD to point directly at a commit.
    pub fn detach_head(&self, commit: &Oid) -> Result<(), StoreError> {
        self.repo
            .set_head_detached(to_git_oid(commit)?)
            .map_err(|e| StoreError::from_git2(e, commit.as_str()))
    }

    /// Attach HEAD to a local branch without touching the working tree.
    pub fn switch_branch(&self, branch: &BranchName) -> Result<(), StoreError> {
        let refname = format!("refs/heads/{}", branch);
        self.repo
            .set_head(&refname)
            .map_err(|e| StoreError::from_git2(e, &refname))
    }

    /// Advance the current branch ref to `to`, or detach HEAD there when no
    /// branch is checked out.
    pub fn advance_head(&self, to: &Oid, reflog_message: &str) -> Result<(), StoreError> {
        let oid = to_git_oid(to)?;
        match self.repo.head() {
            Ok(head) if head.is_branch() => {
                let refname = head
                    .name()
                    .ok_or_else(|| StoreError::Internal {
                        message: "HEAD ref name is not valid UTF-8".to_string(),
                    })?
                    .to_string();
                self.repo
                    .reference(&refname, oid, true, reflog_message)
                    .map_err(|e| StoreError::from_git2(e, &refname))?;
                Ok(())
            }
            _ => self
                .repo
                .set_head_detached(oid)
                .map_err(|e| StoreError::from_git2(e, to.as_str())),
        }
    }

    // =========================================================================
    // Branches and remotes
    // =========================================================================

    /// Whether a local branch with this short name exists.
    pub fn local_branch_exists(&self, name: &str) -> bool {
        self.repo
            .find_branch(name, git2::BranchType::Local)
            .is_ok()
    }

    /// Tip of a remote-tracking branch `<remote>/<branch>`, or `None`.
    pub fn remote_branch_tip(&self, remote: &str, branch: &str) -> Result<Option<Oid>, StoreError> {
        self.branch_tip(&format!("{}/{}", remote, branch), git2::BranchType::Remote)
    }

    fn branch_tip(&self, name: &str, kind: git2::BranchType) -> Result<Option<Oid>, StoreError> {
        let branch = match self.repo.find_branch(name, kind) {
            Ok(branch) => branch,
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::from_git2(e, name)),
        };
        let oid = branch
            .get()
            .peel_to_commit()
            .map_err(|e| StoreError::from_git2(e, name))?
            .id();
        Ok(Some(from_git_oid(oid)?))
    }

    /// Names of all configured remotes.
    pub fn remote_names(&self) -> Result<Vec<String>, StoreError> {
        let remotes = self.repo.remotes().map_err(|e| StoreError::Internal {
            message: e.message().to_string(),
        })?;
        Ok(remotes.iter().flatten().map(String::from).collect())
    }

    /// URL of a remote, or `None` if the remote does not exist.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, StoreError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(StoreError::Internal {
                message: e.message().to_string(),
            }),
        }
    }

    /// Make sure a named remote exists, creating it with `url` if absent.
    pub fn ensure_remote(&self, name: &str, url: &str) -> Result<(), StoreError> {
        match self.repo.find_remote(name) {
            Ok(_) => Ok(()),
            Err(e) if e.code() == git2::ErrorCode::NotFound => {
                self.repo.remote(name, url).map_err(|e| StoreError::Internal {
                    message: format!("adding remote {}: {}", name, e.message()),
                })?;
                Ok(())
            }
            Err(e) => Err(StoreError::Internal {
                message: e.message().to_string(),
            }),
        }
    }

    /// Create a local branch at `target`, optionally configuring an
    /// upstream (`"origin/feature"` or a local branch short name).
    pub fn create_branch(
        &self,
        name: &BranchName,
        target: &Oid,
        upstream: Option<&str>,
    ) -> Result<(), StoreError> {
        let commit = self.find_commit(target)?;
        let mut branch = self
            .repo
            .branch(name.as_str(), &commit, false)
            .map_err(|e| StoreError::from_git2(e, name.as_str()))?;
        if let Some(upstream) = upstream {
            branch
                .set_upstream(Some(upstream))
                .map_err(|e| StoreError::Internal {
                    message: format!("setting upstream of {} to {}: {}", name, upstream, e.message()),
                })?;
        }
        Ok(())
    }

    // =========================================================================
    // Commits and ancestry
    // =========================================================================

    /// Whether the store contains this commit locally.
    pub fn contains_commit(&self, oid: &Oid) -> Result<bool, StoreError> {
        let odb = self.repo.odb().map_err(|e| StoreError::Internal {
            message: e.message().to_string(),
        })?;
        Ok(odb.exists(to_git_oid(oid)?))
    }

    /// Parent OIDs of a commit; empty for root commits.
    pub fn commit_parents(&self, oid: &Oid) -> Result<Vec<Oid>, StoreError> {
        let commit = self.find_commit(oid)?;
        commit.parent_ids().map(from_git_oid).collect()
    }

    /// Check if `ancestor` is an ancestor of `descendant` (a commit is its
    /// own ancestor).
    pub fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> Result<bool, StoreError> {
        if ancestor == descendant {
            return Ok(true);
        }
        self.repo
            .graph_descendant_of(to_git_oid(descendant)?, to_git_oid(ancestor)?)
            .map_err(|e| StoreError::Internal {
                message: e.message().to_string(),
            })
    }

    /// Commits in `(from, to]`, oldest first.
    pub fn commits_between(&self, from: &Oid, to: &Oid) -> Result<Vec<Oid>, StoreError> {
        let mut walk = self.repo.revwalk().map_err(|e| StoreError::Internal {
            message: e.message().to_string(),
        })?;
        walk.push(to_git_oid(to)?)
            .map_err(|e| StoreError::from_git2(e, to.as_str()))?;
        walk.hide(to_git_oid(from)?)
            .map_err(|e| StoreError::from_git2(e, from.as_str()))?;
        walk.set_sorting(git2::Sort::TOPOLOGICAL | git2::Sort::REVERSE)
            .map_err(|e| StoreError::Internal {
                message: e.message().to_string(),
            })?;
        walk.map(|step| {
            step.map_err(|e| StoreError::Internal {
                message: e.message().to_string(),
            })
            .and_then(from_git_oid)
        })
        .collect()
    }

    /// Get information about a commit.
    pub fn commit_meta(&self, oid: &Oid) -> Result<CommitMeta, StoreError> {
        let commit = self.find_commit(oid)?;
        let author = commit.author();
        let author_time = chrono::DateTime::from_timestamp(author.when().seconds(), 0)
            .unwrap_or(chrono::DateTime::UNIX_EPOCH)
            .with_timezone(&chrono::Utc);
        Ok(CommitMeta {
            oid: oid.clone(),
            summary: commit.summary().unwrap_or("").to_string(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("").to_string(),
            author_email: author.email().unwrap_or("").to_string(),
            author_time,
        })
    }

    /// Create a commit object from `tree` and `parents`, reusing the
    /// message and author of `source`. The committer is the repository's
    /// own signature, so the new commit id is always fresh.
    ///
    /// No ref is updated; callers advance HEAD explicitly.
    pub fn commit_with_metadata_of(
        &self,
        tree: &Oid,
        parents: &[Oid],
        source: &Oid,
    ) -> Result<Oid, StoreError> {
        let tree = self
            .repo
            .find_tree(to_git_oid(tree)?)
            .map_err(|e| StoreError::from_git2(e, tree.as_str()))?;
        let source = self.find_commit(source)?;
        let original = source.author();
        let author = git2::Signature::new(
            original.name().unwrap_or("unknown"),
            original.email().unwrap_or(""),
            &original.when(),
        )
        .map_err(|e| StoreError::Internal {
            message: e.message().to_string(),
        })?;
        let committer = self.signature()?;

        let mut parent_commits = Vec::with_capacity(parents.len());
        for parent in parents {
            parent_commits.push(self.find_commit(parent)?);
        }
        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let oid = self
            .repo
            .commit(
                None,
                &author,
                &committer,
                source.message().unwrap_or(""),
                &tree,
                &parent_refs,
            )
            .map_err(|e| StoreError::Internal {
                message: e.message().to_string(),
            })?;
        from_git_oid(oid)
    }

    fn signature(&self) -> Result<git2::Signature<'static>, StoreError> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            // No user.name/email configured (fresh materialized submodule)
            Err(_) => git2::Signature::now("gitweave", "gitweave@localhost").map_err(|e| {
                StoreError::Internal {
                    message: e.message().to_string(),
                }
            }),
        }
    }

    fn find_commit(&self, oid: &Oid) -> Result<git2::Commit<'_>, StoreError> {
        self.repo
            .find_commit(to_git_oid(oid)?)
            .map_err(|e| StoreError::from_git2(e, oid.as_str()))
    }

    fn commit_tree(&self, oid: &Oid) -> Result<git2::Tree<'_>, StoreError> {
        self.find_commit(oid)?
            .tree()
            .map_err(|e| StoreError::from_git2(e, oid.as_str()))
    }

    // =========================================================================
    // Tree inspection
    // =========================================================================

    /// All gitlink entries in a commit's tree, keyed by submodule name.
    pub fn gitlink_entries(&self, commit: &Oid) -> Result<BTreeMap<SubmoduleName, Oid>, StoreError> {
        let tree = self.commit_tree(commit)?;
        let mut links = BTreeMap::new();
        let mut malformed: Option<String> = None;
        tree.walk(git2::TreeWalkMode::PreOrder, |root, entry| {
            if entry.filemode() == GITLINK_MODE {
                let path = format!("{}{}", root, entry.name().unwrap_or_default());
                match (SubmoduleName::new(&path), from_git_oid(entry.id())) {
                    (Ok(name), Ok(oid)) => {
                        links.insert(name, oid);
                    }
                    _ => {
                        malformed = Some(path);
                        return git2::TreeWalkResult::Abort;
                    }
                }
            }
            git2::TreeWalkResult::Ok
        })
        .map_err(|e| StoreError::from_git2(e, commit.as_str()))?;

        if let Some(path) = malformed {
            return Err(StoreError::Internal {
                message: format!("malformed gitlink entry at '{}'", path),
            });
        }
        Ok(links)
    }

    /// The gitlink recorded for one submodule in a commit's tree, or `None`.
    pub fn gitlink_at(&self, commit: &Oid, name: &SubmoduleName) -> Result<Option<Oid>, StoreError> {
        match self.tree_entry_at(commit, name.as_rel_path())? {
            Some((oid, mode)) if mode == GITLINK_MODE => Ok(Some(oid)),
            _ => Ok(None),
        }
    }

    /// The `(id, mode)` of a tree entry at `path` in `commit`, or `None`.
    pub fn tree_entry_at(
        &self,
        commit: &Oid,
        path: &Path,
    ) -> Result<Option<(Oid, i32)>, StoreError> {
        let tree = self.commit_tree(commit)?;
        match tree.get_path(path) {
            Ok(entry) => Ok(Some((from_git_oid(entry.id())?, entry.filemode()))),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(StoreError::from_git2(e, &path.display().to_string())),
        }
    }

    /// Changed paths between two commits' trees.
    pub fn diff_entries(&self, old: &Oid, new: &Oid) -> Result<Vec<DiffEntry>, StoreError> {
        let old_tree = self.commit_tree(old)?;
        let new_tree = self.commit_tree(new)?;
        let diff = self
            .repo
            .diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)
            .map_err(|e| StoreError::Internal {
                message: e.message().to_string(),
            })?;

        let mut entries = Vec::new();
        for delta in diff.deltas() {
            let path = delta
                .new_file()
                .path()
                .or_else(|| delta.old_file().path())
                .ok_or_else(|| StoreError::Internal {
                    message: "diff delta without a path".to_string(),
                })?
                .to_path_buf();
            entries.push(DiffEntry {
                path,
                old: diff_side(delta.old_file())?,
                new: diff_side(delta.new_file())?,
            });
        }
        Ok(entries)
    }

    // =========================================================================
    // Index inspection and mutation
    // =========================================================================

    /// All gitlink entries currently staged in the index.
    pub fn index_gitlinks(&self) -> Result<BTreeMap<SubmoduleName, Oid>, StoreError> {
        let index = self.index()?;
        let mut links = BTreeMap::new();
        for entry in index.iter() {
            if entry.mode == GITLINK_MODE as u32 {
                let path = String::from_utf8_lossy(&entry.path).to_string();
                if let Ok(name) = SubmoduleName::new(&path) {
                    links.insert(name, from_git_oid(entry.id)?);
                }
            }
        }
        Ok(links)
    }

    /// The `(id, mode)` staged at `path`, or `None`.
    pub fn staged_entry(&self, path: &Path) -> Result<Option<(Oid, i32)>, StoreError> {
        let index = self.index()?;
        match index.get_path(path, 0) {
            Some(entry) => Ok(Some((from_git_oid(entry.id)?, entry.mode as i32))),
            None => Ok(None),
        }
    }

    /// Whether the index matches a commit's tree exactly.
    pub fn index_matches(&self, commit: &Oid) -> Result<bool, StoreError> {
        let tree = self.commit_tree(commit)?;
        let diff = self
            .repo
            .diff_tree_to_index(Some(&tree), None, None)
            .map_err(|e| StoreError::Internal {
                message: e.message().to_string(),
            })?;
        Ok(diff.deltas().len() == 0)
    }

    /// Whether the working tree matches a commit's tree (untracked files
    /// do not count).
    pub fn workdir_matches(&self, commit: &Oid) -> Result<bool, StoreError> {
        let tree = self.commit_tree(commit)?;
        let diff = self
            .repo
            .diff_tree_to_workdir(Some(&tree), None)
            .map_err(|e| StoreError::Internal {
                message: e.message().to_string(),
            })?;
        Ok(diff.deltas().len() == 0)
    }

    /// Apply a batch of staged-entry updates and write the index once.
    ///
    /// Callers validate the whole batch first; this method is the only
    /// index write path, so a validated batch either applies fully or (on
    /// an unexpected store failure) leaves the on-disk index untouched up
    /// to the failed write.
    pub fn apply_index_updates(&self, updates: &[IndexUpdate]) -> Result<(), StoreError> {
        let mut index = self.index()?;
        for update in updates {
            match update {
                IndexUpdate::Set { path, id, mode } => {
                    let entry = raw_index_entry(path, to_git_oid(id)?, *mode as u32);
                    index.add(&entry).map_err(|e| StoreError::Internal {
                        message: format!("staging {}: {}", path.display(), e.message()),
                    })?;
                }
                IndexUpdate::Remove { path } => {
                    index.remove_path(path).map_err(|e| StoreError::Internal {
                        message: format!("unstaging {}: {}", path.display(), e.message()),
                    })?;
                }
            }
        }
        index.write().map_err(|e| StoreError::Internal {
            message: e.message().to_string(),
        })
    }

    /// Replace the whole index with a commit's tree (workdir untouched).
    pub fn read_index_from_commit(&self, commit: &Oid) -> Result<(), StoreError> {
        let tree = self.commit_tree(commit)?;
        let mut index = self.index()?;
        index.read_tree(&tree).map_err(|e| StoreError::Internal {
            message: e.message().to_string(),
        })?;
        index.write().map_err(|e| StoreError::Internal {
            message: e.message().to_string(),
        })
    }

    fn index(&self) -> Result<git2::Index, StoreError> {
        self.repo.index().map_err(|e| StoreError::Internal {
            message: e.message().to_string(),
        })
    }

    // =========================================================================
    // Checkout and reset
    // =========================================================================

    /// Check out a commit's tree into index and working directory using the
    /// given strategy. HEAD is not moved; see [`Self::detach_head`].
    pub fn checkout_tree(&self, commit: &Oid, strategy: CheckoutStrategy) -> Result<(), StoreError> {
        let object = self
            .repo
            .find_object(to_git_oid(commit)?, None)
            .map_err(|e| StoreError::from_git2(e, commit.as_str()))?;

        let mut conflicts: Vec<String> = Vec::new();
        let result = {
            let mut opts = git2::build::CheckoutBuilder::new();
            match strategy {
                CheckoutStrategy::Trial => {
                    opts.safe();
                    opts.dry_run();
                }
                CheckoutStrategy::Safe => {
                    opts.safe();
                }
                CheckoutStrategy::Force => {
                    opts.force();
                }
            }
            opts.notify_on(git2::CheckoutNotificationType::CONFLICT);
            opts.notify(|_why, path, _baseline, _target, _workdir| {
                if let Some(path) = path {
                    conflicts.push(path.display().to_string());
                }
                true
            });
            self.repo.checkout_tree(&object, Some(&mut opts))
        };

        match result {
            Ok(()) if conflicts.is_empty() => Ok(()),
            Ok(()) => Err(StoreError::CheckoutConflict { paths: conflicts }),
            Err(e) if e.code() == git2::ErrorCode::Conflict => {
                Err(StoreError::CheckoutConflict { paths: conflicts })
            }
            Err(e) => Err(StoreError::from_git2(e, commit.as_str())),
        }
    }

    /// Reset the repository to a commit with git's soft/mixed/hard
    /// semantics (branch ref moved, or HEAD when detached).
    pub fn reset(&self, commit: &Oid, kind: ResetKind) -> Result<(), StoreError> {
        let object = self
            .repo
            .find_object(to_git_oid(commit)?, None)
            .map_err(|e| StoreError::from_git2(e, commit.as_str()))?;
        let kind = match kind {
            ResetKind::Soft => git2::ResetType::Soft,
            ResetKind::Mixed => git2::ResetType::Mixed,
            ResetKind::Hard => git2::ResetType::Hard,
        };
        self.repo
            .reset(&object, kind, None)
            .map_err(|e| StoreError::from_git2(e, commit.as_str()))
    }

    // =========================================================================
    // Merging
    // =========================================================================

    /// Replay `commit` (with parent `parent`) onto `onto` as an in-memory
    /// tree merge, with explicit resolutions for the given gitlink paths.
    ///
    /// Gitlink overrides are applied before conflict inspection, so only
    /// content-level conflicts are ever reported. Nothing is written to the
    /// working directory or the on-disk index.
    pub fn replay_tree(
        &self,
        onto: &Oid,
        parent: &Oid,
        commit: &Oid,
        gitlinks: &[GitlinkUpdate],
    ) -> Result<MergeResolution, StoreError> {
        let ancestor = self.commit_tree(parent)?;
        let ours = self.commit_tree(onto)?;
        let theirs = self.commit_tree(commit)?;

        let mut index = self
            .repo
            .merge_trees(&ancestor, &ours, &theirs, None)
            .map_err(|e| StoreError::Internal {
                message: e.message().to_string(),
            })?;

        for update in gitlinks {
            match &update.target {
                Some(target) => {
                    let entry =
                        raw_index_entry(&update.path, to_git_oid(target)?, GITLINK_MODE as u32);
                    index.add(&entry).map_err(|e| StoreError::Internal {
                        message: format!("resolving {}: {}", update.path.display(), e.message()),
                    })?;
                }
                None => {
                    // Dropping the path also clears its conflict entries
                    let _ = index.remove_path(&update.path);
                }
            }
        }

        if index.has_conflicts() {
            return Ok(MergeResolution::Conflicts(conflict_paths(&index)?));
        }
        let tree = index
            .write_tree_to(&self.repo)
            .map_err(|e| StoreError::Internal {
                message: e.message().to_string(),
            })?;
        Ok(MergeResolution::Clean(from_git_oid(tree)?))
    }

    /// Cherry-pick a single commit onto `onto` in memory, returning the
    /// merged tree. No commit is created and nothing on disk changes.
    pub fn cherrypick_one(&self, pick: &Oid, onto: &Oid) -> Result<MergeResolution, StoreError> {
        let pick = self.find_commit(pick)?;
        let onto = self.find_commit(onto)?;
        let mut index = self
            .repo
            .cherrypick_commit(&pick, &onto, 0, None)
            .map_err(|e| StoreError::Internal {
                message: e.message().to_string(),
            })?;
        if index.has_conflicts() {
            return Ok(MergeResolution::Conflicts(conflict_paths(&index)?));
        }
        let tree = index
            .write_tree_to(&self.repo)
            .map_err(|e| StoreError::Internal {
                message: e.message().to_string(),
            })?;
        Ok(MergeResolution::Clean(from_git_oid(tree)?))
    }

    // =========================================================================
    // Fetch
    // =========================================================================

    /// Make sure `target` exists locally, fetching from `url` if needed.
    ///
    /// Tries a direct sha fetch first; remotes that refuse bare shas get
    /// their heads mirrored into a temporary ref namespace instead, which
    /// is deleted right after.
    pub fn fetch_commit(&self, url: &str, target: &Oid) -> Result<(), StoreError> {
        if self.contains_commit(target)? {
            return Ok(());
        }
        tracing::debug!(url, commit = %target.short(12), "fetching missing commit");

        let mut remote = self
            .repo
            .remote_anonymous(url)
            .map_err(|e| StoreError::FetchFailed {
                url: url.to_string(),
                message: e.message().to_string(),
            })?;

        if remote.fetch(&[target.as_str()], None, None).is_err() {
            remote
                .fetch(&[FALLBACK_FETCH_REFSPEC], None, None)
                .map_err(|e| StoreError::FetchFailed {
                    url: url.to_string(),
                    message: e.message().to_string(),
                })?;
            self.drop_refs_with_prefix(FALLBACK_FETCH_PREFIX)?;
        }

        if self.contains_commit(target)? {
            Ok(())
        } else {
            Err(StoreError::FetchFailed {
                url: url.to_string(),
                message: format!("commit {} not found on remote", target.short(12)),
            })
        }
    }

    // =========================================================================
    // Submodule registry file
    // =========================================================================

    /// Raw `submodule.<name>.url` pairs from the `.gitmodules` tracked at
    /// `commit`, or empty when the commit has no registry file.
    ///
    /// The registry encoding is git-config syntax; parsing stays behind
    /// this doorway so the meta layer only ever sees the mapping. Reading
    /// from the commit rather than the working tree matters: mutations
    /// resolve URLs for the state they are moving *to*, before any
    /// working-tree update.
    pub fn submodule_urls_at(&self, commit: &Oid) -> Result<Vec<(String, String)>, StoreError> {
        let Some((blob_id, _mode)) = self.tree_entry_at(commit, Path::new(".gitmodules"))? else {
            return Ok(Vec::new());
        };
        let blob = self
            .repo
            .find_blob(to_git_oid(&blob_id)?)
            .map_err(|e| StoreError::from_git2(e, blob_id.as_str()))?;

        // git2's config parser only reads files; stage the blob under the
        // git dir and clean it up after.
        let dir = self.repo.path().join("gitweave");
        std::fs::create_dir_all(&dir).map_err(|e| StoreError::Internal {
            message: format!("creating {}: {}", dir.display(), e),
        })?;
        let staged = dir.join("gitmodules.read");
        std::fs::write(&staged, blob.content()).map_err(|e| StoreError::Internal {
            message: format!("writing {}: {}", staged.display(), e),
        })?;
        let urls = parse_submodule_config(&staged);
        let _ = std::fs::remove_file(&staged);
        urls
    }

    fn drop_refs_with_prefix(&self, prefix: &str) -> Result<(), StoreError> {
        let pattern = format!("{}*", prefix);
        let refs = self
            .repo
            .references_glob(&pattern)
            .map_err(|e| StoreError::Internal {
                message: e.message().to_string(),
            })?;
        for reference in refs {
            let mut reference = reference.map_err(|e| StoreError::Internal {
                message: e.message().to_string(),
            })?;
            reference.delete().map_err(|e| StoreError::Internal {
                message: e.message().to_string(),
            })?;
        }
        Ok(())
    }
}

fn parse_submodule_config(path: &Path) -> Result<Vec<(String, String)>, StoreError> {
    let config = git2::Config::open(path).map_err(|e| StoreError::Internal {
        message: format!("reading {}: {}", path.display(), e.message()),
    })?;
    let mut entries = config
        .entries(Some("submodule.*.url"))
        .map_err(|e| StoreError::Internal {
            message: e.message().to_string(),
        })?;

    let mut urls = Vec::new();
    while let Some(entry) = entries.next() {
        let entry = entry.map_err(|e| StoreError::Internal {
            message: e.message().to_string(),
        })?;
        if let (Some(name), Some(value)) = (entry.name(), entry.value()) {
            if let Some(sub) = name
                .strip_prefix("submodule.")
                .and_then(|n| n.strip_suffix(".url"))
            {
                urls.push((sub.to_string(), value.to_string()));
            }
        }
    }
    Ok(urls)
}

fn to_git_oid(oid: &Oid) -> Result<git2::Oid, StoreError> {
    git2::Oid::from_str(oid.as_str()).map_err(|_| StoreError::InvalidOid {
        oid: oid.as_str().to_string(),
    })
}

fn from_git_oid(oid: git2::Oid) -> Result<Oid, StoreError> {
    Ok(Oid::new(oid.to_string())?)
}

fn diff_side(file: git2::DiffFile<'_>) -> Result<Option<TreeEntryInfo>, StoreError> {
    if file.id().is_zero() {
        return Ok(None);
    }
    Ok(Some(TreeEntryInfo {
        id: from_git_oid(file.id())?,
        is_gitlink: file.mode() == git2::FileMode::Commit,
    }))
}

fn conflict_paths(index: &git2::Index) -> Result<Vec<String>, StoreError> {
    let conflicts = index.conflicts().map_err(|e| StoreError::Internal {
        message: e.message().to_string(),
    })?;
    let mut paths = Vec::new();
    for conflict in conflicts {
        let conflict = conflict.map_err(|e| StoreError::Internal {
            message: e.message().to_string(),
        })?;
        let entry = conflict
            .our
            .or(conflict.their)
            .or(conflict.ancestor);
        if let Some(entry) = entry {
            paths.push(String::from_utf8_lossy(&entry.path).to_string());
        }
    }
    paths.sort();
    paths.dedup();
    Ok(paths)
}

fn raw_index_entry(path: &Path, id: git2::Oid, mode: u32) -> git2::IndexEntry {
    git2::IndexEntry {
        ctime: git2::IndexTime::new(0, 0),
        mtime: git2::IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode,
        uid: 0,
        gid: 0,
        file_size: 0,
        id,
        flags: 0,
        flags_extended: 0,
        path: path.to_string_lossy().as_bytes().to_vec(),
    }
}
