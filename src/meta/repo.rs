//! meta::repo
//!
//! The meta-repository handle and the open/closed lifecycle of submodules.
//!
//! A submodule is *open* when its working tree is materialized under the
//! meta workdir (`<workdir>/<name>/.git` exists), *closed* when only the
//! gitlink pointer exists. Engine operations never open or mutate a closed
//! submodule, with one exception: cherry-pick materializes a submodule to
//! apply a replayed change.
//!
//! # The workdir shield
//!
//! Raw tree operations against the meta repository (checkout, hard reset)
//! must not see open submodules, or the generic checkout machinery would
//! try to materialize a nested repository as a plain directory. The
//! [`WorkdirShield`] detaches each open submodule's `.git` binding before
//! the raw operation and guarantees restoration on every exit path,
//! success, error or panic.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::types::{Oid, SubmoduleName};
use crate::git::{CheckoutStrategy, ObjectStore, StoreError};
use crate::meta::registry::SubmoduleRegistry;

/// The meta repository: workdir, object store, and the submodule forest
/// around it.
#[derive(Debug)]
pub struct MetaRepo {
    store: ObjectStore,
    workdir: PathBuf,
    remote: String,
}

impl MetaRepo {
    /// Discover the meta repository containing `path`.
    ///
    /// `remote` names the remote whose URL anchors relative submodule URLs
    /// (usually `origin`).
    pub fn discover(path: &Path, remote: impl Into<String>) -> Result<Self, StoreError> {
        let store = ObjectStore::discover(path)?;
        let workdir = store.workdir()?.to_path_buf();
        Ok(Self {
            store,
            workdir,
            remote: remote.into(),
        })
    }

    /// The meta repository's object store.
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// The meta working directory.
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// URL of the meta repository's own remote, if configured.
    pub fn remote_url(&self) -> Result<Option<String>, StoreError> {
        self.store.remote_url(&self.remote)
    }

    /// Load the submodule registry as tracked at `commit`.
    pub fn registry_at(&self, commit: &Oid) -> Result<SubmoduleRegistry, StoreError> {
        SubmoduleRegistry::load_at(&self.store, commit)
    }

    /// Absolute working directory of a submodule.
    pub fn submodule_workdir(&self, name: &SubmoduleName) -> PathBuf {
        self.workdir.join(name.as_rel_path())
    }

    /// Whether a submodule is materialized on disk.
    pub fn is_open(&self, name: &SubmoduleName) -> bool {
        self.submodule_workdir(name).join(".git").exists()
    }

    /// Names of all currently open submodules.
    ///
    /// Candidates come from the gitlinks known to the index and to HEAD
    /// (a staged addition or removal must not hide a materialized
    /// repository), filtered to those with a working tree on disk.
    pub fn open_submodules(&self) -> Result<Vec<SubmoduleName>, StoreError> {
        let mut candidates: BTreeSet<SubmoduleName> =
            self.store.index_gitlinks()?.into_keys().collect();
        if let Some(head) = self.store.try_head_commit()? {
            candidates.extend(self.store.gitlink_entries(&head)?.into_keys());
        }
        Ok(candidates
            .into_iter()
            .filter(|name| self.is_open(name))
            .collect())
    }

    /// Open the object store of a materialized submodule.
    pub fn open_submodule_store(&self, name: &SubmoduleName) -> Result<ObjectStore, StoreError> {
        ObjectStore::open(&self.submodule_workdir(name))
    }

    /// Materialize a submodule at `target`: initialize the repository if
    /// needed, wire its origin, fetch the commit and check it out detached.
    pub fn materialize_submodule(
        &self,
        name: &SubmoduleName,
        url: &str,
        target: &Oid,
    ) -> Result<ObjectStore, StoreError> {
        let path = self.submodule_workdir(name);
        fs::create_dir_all(&path).map_err(|e| StoreError::Internal {
            message: format!("creating {}: {}", path.display(), e),
        })?;
        let store = if path.join(".git").exists() {
            ObjectStore::open(&path)?
        } else {
            tracing::debug!(submodule = %name, "materializing closed submodule");
            ObjectStore::init_at(&path)?
        };
        store.ensure_remote("origin", url)?;
        store.fetch_commit(url, target)?;
        store.checkout_tree(target, CheckoutStrategy::Force)?;
        store.detach_head(target)?;
        Ok(store)
    }

    /// Close a submodule: remove its working tree, leaving only the
    /// gitlink pointer at the meta level.
    pub fn close_submodule(&self, name: &SubmoduleName) -> Result<(), StoreError> {
        let path = self.submodule_workdir(name);
        if path.exists() {
            fs::remove_dir_all(&path).map_err(|e| StoreError::Internal {
                message: format!("removing {}: {}", path.display(), e),
            })?;
        }
        Ok(())
    }

    /// Detach the `.git` bindings of the given submodules for the duration
    /// of a raw tree operation. Restoration happens in the guard's `Drop`,
    /// on every exit path.
    pub fn shield_submodules(
        &self,
        names: &[SubmoduleName],
    ) -> Result<WorkdirShield, StoreError> {
        let park_root = self.store.git_dir().join("gitweave").join("shield");
        fs::create_dir_all(&park_root).map_err(|e| StoreError::Internal {
            message: format!("creating {}: {}", park_root.display(), e),
        })?;

        let mut shield = WorkdirShield { parked: Vec::new() };
        for name in names {
            let binding = self.submodule_workdir(name).join(".git");
            if !binding.exists() {
                continue;
            }
            let parked = park_root.join(name.as_str().replace('/', "__"));
            if let Err(e) = fs::rename(&binding, &parked) {
                // The guard restores what was already parked
                return Err(StoreError::Internal {
                    message: format!("detaching {}: {}", binding.display(), e),
                });
            }
            shield.parked.push((binding, parked));
        }
        Ok(shield)
    }
}

/// RAII guard over detached submodule bindings. See
/// [`MetaRepo::shield_submodules`].
#[derive(Debug)]
pub struct WorkdirShield {
    /// `(original binding path, parked path)` pairs, in detach order.
    parked: Vec<(PathBuf, PathBuf)>,
}

impl WorkdirShield {
    /// Number of detached bindings (visible for tests and tracing).
    pub fn len(&self) -> usize {
        self.parked.len()
    }

    /// Whether the shield detached anything.
    pub fn is_empty(&self) -> bool {
        self.parked.is_empty()
    }
}

impl Drop for WorkdirShield {
    fn drop(&mut self) {
        for (binding, parked) in self.parked.drain(..).rev() {
            if let Err(err) = fs::rename(&parked, &binding) {
                // Cannot propagate from Drop; leave a loud trace instead
                tracing::error!(
                    binding = %binding.display(),
                    error = %err,
                    "failed to restore submodule binding"
                );
            }
        }
    }
}
