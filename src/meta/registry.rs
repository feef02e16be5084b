//! meta::registry
//!
//! The submodule registry: a tracked file at a fixed path inside the meta
//! tree, mapping submodule name to URL. The textual encoding is read behind
//! the object-store doorway; this module only exposes the mapping and the
//! URL resolution rules.
//!
//! Registry URLs may be relative (`./x`, `../x`), in which case they are
//! resolved against the meta repository's own remote URL, the convention
//! used when a meta repository and its submodules live side by side on the
//! same host.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::types::{Oid, SubmoduleName};
use crate::git::{ObjectStore, StoreError};

/// Errors from registry lookups.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The registry has no entry for the submodule.
    #[error("submodule '{name}' is not in the registry")]
    MissingEntry {
        /// The submodule that was looked up
        name: SubmoduleName,
    },

    /// A relative URL cannot be resolved without a meta remote URL.
    #[error("submodule '{name}' has a relative url but the meta repository has no remote url")]
    NoBaseUrl {
        /// The submodule with the relative URL
        name: SubmoduleName,
    },
}

/// The `name → url` mapping read from the registry file.
#[derive(Debug, Clone, Default)]
pub struct SubmoduleRegistry {
    urls: BTreeMap<SubmoduleName, String>,
}

impl SubmoduleRegistry {
    /// Load the registry as tracked at `commit`.
    ///
    /// A commit without a registry file yields an empty registry; entries
    /// with names that cannot be valid submodule paths are skipped.
    pub fn load_at(store: &ObjectStore, commit: &Oid) -> Result<Self, StoreError> {
        let mut urls = BTreeMap::new();
        for (name, url) in store.submodule_urls_at(commit)? {
            if let Ok(name) = SubmoduleName::new(&name) {
                urls.insert(name, url);
            }
        }
        Ok(Self { urls })
    }

    /// Build a registry from an explicit mapping (tests, tooling).
    pub fn from_entries(entries: impl IntoIterator<Item = (SubmoduleName, String)>) -> Self {
        Self {
            urls: entries.into_iter().collect(),
        }
    }

    /// Raw URL for a submodule, if registered.
    pub fn url(&self, name: &SubmoduleName) -> Option<&str> {
        self.urls.get(name).map(String::as_str)
    }

    /// URL for a submodule with relative entries resolved against the meta
    /// repository's own remote URL.
    pub fn resolved_url(
        &self,
        name: &SubmoduleName,
        meta_url: Option<&str>,
    ) -> Result<String, RegistryError> {
        let raw = self.url(name).ok_or_else(|| RegistryError::MissingEntry {
            name: name.clone(),
        })?;
        if !is_relative(raw) {
            return Ok(raw.to_string());
        }
        let base = meta_url.ok_or_else(|| RegistryError::NoBaseUrl { name: name.clone() })?;
        resolve_relative(base, raw).ok_or_else(|| RegistryError::NoBaseUrl { name: name.clone() })
    }
}

fn is_relative(url: &str) -> bool {
    url.starts_with("./") || url.starts_with("../")
}

/// Resolve `./` and `../` segments of `relative` against `base`.
///
/// Each `../` drops one path component of the base URL. Returns `None`
/// when the base runs out of components.
fn resolve_relative(base: &str, relative: &str) -> Option<String> {
    let mut base = base.trim_end_matches('/').to_string();
    let mut rest = relative;
    loop {
        if let Some(r) = rest.strip_prefix("./") {
            rest = r;
        } else if let Some(r) = rest.strip_prefix("../") {
            base.truncate(base.rfind('/')?);
            rest = r;
        } else {
            break;
        }
    }
    Some(format!("{}/{}", base, rest))
}
