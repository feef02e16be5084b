//! git
//!
//! The object-store boundary. [`store::ObjectStore`] is the single doorway
//! to every repository read and write; no other module imports `git2`.

pub mod store;

pub use store::{
    CheckoutStrategy, CommitMeta, DiffEntry, GitlinkUpdate, IndexUpdate, MergeResolution,
    ObjectStore, ResetKind, StoreError, TreeEntryInfo, GITLINK_MODE,
};
