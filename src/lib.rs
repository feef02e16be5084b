//! gitweave - multi-repository mutations that feel like single-repository ones
//!
//! gitweave manages a meta-repository: a top-level git repository whose tree
//! contains gitlink entries pointing at commits in independently versioned
//! submodules. Checkout, reset and cherry-pick are propagated from the meta
//! level into every open submodule, with a consistency pre-flight that
//! reports every blocking problem at once.
//!
//! # Architecture
//!
//! The codebase follows a strict layered architecture:
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Resolution, validation and execution of cross-repository
//!   mutations
//! - [`meta`] - Meta-repository model: registry, status snapshots, open
//!   submodules
//! - [`git`] - Single interface for all object-store operations
//! - [`core`] - Domain types, path routing, configuration
//! - [`ui`] - User interaction utilities
//!
//! # Correctness Invariants
//!
//! 1. Closed submodules are never mutated, except when cherry-pick
//!    materializes one to apply a replayed change
//! 2. Validation is side-effect-free and collects every problem before
//!    reporting
//! 3. The meta repository's own mutation happens before any dependent
//!    submodule mutation
//! 4. Cherry-pick is all-or-nothing: a conflict anywhere leaves no visible
//!    commit anywhere

pub mod cli;
pub mod core;
pub mod engine;
pub mod git;
pub mod meta;
pub mod ui;
