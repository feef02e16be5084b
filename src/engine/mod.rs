//! engine
//!
//! The cross-repository mutation engine: plan derivation, consistency
//! validation, and the checkout/reset/cherry-pick executors.
//!
//! # Lifecycle
//!
//! Every mutating operation follows the same shape:
//!
//! ```text
//! resolve -> fetch missing targets -> validate (dry run) -> execute
//! ```
//!
//! Validation is side-effect-free and collects every blocking problem
//! across the meta repository and all affected submodules before reporting.
//! Execution mutates the meta repository first, then fans submodule
//! mutations out over per-submodule worker tasks. Execution-phase failures
//! abort remaining steps but are **not** rolled back; already-mutated
//! repositories stay mutated and the operation surfaces as failed.
//!
//! # Errors
//!
//! [`UserError`] is the single user-facing kind: a multi-line report
//! listing every collected problem. Everything else ([`StoreError`] and
//! friends) is internal and propagates unmodified.

pub mod checkout;
pub mod cherry_pick;
pub mod fanout;
pub mod reset;
pub mod resolve;
pub mod validate;

pub use checkout::{checkout_commit, execute_plan};
pub use cherry_pick::{cherry_pick, CherrypickResult};
pub use reset::{reset, reset_paths};
pub use resolve::{derive_checkout_plan, CheckoutPlan, NewBranch, Tracking};
pub use validate::{validate, SubmoduleMove};

use std::path::PathBuf;

use thiserror::Error;

use crate::core::paths::PathError;
use crate::git::StoreError;
use crate::meta::registry::RegistryError;

/// Execution context for commands.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}

/// The user-facing error kind: every actionable problem collected during
/// an operation, one per line.
#[derive(Debug, Error)]
pub struct UserError {
    problems: Vec<String>,
}

impl UserError {
    /// A report with a single problem.
    pub fn new(problem: impl Into<String>) -> Self {
        Self {
            problems: vec![problem.into()],
        }
    }

    /// A report carrying every collected problem.
    pub fn from_problems(problems: Vec<String>) -> Self {
        Self { problems }
    }

    /// The collected problems.
    pub fn problems(&self) -> &[String] {
        &self.problems
    }

    /// Consume the report, yielding its problems.
    pub fn into_problems(self) -> Vec<String> {
        self.problems
    }
}

impl std::fmt::Display for UserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.problems.join("\n"))
    }
}

/// Errors from engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Actionable, expected failure; shown to the user as-is.
    #[error(transparent)]
    User(#[from] UserError),

    /// Object-store failure, propagated unmodified.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Submodule registry failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Path resolution failure.
    #[error(transparent)]
    Path(#[from] PathError),

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
    /// Shorthand for a single-problem user error.
    pub fn user(problem: impl Into<String>) -> Self {
        EngineError::User(UserError::new(problem))
    }
}
