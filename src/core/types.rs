//! core::types
//!
//! Strong types for core domain concepts.
//!
//! - [`Oid`] - Git object identifier (SHA)
//! - [`BranchName`] - Validated branch name
//! - [`SubmoduleName`] - Validated submodule name (the gitlink path inside
//!   the meta tree)
//!
//! These types enforce validity at construction time. Invalid values cannot
//! be represented, which keeps the engine free of ad-hoc string checks.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid submodule name: {0}")]
    InvalidSubmoduleName(String),
}

/// A git object identifier, normalized to lowercase hex.
///
/// # Example
///
/// ```
/// use gitweave::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.short(7), "abc123d");
/// assert!(Oid::new("not-a-sha").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        // SHA-1 (40) or SHA-256 (64) hex
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(oid));
        }
        Ok(Self(oid))
    }

    /// Get the full hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Get an abbreviated form for display.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl AsRef<str> for Oid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated git branch name.
///
/// Enforces the refname rules that matter in practice (see
/// `git check-ref-format`): non-empty, not `@`, no leading `.` or `-`, no
/// trailing `/` or `.lock`, no `..`, `@{`, `//`, spaces, control characters
/// or the `~ ^ : \ ? * [` set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let fail = |msg: &str| Err(TypeError::InvalidBranchName(format!("'{name}': {msg}")));

        if name.is_empty() {
            return fail("cannot be empty");
        }
        if name == "@" {
            return fail("'@' is reserved");
        }
        if name.starts_with('.') || name.starts_with('-') {
            return fail("cannot start with '.' or '-'");
        }
        if name.ends_with('/') || name.ends_with(".lock") {
            return fail("cannot end with '/' or '.lock'");
        }
        for seq in ["..", "@{", "//"] {
            if name.contains(seq) {
                return fail("contains a forbidden sequence");
            }
        }
        if name
            .chars()
            .any(|c| c.is_ascii_control() || " ~^:\\?*[".contains(c))
        {
            return fail("contains a forbidden character");
        }
        for component in name.split('/') {
            if component.starts_with('.') || component.ends_with(".lock") {
                return fail("path component cannot start with '.' or end with '.lock'");
            }
        }
        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated submodule name: the slash-separated path of the gitlink
/// entry inside the meta tree.
///
/// Names are always relative, use `/` separators, and may not contain `..`
/// components, so a name can never escape the meta working directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubmoduleName(String);

impl SubmoduleName {
    /// Create a new validated submodule name.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        let fail = |msg: &str| Err(TypeError::InvalidSubmoduleName(format!("'{name}': {msg}")));

        if name.is_empty() {
            return fail("cannot be empty");
        }
        if name.starts_with('/') || name.ends_with('/') {
            return fail("must be a relative path");
        }
        if name.contains('\\') {
            return fail("must use '/' separators");
        }
        if name.split('/').any(|c| c.is_empty() || c == "." || c == "..") {
            return fail("contains an empty, '.' or '..' component");
        }
        Ok(Self(name))
    }

    /// Get the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The name as a relative filesystem path under the meta workdir.
    pub fn as_rel_path(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl TryFrom<String> for SubmoduleName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SubmoduleName> for String {
    fn from(name: SubmoduleName) -> Self {
        name.0
    }
}

impl AsRef<str> for SubmoduleName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubmoduleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod oid {
        use super::*;

        #[test]
        fn accepts_and_normalizes_sha1() {
            let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
            assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
        }

        #[test]
        fn accepts_sha256_length() {
            let hex = "a".repeat(64);
            assert!(Oid::new(hex).is_ok());
        }

        #[test]
        fn rejects_bad_length_and_non_hex() {
            assert!(Oid::new("abc123").is_err());
            assert!(Oid::new("g".repeat(40)).is_err());
        }

        #[test]
        fn short_truncates() {
            let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
            assert_eq!(oid.short(7), "abc123d");
            assert_eq!(oid.short(100).len(), 40);
        }
    }

    mod branch_name {
        use super::*;

        #[test]
        fn accepts_common_names() {
            for name in ["main", "feature/my-branch", "user@feature", "v1.2.3"] {
                assert!(BranchName::new(name).is_ok(), "{name}");
            }
        }

        #[test]
        fn rejects_invalid_names() {
            for name in [
                "",
                "@",
                ".hidden",
                "-flag",
                "branch.lock",
                "a..b",
                "a@{b",
                "a//b",
                "has space",
                "tilde~1",
                "trailing/",
                "nested/.hidden",
            ] {
                assert!(BranchName::new(name).is_err(), "{name}");
            }
        }
    }

    mod submodule_name {
        use super::*;

        #[test]
        fn accepts_nested_names() {
            assert!(SubmoduleName::new("libs/parser").is_ok());
            assert!(SubmoduleName::new("vendor").is_ok());
        }

        #[test]
        fn rejects_escaping_names() {
            for name in ["", "/abs", "trailing/", "a//b", "../up", "a/./b", "a\\b"] {
                assert!(SubmoduleName::new(name).is_err(), "{name}");
            }
        }

        #[test]
        fn rel_path_round_trips() {
            let name = SubmoduleName::new("libs/parser").unwrap();
            assert_eq!(name.as_rel_path(), std::path::Path::new("libs/parser"));
        }
    }
}
