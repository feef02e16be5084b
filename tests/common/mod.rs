//! Shared fixture for integration tests.
//!
//! Builds real repositories through the `git` CLI in a temp dir: a meta
//! repository whose tree carries gitlink entries, plus source repositories
//! that act as submodule origins. Submodules are "opened" by cloning the
//! source into the meta working directory, which is exactly the on-disk
//! shape the engine defines as open (`<workdir>/<name>/.git` exists).

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use gitweave::core::types::Oid;

/// Parse a sha string into an [`Oid`].
pub fn oid(sha: &str) -> Oid {
    Oid::new(sha).expect("fixture produced an invalid sha")
}

/// Run a git command in the given directory, panicking on failure.
pub fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed to spawn");
    if !output.status.success() {
        panic!(
            "git {:?} in {} failed: {}",
            args,
            dir.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

/// Run a git command and return its trimmed stdout.
pub fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("git command failed to spawn");
    if !output.status.success() {
        panic!(
            "git {:?} in {} failed: {}",
            args,
            dir.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8(output.stdout).unwrap().trim().to_string()
}

fn init_repo(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    run_git(dir, &["init", "-b", "main"]);
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["config", "user.name", "Test User"]);
}

/// A meta repository plus submodule source repositories.
pub struct MetaFixture {
    dir: TempDir,
}

impl MetaFixture {
    /// Create the fixture with an initialized meta repository holding one
    /// initial commit.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let fixture = Self { dir };

        init_repo(&fixture.meta_path());
        std::fs::write(fixture.meta_path().join("README.md"), "# meta\n").unwrap();
        run_git(&fixture.meta_path(), &["add", "README.md"]);
        run_git(&fixture.meta_path(), &["commit", "-m", "initial"]);
        fixture
    }

    /// Path of the meta repository working directory.
    pub fn meta_path(&self) -> PathBuf {
        self.dir.path().join("meta")
    }

    /// Path of a submodule source repository.
    pub fn source_path(&self, name: &str) -> PathBuf {
        self.dir.path().join("sources").join(name)
    }

    /// Path of a submodule inside the meta working directory.
    pub fn submodule_path(&self, name: &str) -> PathBuf {
        self.meta_path().join(name)
    }

    /// Create a submodule source repository with one initial commit,
    /// returning that commit's sha.
    pub fn create_source(&self, name: &str) -> String {
        let path = self.source_path(name);
        init_repo(&path);
        std::fs::write(path.join("README.md"), format!("# {name}\n")).unwrap();
        run_git(&path, &["add", "README.md"]);
        run_git(&path, &["commit", "-m", "initial"]);
        git_output(&path, &["rev-parse", "HEAD"])
    }

    /// Commit a file change in a source repository, returning the new sha.
    pub fn commit_source(&self, name: &str, file: &str, content: &str, message: &str) -> String {
        let path = self.source_path(name);
        std::fs::write(path.join(file), content).unwrap();
        run_git(&path, &["add", file]);
        run_git(&path, &["commit", "-m", message]);
        git_output(&path, &["rev-parse", "HEAD"])
    }

    /// Commit a file change in the meta repository, returning the new sha.
    pub fn commit_meta_file(&self, file: &str, content: &str, message: &str) -> String {
        let path = self.meta_path();
        std::fs::write(path.join(file), content).unwrap();
        run_git(&path, &["add", file]);
        run_git(&path, &["commit", "-m", message]);
        git_output(&path, &["rev-parse", "HEAD"])
    }

    /// Stage a gitlink for `name` at `sha` and register the submodule in
    /// `.gitmodules` with the source repository as its URL.
    pub fn stage_gitlink(&self, name: &str, sha: &str) {
        let meta = self.meta_path();
        run_git(
            &meta,
            &[
                "update-index",
                "--add",
                "--cacheinfo",
                &format!("160000,{},{}", sha, name),
            ],
        );
        let gitmodules = meta.join(".gitmodules");
        let mut content = if gitmodules.exists() {
            std::fs::read_to_string(&gitmodules).unwrap()
        } else {
            String::new()
        };
        let header = format!("[submodule \"{name}\"]");
        if !content.contains(&header) {
            content.push_str(&format!(
                "{header}\n\tpath = {name}\n\turl = {}\n",
                self.source_path(name).display()
            ));
            std::fs::write(&gitmodules, content).unwrap();
            run_git(&meta, &["add", ".gitmodules"]);
        }
    }

    /// Remove a gitlink from the meta index.
    pub fn unstage_gitlink(&self, name: &str) {
        run_git(&self.meta_path(), &["update-index", "--force-remove", name]);
    }

    /// Commit the meta index as-is, returning the new sha.
    pub fn commit_meta(&self, message: &str) -> String {
        run_git(&self.meta_path(), &["commit", "-m", message]);
        git_output(&self.meta_path(), &["rev-parse", "HEAD"])
    }

    /// Materialize a submodule by cloning its source into the meta workdir
    /// and detaching at `sha`.
    pub fn open_submodule(&self, name: &str, sha: &str) {
        let target = self.submodule_path(name);
        if target.exists() {
            std::fs::remove_dir_all(&target).unwrap();
        }
        let output = Command::new("git")
            .args([
                "clone",
                self.source_path(name).to_str().unwrap(),
                target.to_str().unwrap(),
            ])
            .output()
            .expect("git clone failed to spawn");
        assert!(
            output.status.success(),
            "clone failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        run_git(&target, &["config", "user.email", "test@example.com"]);
        run_git(&target, &["config", "user.name", "Test User"]);
        run_git(&target, &["checkout", "--detach", sha]);
    }

    /// Current meta HEAD sha.
    pub fn meta_head(&self) -> String {
        git_output(&self.meta_path(), &["rev-parse", "HEAD"])
    }

    /// Current HEAD sha of an open submodule.
    pub fn submodule_head(&self, name: &str) -> String {
        git_output(&self.submodule_path(name), &["rev-parse", "HEAD"])
    }

    /// Total number of commits reachable from any ref in a repository.
    pub fn commit_count(&self, dir: &Path) -> usize {
        git_output(dir, &["rev-list", "--all", "--count"])
            .parse()
            .unwrap()
    }
}
