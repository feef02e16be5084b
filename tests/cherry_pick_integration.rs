//! Integration tests for the cherry-pick engine: replaying a meta commit
//! across the submodule forest with all-or-nothing semantics.

mod common;

use common::{git_output, oid, run_git, MetaFixture};
use gitweave::engine::{cherry_pick, EngineError};
use gitweave::meta::MetaRepo;

fn meta_repo(fx: &MetaFixture) -> MetaRepo {
    MetaRepo::discover(&fx.meta_path(), "origin").unwrap()
}

fn gitlink_at_head(fx: &MetaFixture, name: &str) -> String {
    git_output(&fx.meta_path(), &["rev-parse", &format!("HEAD:{name}")])
}

// =============================================================================
// Gitlink replay
// =============================================================================

/// The canonical scenario: meta HEAD records submodule `s` at `x`; the
/// picked commit moves the gitlink to `z`, introduced in the submodule by
/// the chain `x -> y -> z`. The pick must create fresh submodule commits
/// (content-identical, new ids) and point the new gitlink at the replayed
/// tip.
#[tokio::test]
async fn replays_gitlink_update_with_fresh_commits() {
    let fx = MetaFixture::new();
    let x = fx.create_source("s");
    fx.stage_gitlink("s", &x);
    let c2 = fx.commit_meta("record s at x");

    let y = fx.commit_source("s", "f1.txt", "one\n", "add f1");
    let z = fx.commit_source("s", "f2.txt", "two\n", "add f2");

    run_git(&fx.meta_path(), &["checkout", "-b", "side"]);
    fx.stage_gitlink("s", &z);
    let c8 = fx.commit_meta("move s to z");
    run_git(&fx.meta_path(), &["checkout", "main"]);
    fx.open_submodule("s", &x);

    let result = cherry_pick(&meta_repo(&fx), &oid(&c8)).await.unwrap();

    // The meta branch advanced to a fresh commit reusing c8's message
    assert_ne!(result.new_commit.as_str(), c8);
    assert_eq!(git_output(&fx.meta_path(), &["rev-parse", "main"]), result.new_commit.as_str());
    assert_eq!(
        git_output(&fx.meta_path(), &["log", "-1", "--format=%s"]),
        "move s to z"
    );
    assert_eq!(
        git_output(&fx.meta_path(), &["rev-parse", "HEAD^"]),
        c2
    );

    // The gitlink points at a freshly created submodule commit, not z
    let new_link = gitlink_at_head(&fx, "s");
    assert_ne!(new_link, z);
    assert_eq!(fx.submodule_head("s"), new_link);

    // Content-identical to z
    let sub = fx.submodule_path("s");
    assert_eq!(git_output(&sub, &["show", "HEAD:f1.txt"]), "one");
    assert_eq!(git_output(&sub, &["show", "HEAD:f2.txt"]), "two");

    // Identity map: one entry per replayed commit, z mapping to the tip
    let rewritten = result
        .submodule_commits
        .iter()
        .find(|(name, _)| name.as_str() == "s")
        .map(|(_, map)| map)
        .expect("submodule s must appear in the result");
    assert_eq!(rewritten.len(), 2);
    assert!(rewritten.keys().any(|k| k.as_str() == y));
    assert_eq!(
        rewritten
            .iter()
            .find(|(k, _)| k.as_str() == z)
            .map(|(_, v)| v.as_str())
            .unwrap(),
        new_link
    );
}

#[tokio::test]
async fn replay_opens_a_closed_submodule() {
    let fx = MetaFixture::new();
    let x = fx.create_source("s");
    fx.stage_gitlink("s", &x);
    fx.commit_meta("record s at x");
    let z = fx.commit_source("s", "f.txt", "new\n", "grow");

    run_git(&fx.meta_path(), &["checkout", "-b", "side"]);
    fx.stage_gitlink("s", &z);
    let c8 = fx.commit_meta("move s to z");
    run_git(&fx.meta_path(), &["checkout", "main"]);
    // s stays closed: no working tree under meta/s

    let result = cherry_pick(&meta_repo(&fx), &oid(&c8)).await.unwrap();

    assert!(
        fx.submodule_path("s").join(".git").exists(),
        "cherry-pick must materialize the submodule to apply the change"
    );
    let new_link = gitlink_at_head(&fx, "s");
    assert_eq!(fx.submodule_head("s"), new_link);
    assert_ne!(new_link, z);
    assert!(!result.submodule_commits.is_empty());
}

// =============================================================================
// No-op and structural cases
// =============================================================================

#[tokio::test]
async fn deleting_an_absent_submodule_is_a_noop() {
    let fx = MetaFixture::new();
    let c0 = fx.meta_head();
    let x = fx.create_source("s");

    run_git(&fx.meta_path(), &["checkout", "-b", "side"]);
    fx.stage_gitlink("s", &x);
    fx.commit_meta("add s");
    fx.unstage_gitlink("s");
    let c8 = fx.commit_meta("drop s");
    run_git(&fx.meta_path(), &["checkout", "main"]);

    let result = cherry_pick(&meta_repo(&fx), &oid(&c8)).await.unwrap();

    // A fresh commit is created even though the tree change is a no-op
    assert_ne!(result.new_commit.as_str(), c0);
    assert_eq!(fx.meta_head(), result.new_commit.as_str());
    // No gitlink for s in the result, no identity-map entry
    let link = std::process::Command::new("git")
        .args(["rev-parse", "HEAD:s"])
        .current_dir(fx.meta_path())
        .output()
        .unwrap();
    assert!(!link.status.success(), "s must not exist in the new tree");
    assert!(result.submodule_commits.is_empty());
}

#[tokio::test]
async fn removing_an_unchanged_submodule_closes_it() {
    let fx = MetaFixture::new();
    let x = fx.create_source("s");
    fx.stage_gitlink("s", &x);
    fx.commit_meta("record s at x");

    run_git(&fx.meta_path(), &["checkout", "-b", "side"]);
    fx.unstage_gitlink("s");
    let c8 = fx.commit_meta("drop s");
    run_git(&fx.meta_path(), &["checkout", "main"]);
    fx.open_submodule("s", &x);

    let result = cherry_pick(&meta_repo(&fx), &oid(&c8)).await.unwrap();

    let link = std::process::Command::new("git")
        .args(["rev-parse", "HEAD:s"])
        .current_dir(fx.meta_path())
        .output()
        .unwrap();
    assert!(!link.status.success(), "gitlink must be removed");
    assert!(
        !fx.submodule_path("s").exists(),
        "removed submodule must be closed"
    );
    assert!(result.submodule_commits.is_empty());
}

#[tokio::test]
async fn newly_introduced_submodule_is_adopted_as_recorded() {
    let fx = MetaFixture::new();
    let u = fx.create_source("t");

    run_git(&fx.meta_path(), &["checkout", "-b", "side"]);
    fx.stage_gitlink("t", &u);
    let c8 = fx.commit_meta("introduce t");
    run_git(&fx.meta_path(), &["checkout", "main"]);

    let result = cherry_pick(&meta_repo(&fx), &oid(&c8)).await.unwrap();

    // Adopted at the recorded sha: no rewriting, no identity-map entry
    assert_eq!(gitlink_at_head(&fx, "t"), u);
    assert_eq!(fx.submodule_head("t"), u);
    assert!(fx.submodule_path("t").join(".git").exists());
    assert!(result.submodule_commits.is_empty());
    // The registry entry travelled with the pick
    assert!(fx.meta_path().join(".gitmodules").exists());
}

#[tokio::test]
async fn plain_content_change_is_merged() {
    let fx = MetaFixture::new();
    fx.commit_meta_file("b.txt", "base\n", "base");

    run_git(&fx.meta_path(), &["checkout", "-b", "side"]);
    let c8 = fx.commit_meta_file("b.txt", "picked\n", "change b");
    run_git(&fx.meta_path(), &["checkout", "main"]);
    let c3 = fx.commit_meta_file("other.txt", "unrelated\n", "unrelated");

    let result = cherry_pick(&meta_repo(&fx), &oid(&c8)).await.unwrap();

    assert_eq!(git_output(&fx.meta_path(), &["rev-parse", "HEAD^"]), c3);
    assert_eq!(
        std::fs::read_to_string(fx.meta_path().join("b.txt")).unwrap(),
        "picked\n"
    );
    assert!(result.submodule_commits.is_empty());
}

// =============================================================================
// Conflicts: all-or-nothing
// =============================================================================

#[tokio::test]
async fn conflicting_gitlink_aborts_with_zero_commits() {
    let fx = MetaFixture::new();
    let x = fx.create_source("s");
    fx.stage_gitlink("s", &x);
    fx.commit_meta("record s at x");

    let _y = fx.commit_source("s", "f1.txt", "one\n", "y");
    let z = fx.commit_source("s", "f2.txt", "two\n", "z");
    // A commit off x on a side branch, unrelated to y/z
    run_git(&fx.source_path("s"), &["checkout", "-b", "wild", &x]);
    let w = fx.commit_source("s", "wild.txt", "wild\n", "w");

    run_git(&fx.meta_path(), &["checkout", "-b", "side"]);
    fx.stage_gitlink("s", &z);
    let c8 = fx.commit_meta("move s to z");
    run_git(&fx.meta_path(), &["checkout", "main"]);
    fx.stage_gitlink("s", &w);
    let c3 = fx.commit_meta("move s to w");
    fx.open_submodule("s", &w);

    let meta_commits = fx.commit_count(&fx.meta_path());
    let sub_commits = fx.commit_count(&fx.submodule_path("s"));

    let err = cherry_pick(&meta_repo(&fx), &oid(&c8)).await.unwrap_err();
    let EngineError::User(user) = err else {
        panic!("expected a user error, got {err:?}");
    };
    assert!(user.to_string().contains("changed on both sides"), "{user}");

    // Zero commits created anywhere, nothing moved
    assert_eq!(fx.meta_head(), c3);
    assert_eq!(fx.submodule_head("s"), w);
    assert_eq!(fx.commit_count(&fx.meta_path()), meta_commits);
    assert_eq!(fx.commit_count(&fx.submodule_path("s")), sub_commits);
}

#[tokio::test]
async fn content_conflict_aborts_with_zero_commits() {
    let fx = MetaFixture::new();
    fx.commit_meta_file("b.txt", "base\n", "base");

    run_git(&fx.meta_path(), &["checkout", "-b", "side"]);
    let c8 = fx.commit_meta_file("b.txt", "theirs\n", "their change");
    run_git(&fx.meta_path(), &["checkout", "main"]);
    let c3 = fx.commit_meta_file("b.txt", "ours\n", "our change");

    let before = fx.commit_count(&fx.meta_path());
    let err = cherry_pick(&meta_repo(&fx), &oid(&c8)).await.unwrap_err();

    let EngineError::User(user) = err else {
        panic!("expected a user error, got {err:?}");
    };
    assert!(
        user.to_string().contains("cannot be applied without conflicts"),
        "{user}"
    );
    assert_eq!(fx.meta_head(), c3);
    assert_eq!(fx.commit_count(&fx.meta_path()), before);
}

#[tokio::test]
async fn merge_commits_are_rejected() {
    let fx = MetaFixture::new();
    fx.commit_meta_file("b.txt", "base\n", "base");
    run_git(&fx.meta_path(), &["checkout", "-b", "side"]);
    fx.commit_meta_file("side.txt", "side\n", "side work");
    run_git(&fx.meta_path(), &["checkout", "main"]);
    fx.commit_meta_file("main.txt", "main\n", "main work");
    run_git(&fx.meta_path(), &["merge", "--no-ff", "side", "-m", "merge"]);
    let merge = fx.meta_head();

    let err = cherry_pick(&meta_repo(&fx), &oid(&merge)).await.unwrap_err();
    assert!(
        err.to_string().contains("exactly one parent"),
        "{err}"
    );
}
