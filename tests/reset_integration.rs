//! Integration tests for the reset engine: soft/mixed/hard semantics,
//! hard-reset propagation into open submodules, and index-only
//! path-scoped resets that cross submodule boundaries.

mod common;

use common::{git_output, oid, run_git, MetaFixture};
use gitweave::engine::{reset, reset_paths, EngineError};
use gitweave::git::ResetKind;
use gitweave::meta::MetaRepo;

/// Meta history: `c1` has `a.txt = v1` and submodule `s` at `x`; `c2` has
/// `a.txt = v2` and `s` at `y`. HEAD ends on `main` at `c2` with `s` open
/// at `y`.
struct ResetScenario {
    fx: MetaFixture,
    x: String,
    y: String,
    c1: String,
    c2: String,
}

fn scenario() -> ResetScenario {
    let fx = MetaFixture::new();
    let x = fx.create_source("s");
    let y = fx.commit_source("s", "f.txt", "v2\n", "second");

    fx.stage_gitlink("s", &x);
    let c1 = fx.commit_meta_file("a.txt", "v1\n", "c1");
    fx.stage_gitlink("s", &y);
    let c2 = fx.commit_meta_file("a.txt", "v2\n", "c2");
    fx.open_submodule("s", &y);

    ResetScenario { fx, x, y, c1, c2 }
}

fn meta_repo(fx: &MetaFixture) -> MetaRepo {
    MetaRepo::discover(&fx.meta_path(), "origin").unwrap()
}

fn staged_content(fx: &MetaFixture, path: &str) -> String {
    git_output(&fx.meta_path(), &["show", &format!(":{path}")])
}

// =============================================================================
// Whole-repository resets
// =============================================================================

#[tokio::test]
async fn soft_reset_moves_ref_only() {
    let s = scenario();
    reset(&meta_repo(&s.fx), &oid(&s.c1), ResetKind::Soft)
        .await
        .unwrap();

    assert_eq!(s.fx.meta_head(), s.c1);
    // Branch ref moved, not just HEAD
    assert_eq!(git_output(&s.fx.meta_path(), &["rev-parse", "main"]), s.c1);
    // Index and working tree untouched
    assert_eq!(staged_content(&s.fx, "a.txt"), "v2");
    assert_eq!(
        std::fs::read_to_string(s.fx.meta_path().join("a.txt")).unwrap(),
        "v2\n"
    );
    assert_eq!(s.fx.submodule_head("s"), s.y);
}

#[tokio::test]
async fn mixed_reset_replaces_index_only() {
    let s = scenario();
    reset(&meta_repo(&s.fx), &oid(&s.c1), ResetKind::Mixed)
        .await
        .unwrap();

    assert_eq!(s.fx.meta_head(), s.c1);
    assert_eq!(staged_content(&s.fx, "a.txt"), "v1");
    // Working trees untouched, including the submodule's
    assert_eq!(
        std::fs::read_to_string(s.fx.meta_path().join("a.txt")).unwrap(),
        "v2\n"
    );
    assert_eq!(s.fx.submodule_head("s"), s.y);
}

#[tokio::test]
async fn hard_reset_propagates_to_open_submodules() {
    let s = scenario();

    // Local submodule changes are discarded, hard reset is destructive
    let marker = s.fx.submodule_path("s").join("dirty.txt");
    std::fs::write(&marker, "dirty\n").unwrap();
    run_git(&s.fx.submodule_path("s"), &["add", "dirty.txt"]);

    reset(&meta_repo(&s.fx), &oid(&s.c1), ResetKind::Hard)
        .await
        .unwrap();

    assert_eq!(s.fx.meta_head(), s.c1);
    assert_eq!(
        std::fs::read_to_string(s.fx.meta_path().join("a.txt")).unwrap(),
        "v1\n"
    );
    assert_eq!(s.fx.submodule_head("s"), s.x);
    assert!(!marker.exists(), "hard reset must discard submodule changes");
}

#[tokio::test]
async fn hard_reset_skips_submodules_absent_from_target() {
    let fx = MetaFixture::new();
    let base = fx.meta_head();
    let x = fx.create_source("s");
    fx.stage_gitlink("s", &x);
    let c1 = fx.commit_meta("add s");
    fx.open_submodule("s", &x);

    reset(&meta_repo(&fx), &oid(&base), ResetKind::Hard)
        .await
        .unwrap();

    assert_eq!(fx.meta_head(), base);
    // No gitlink at the target: the open submodule is left alone
    assert_eq!(fx.submodule_head("s"), x);
    let _ = c1;
}

// =============================================================================
// Path-scoped resets
// =============================================================================

#[test]
fn reset_paths_changes_index_never_workdir() {
    let s = scenario();
    reset_paths(
        &meta_repo(&s.fx),
        &s.fx.meta_path(),
        &oid(&s.c1),
        &["a.txt".into()],
    )
    .unwrap();

    // Index holds the blob at c1:a.txt, the file on disk keeps v2
    assert_eq!(staged_content(&s.fx, "a.txt"), "v1");
    assert_eq!(
        std::fs::read_to_string(s.fx.meta_path().join("a.txt")).unwrap(),
        "v2\n"
    );
    // HEAD did not move
    assert_eq!(s.fx.meta_head(), s.c2);
}

#[test]
fn reset_paths_recurses_into_open_submodule_at_its_own_head() {
    let s = scenario();
    let sub = s.fx.submodule_path("s");

    // Stage a modification inside the submodule
    std::fs::write(sub.join("f.txt"), "staged change\n").unwrap();
    run_git(&sub, &["add", "f.txt"]);

    // The meta commit passed in is irrelevant for the submodule side; the
    // recursion targets the submodule's own HEAD (y)
    reset_paths(
        &meta_repo(&s.fx),
        &s.fx.meta_path(),
        &oid(&s.c2),
        &["s/f.txt".into()],
    )
    .unwrap();

    assert_eq!(git_output(&sub, &["show", ":f.txt"]), "v2");
    assert_eq!(
        std::fs::read_to_string(sub.join("f.txt")).unwrap(),
        "staged change\n"
    );
    // The meta-level gitlink is untouched
    assert_eq!(staged_content(&s.fx, "s"), s.y);
}

#[test]
fn reset_paths_on_mount_point_restores_submodule_index() {
    let s = scenario();
    let sub = s.fx.submodule_path("s");
    std::fs::write(sub.join("f.txt"), "staged change\n").unwrap();
    run_git(&sub, &["add", "f.txt"]);

    reset_paths(
        &meta_repo(&s.fx),
        &s.fx.meta_path(),
        &oid(&s.c2),
        &["s".into()],
    )
    .unwrap();

    let staged = git_output(&sub, &["diff", "--cached", "--name-only"]);
    assert!(staged.is_empty(), "submodule index should match its HEAD");
    assert_eq!(
        std::fs::read_to_string(sub.join("f.txt")).unwrap(),
        "staged change\n"
    );
}

#[test]
fn reset_paths_resolves_relative_to_cwd() {
    let s = scenario();
    let sub = s.fx.submodule_path("s");
    std::fs::write(sub.join("f.txt"), "staged change\n").unwrap();
    run_git(&sub, &["add", "f.txt"]);

    // From inside the submodule directory, a bare file name still
    // classifies into the submodule
    reset_paths(&meta_repo(&s.fx), &sub, &oid(&s.c2), &["f.txt".into()]).unwrap();

    assert_eq!(git_output(&sub, &["show", ":f.txt"]), "v2");
}

#[test]
fn reset_paths_fails_atomically_on_staged_pointer_mismatch() {
    let s = scenario();

    // Stage a submodule pointer that disagrees with the submodule's
    // checked-out commit (sub HEAD is y, stage x)
    run_git(
        &s.fx.meta_path(),
        &[
            "update-index",
            "--cacheinfo",
            &format!("160000,{},s", s.x),
        ],
    );

    let err = reset_paths(
        &meta_repo(&s.fx),
        &s.fx.meta_path(),
        &oid(&s.c1),
        &["a.txt".into(), "s/f.txt".into()],
    )
    .unwrap_err();

    let EngineError::User(user) = err else {
        panic!("expected a user error, got {err:?}");
    };
    assert!(user.to_string().contains("staged commit"), "{user}");

    // No partial index mutation: a.txt would have become v1
    assert_eq!(staged_content(&s.fx, "a.txt"), "v2");
    let sub = s.fx.submodule_path("s");
    let staged = git_output(&sub, &["diff", "--cached", "--name-only"]);
    assert!(staged.is_empty());
}

#[test]
fn reset_paths_fails_on_unknown_pathspec() {
    let s = scenario();
    let err = reset_paths(
        &meta_repo(&s.fx),
        &s.fx.meta_path(),
        &oid(&s.c1),
        &["no-such-file.txt".into()],
    )
    .unwrap_err();
    assert!(err.to_string().contains("did not match"), "{err}");
}
