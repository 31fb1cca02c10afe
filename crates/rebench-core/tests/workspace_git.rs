//! Workspace manager and diff scorer against real git repositories.
//!
//! Each test builds a small upstream repository, publishes it as a bare
//! repo under `<remotes>/acme/widgets.git` and points the config's remote
//! template there, so no network access is needed.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use rebench_core::exec::Deadline;
use rebench_core::metrics::METRICS;
use rebench_core::workspace::states::PARENT;
use rebench_core::{
    DiffScorer, EvalConfig, TaskDescriptor, WorkspaceError, WorkspaceManager,
};
use tempfile::TempDir;

const SLUG: &str = "acme/widgets";

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn write(dir: &Path, rel: &str, contents: &str) {
    let path = dir.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, contents).unwrap();
}

struct Fixture {
    _upstream: TempDir,
    remotes: TempDir,
    cache: TempDir,
    work: TempDir,
    root_commit: String,
    fix_commit: String,
}

impl Fixture {
    /// Upstream history: a root commit, then a fix touching two files.
    fn new() -> Self {
        let upstream = tempfile::tempdir().unwrap();
        let up = upstream.path();
        git(up, &["init", "-q"]);
        git(up, &["config", "user.name", "test-user"]);
        git(up, &["config", "user.email", "test@example.com"]);
        write(up, "README.md", "widgets\n");
        write(up, "src/a.txt", "one\n");
        git(up, &["add", "-A"]);
        git(up, &["commit", "-q", "-m", "initial"]);
        let root_commit = git(up, &["rev-parse", "HEAD"]);

        write(up, "src/a.txt", "one\ntwo\n");
        write(up, "src/b.txt", "new\n");
        git(up, &["add", "-A"]);
        git(up, &["commit", "-q", "-m", "fix"]);
        let fix_commit = git(up, &["rev-parse", "HEAD"]);

        let remotes = tempfile::tempdir().unwrap();
        let bare = remotes.path().join("acme").join("widgets.git");
        std::fs::create_dir_all(bare.parent().unwrap()).unwrap();
        git(
            remotes.path(),
            &["clone", "-q", "--bare", up.to_str().unwrap(), bare.to_str().unwrap()],
        );

        Self {
            _upstream: upstream,
            remotes,
            cache: tempfile::tempdir().unwrap(),
            work: tempfile::tempdir().unwrap(),
            root_commit,
            fix_commit,
        }
    }

    fn config(&self) -> EvalConfig {
        EvalConfig::default()
            .with_cache_root(self.cache.path())
            .with_workspace_root(self.work.path())
            .with_remote_url_template(format!("{}/{{slug}}.git", self.remotes.path().display()))
            .with_skip_verify(false)
    }

    fn manager(&self) -> WorkspaceManager {
        WorkspaceManager::new(self.config())
    }

    fn task(&self, commit: &str, test_command: &str) -> TaskDescriptor {
        TaskDescriptor::new("widgets-001", SLUG, commit, test_command, "add b.txt").unwrap()
    }

    fn bare_repo(&self) -> PathBuf {
        self.remotes.path().join("acme").join("widgets.git")
    }
}

#[tokio::test]
async fn workspace_is_checked_out_at_parent() {
    let fx = Fixture::new();
    let manager = fx.manager();
    let ws = manager
        .create_workspace(&fx.task(&fx.fix_commit, "test -f src/a.txt"), Deadline::none())
        .await
        .unwrap();

    assert_eq!(ws.parent_commit(), fx.root_commit);
    assert_eq!(ws.states().get(PARENT), Some(fx.root_commit.as_str()));
    assert!(ws.path().join("README.md").exists());
    assert!(!ws.path().join("src/b.txt").exists());
    assert!(ws.path().starts_with(fx.work.path()));
    assert!(ws.path().ends_with("acme--widgets"));
    assert_eq!(ws.repo().slug, SLUG);
    assert_eq!(ws.repo().target_commit, fx.fix_commit);

    let origin = git(ws.path(), &["remote", "get-url", "origin"]);
    assert!(origin.ends_with("acme/widgets.git"));
}

#[tokio::test]
async fn dropping_workspace_removes_it() {
    let fx = Fixture::new();
    let manager = fx.manager();
    let ws = manager
        .create_workspace(&fx.task(&fx.fix_commit, "true"), Deadline::none())
        .await
        .unwrap();
    let path = ws.path().to_path_buf();
    assert!(path.exists());
    drop(ws);
    assert!(!path.exists());
}

#[tokio::test]
async fn root_commit_and_unknown_commit_are_distinguished() {
    let fx = Fixture::new();
    let manager = fx.manager();

    let err = manager
        .create_workspace(&fx.task(&fx.root_commit, "true"), Deadline::none())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::RootCommit { .. }), "{err}");

    let err = manager
        .create_workspace(&fx.task("deadbeefdeadbeef", "true"), Deadline::none())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::UnresolvedCommit { .. }), "{err}");
}

#[tokio::test]
async fn broken_baseline_is_rejected_unless_skipped() {
    let fx = Fixture::new();
    let task = fx.task(&fx.fix_commit, "test -f src/b.txt");

    let err = fx
        .manager()
        .create_workspace(&task, Deadline::none())
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::BaselineBroken { .. }), "{err}");

    let lenient = WorkspaceManager::new(fx.config().with_skip_verify(true));
    assert!(lenient.create_workspace(&task, Deadline::none()).await.is_ok());
}

#[tokio::test]
async fn failing_setup_command_reports_exit_code() {
    let fx = Fixture::new();
    let task = fx
        .task(&fx.fix_commit, "true")
        .with_setup_command("echo installing; exit 3");
    let err = fx
        .manager()
        .create_workspace(&task, Deadline::none())
        .await
        .unwrap_err();
    match err {
        WorkspaceError::SetupFailed {
            exit_code, output, ..
        } => {
            assert_eq!(exit_code, 3);
            assert!(output.contains("installing"));
        }
        other => panic!("expected SetupFailed, got {other}"),
    }
}

#[tokio::test]
async fn setup_command_runs_before_verification() {
    let fx = Fixture::new();
    let task = fx
        .task(&fx.fix_commit, "test -f .ready")
        .with_setup_command("touch .ready");
    let ws = fx
        .manager()
        .create_workspace(&task, Deadline::none())
        .await
        .unwrap();
    assert!(ws.path().join(".ready").exists());
}

#[tokio::test]
async fn snapshot_is_idempotent_without_changes() {
    let fx = Fixture::new();
    let manager = fx.manager();
    let ws = manager
        .create_workspace(&fx.task(&fx.fix_commit, "true"), Deadline::none())
        .await
        .unwrap();

    let first = manager.snapshot(ws.path(), Deadline::none()).await.unwrap();
    let second = manager.snapshot(ws.path(), Deadline::none()).await.unwrap();
    assert_eq!(first, fx.root_commit);
    assert_eq!(first, second);

    write(ws.path(), "notes/new.txt", "hello\n");
    let third = manager.snapshot(ws.path(), Deadline::none()).await.unwrap();
    assert_ne!(third, second);

    let changed = manager
        .diff_file_set(ws.path(), &first, Some(third.as_str()), Deadline::none())
        .await
        .unwrap();
    assert_eq!(changed.to_vec(), vec!["notes/new.txt"]);
}

#[tokio::test]
async fn diff_tree_lists_root_commit_files() {
    let fx = Fixture::new();
    let manager = fx.manager();
    let ws = manager
        .create_workspace(&fx.task(&fx.fix_commit, "true"), Deadline::none())
        .await
        .unwrap();

    let root = manager
        .diff_file_set_in_commit(ws.path(), &fx.root_commit, Deadline::none())
        .await
        .unwrap();
    assert_eq!(root.to_vec(), vec!["README.md", "src/a.txt"]);

    let fix = manager
        .diff_file_set_in_commit(ws.path(), &fx.fix_commit, Deadline::none())
        .await
        .unwrap();
    assert_eq!(fix.to_vec(), vec!["src/a.txt", "src/b.txt"]);
}

#[tokio::test]
async fn diff_scorer_ignores_infrastructure_paths() {
    let fx = Fixture::new();
    let manager = fx.manager();
    let mut ws = manager
        .create_workspace(&fx.task(&fx.fix_commit, "true"), Deadline::none())
        .await
        .unwrap();

    write(ws.path(), "src/a.txt", "one\nthree\n");
    write(ws.path(), ".claude/notes.md", "scratch\n");
    let snapshot = manager
        .snapshot_state(&mut ws, "attempt", Deadline::none())
        .await
        .unwrap();
    assert_eq!(ws.states().get("attempt"), Some(snapshot.as_str()));

    let record = DiffScorer::new(&manager)
        .score(ws.path(), &fx.fix_commit, Some(snapshot.as_str()), None, Deadline::none())
        .await
        .unwrap();
    assert_eq!(record.agent_files, vec!["src/a.txt"]);
    assert_eq!(record.truth_files, vec!["src/a.txt", "src/b.txt"]);
    assert_eq!(record.precision, 1.0);
    assert_eq!(record.recall, 0.5);
    assert!(!record.exact_match);

    let patch = manager
        .unified_diff(ws.path(), ws.parent_commit(), &snapshot, Deadline::none())
        .await
        .unwrap();
    assert!(patch.contains("+three"));
    assert!(patch.ends_with('\n'));
}

#[tokio::test]
async fn working_tree_diff_includes_untracked_files() {
    let fx = Fixture::new();
    let manager = fx.manager();
    let ws = manager
        .create_workspace(&fx.task(&fx.fix_commit, "true"), Deadline::none())
        .await
        .unwrap();

    write(ws.path(), "src/a.txt", "one\ntwo\n");
    write(ws.path(), "src/b.txt", "new\n");
    let record = DiffScorer::new(&manager)
        .score(ws.path(), &fx.fix_commit, None, None, Deadline::none())
        .await
        .unwrap();
    assert_eq!(record.agent_files, vec!["src/a.txt", "src/b.txt"]);
    assert!(record.exact_match);
}

#[tokio::test]
async fn unknown_ground_truth_is_a_scorer_error() {
    let fx = Fixture::new();
    let manager = fx.manager();
    let ws = manager
        .create_workspace(&fx.task(&fx.fix_commit, "true"), Deadline::none())
        .await
        .unwrap();
    let err = DiffScorer::new(&manager)
        .score(ws.path(), "deadbeefdeadbeef", None, None, Deadline::none())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("deadbeefdeadbeef"));
}

#[tokio::test]
async fn mirror_is_reused_and_refreshed() {
    let fx = Fixture::new();
    let manager = fx.manager();
    let mirror = manager
        .ensure_cached_mirror(SLUG, Deadline::none())
        .await
        .unwrap();
    assert!(mirror.starts_with(fx.cache.path()));
    assert!(mirror.to_string_lossy().ends_with(".git"));

    // Publish a new commit upstream; the next ensure must pick it up.
    let scratch = tempfile::tempdir().unwrap();
    let clone = scratch.path().join("c");
    git(
        scratch.path(),
        &["clone", "-q", fx.bare_repo().to_str().unwrap(), clone.to_str().unwrap()],
    );
    git(&clone, &["config", "user.name", "test-user"]);
    git(&clone, &["config", "user.email", "test@example.com"]);
    write(&clone, "src/c.txt", "later\n");
    git(&clone, &["add", "-A"]);
    git(&clone, &["commit", "-q", "-m", "later"]);
    git(&clone, &["push", "-q", "origin", "HEAD"]);
    let later = git(&clone, &["rev-parse", "HEAD"]);

    let again = manager
        .ensure_cached_mirror(SLUG, Deadline::none())
        .await
        .unwrap();
    assert_eq!(again, mirror);
    let found = git(&mirror, &["cat-file", "-t", later.as_str()]);
    assert_eq!(found, "commit");
}

#[tokio::test]
async fn concurrent_workspaces_share_one_mirror() {
    let fx = Fixture::new();
    let manager = fx.manager();
    let task = fx.task(&fx.fix_commit, "true");
    let (a, b) = tokio::join!(
        manager.create_workspace(&task, Deadline::none()),
        manager.create_workspace(&task, Deadline::none()),
    );
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_ne!(a.path(), b.path());
    assert_eq!(a.parent_commit(), b.parent_commit());

    let mirrors: Vec<_> = std::fs::read_dir(fx.cache.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().ends_with(".git"))
        .collect();
    assert_eq!(mirrors.len(), 1);
}

#[tokio::test]
async fn expired_deadline_stops_before_git() {
    let fx = Fixture::new();
    let deadline = Deadline::after(Duration::ZERO);
    tokio::time::sleep(Duration::from_millis(5)).await;
    let err = fx
        .manager()
        .create_workspace(&fx.task(&fx.fix_commit, "true"), deadline)
        .await
        .unwrap_err();
    assert!(matches!(err, WorkspaceError::DeadlineExceeded { .. }), "{err}");
}

#[tokio::test]
async fn failed_refresh_reclones_the_mirror() {
    let fx = Fixture::new();
    let manager = fx.manager();
    let mirror = manager
        .ensure_cached_mirror(SLUG, Deadline::none())
        .await
        .unwrap();
    git(&mirror, &["config", "remote.origin.url", "/nonexistent/widgets.git"]);

    let failures = METRICS.mirror_refresh_failures();
    let again = manager
        .ensure_cached_mirror(SLUG, Deadline::none())
        .await
        .unwrap();
    assert_eq!(again, mirror);
    let url = git(&mirror, &["config", "remote.origin.url"]);
    assert!(url.ends_with("acme/widgets.git"));
    assert_ne!(url, "/nonexistent/widgets.git");
    git(&mirror, &["cat-file", "-t", fx.fix_commit.as_str()]);
    assert!(METRICS.mirror_refresh_failures() > failures);
}

#[tokio::test]
async fn refresh_timeout_keeps_the_mirror() {
    let fx = Fixture::new();
    let manager = fx.manager();
    let mirror = manager
        .ensure_cached_mirror(SLUG, Deadline::none())
        .await
        .unwrap();
    git(&mirror, &["config", "remote.origin.uploadpack", "sleep 3; git-upload-pack"]);

    let err = manager
        .ensure_cached_mirror(SLUG, Deadline::after(Duration::from_millis(800)))
        .await
        .unwrap_err();
    assert!(
        matches!(
            err,
            WorkspaceError::Timeout { .. } | WorkspaceError::DeadlineExceeded { .. }
        ),
        "{err}"
    );
    assert!(mirror.exists());
    let uploadpack = git(&mirror, &["config", "remote.origin.uploadpack"]);
    assert_eq!(uploadpack, "sleep 3; git-upload-pack");
}
