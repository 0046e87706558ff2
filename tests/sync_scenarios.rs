//! End-to-end synchronizer behaviour against a real local remote

mod common;

use assert_matches::assert_matches;
use common::{commit_count, commit_file, git, head, GitFixture};
use reposweep::config::SyncConfig;
use reposweep::{
    discover_repositories, AutoMessage, GitBackend, GitCli, RepoFilter, SyncEngine, SyncResult,
    SyncState,
};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

fn engine() -> SyncEngine {
    SyncEngine::new(
        Arc::new(GitCli::default()),
        Arc::new(AutoMessage::new("wip: automatic commit")),
        SyncConfig::default(),
    )
}

#[tokio::test]
async fn ahead_without_changes_is_pushed_without_commit() {
    let fixture = GitFixture::new();
    commit_file(&fixture.work, "local.txt", "one\n");
    let before = commit_count(&fixture.work);

    let result = engine().sync_repository(&fixture.work).await;

    assert_matches!(result, SyncResult::Pushed { committed: false, .. });
    assert_eq!(commit_count(&fixture.work), before);
    assert_eq!(fixture.remote_head(), head(&fixture.work));
}

#[tokio::test]
async fn ahead_with_modified_file_is_committed_then_pushed() {
    let fixture = GitFixture::new();
    commit_file(&fixture.work, "local.txt", "one\n");
    std::fs::write(fixture.work.join("local.txt"), "two\n").unwrap();
    let before = commit_count(&fixture.work);

    let result = engine().sync_repository(&fixture.work).await;

    assert_matches!(result, SyncResult::Pushed { committed: true, .. });
    assert_eq!(commit_count(&fixture.work), before + 1);
    assert_eq!(git(&fixture.work, &["status", "--porcelain"]), "");
    assert_eq!(
        git(&fixture.work, &["log", "-1", "--format=%s"]),
        "wip: automatic commit"
    );
    assert_eq!(fixture.remote_head(), head(&fixture.work));
}

#[tokio::test]
async fn behind_is_fast_forwarded() {
    let fixture = GitFixture::new();
    fixture.push_from_seed("a.txt", "a\n");
    fixture.push_from_seed("b.txt", "b\n");
    let before = commit_count(&fixture.work);

    let result = engine().sync_repository(&fixture.work).await;

    assert_matches!(result, SyncResult::Pulled { commits_updated: 2, .. });
    assert_eq!(commit_count(&fixture.work), before + 2);
    assert_eq!(head(&fixture.work), head(&fixture.seed));
}

#[tokio::test]
async fn diverged_is_left_alone() {
    let fixture = GitFixture::new();
    fixture.push_from_seed("remote.txt", "remote\n");
    commit_file(&fixture.work, "local.txt", "local\n");
    let local_head = head(&fixture.work);
    let remote_head = fixture.remote_head();

    let result = engine().sync_repository(&fixture.work).await;

    assert_matches!(result, SyncResult::Diverged { ahead: 1, behind: 1, .. });
    assert_eq!(head(&fixture.work), local_head);
    assert_eq!(fixture.remote_head(), remote_head);
}

#[tokio::test]
async fn up_to_date_reports_no_change() {
    let fixture = GitFixture::new();

    let status = engine().analyze(&fixture.work).await.unwrap();
    assert_eq!(status.state, SyncState::UpToDate);
    assert_eq!(status.upstream.as_deref(), Some("origin/main"));

    assert_matches!(
        engine().sync_repository(&fixture.work).await,
        SyncResult::UpToDate { .. }
    );
}

#[tokio::test]
async fn repository_without_upstream_terminates_as_no_upstream() {
    let fixture = GitFixture::new();
    let local = fixture.add_local_only_repo("scratch");
    commit_file(&local, "more.txt", "more\n");

    assert_matches!(
        engine().sync_repository(&local).await,
        SyncResult::NoUpstream { .. }
    );
}

#[tokio::test]
async fn full_run_processes_every_repository() {
    let fixture = GitFixture::new();
    fixture.push_from_seed("a.txt", "a\n");
    fixture.add_local_only_repo("scratch");
    std::fs::create_dir_all(fixture.base.join("notes")).unwrap();

    let queue = discover_repositories(&fixture.base, &RepoFilter::default());
    assert_eq!(queue.len(), 2);

    let summary = engine().run(queue).await;

    assert_eq!(summary.total_repositories, 2);
    assert_eq!(summary.pulled, 1);
    assert_eq!(summary.no_upstream, 1);
    assert_eq!(summary.failed, 0);
}

#[tokio::test]
async fn unreachable_remote_fails_only_that_repository() {
    let fixture = GitFixture::new();
    git(
        &fixture.work,
        &["remote", "set-url", "origin", "/nonexistent/remote.git"],
    );
    let local = fixture.add_local_only_repo("scratch");

    let broken = engine().sync_repository(&fixture.work).await;
    assert_matches!(broken, SyncResult::Failed { ref error, .. } if error.contains("fetch"));

    assert_matches!(
        engine().sync_repository(&local).await,
        SyncResult::NoUpstream { .. }
    );
}

/// Point origin at an ssh remote whose transport never answers
fn hang_fetches(repo: &Path) {
    git(repo, &["remote", "set-url", "origin", "ssh://example.invalid/x"]);
    // `#` swallows the host and command git appends
    git(repo, &["config", "core.sshCommand", "sleep 30 #"]);
    git(repo, &["config", "ssh.variant", "simple"]);
}

#[tokio::test]
async fn hung_fetch_is_killed_after_command_timeout() {
    let fixture = GitFixture::new();
    hang_fetches(&fixture.work);
    let git = GitCli::new(Some(Duration::from_secs(1)));

    let started = Instant::now();
    let err = git.fetch(&fixture.work).await.unwrap_err();

    assert!(err.to_string().contains("timed out"), "{:#}", err);
    assert!(started.elapsed() < Duration::from_secs(15));
}

#[tokio::test]
async fn command_timeout_fails_only_that_repository() {
    let fixture = GitFixture::new();
    hang_fetches(&fixture.work);
    let engine = SyncEngine::new(
        Arc::new(GitCli::new(Some(Duration::from_secs(1)))),
        Arc::new(AutoMessage::new("wip: automatic commit")),
        SyncConfig {
            command_timeout: Some(1),
            ..Default::default()
        },
    );

    let result = engine.sync_repository(&fixture.work).await;

    assert_matches!(result, SyncResult::Failed { ref error, .. } if error.contains("timed out"));
}
