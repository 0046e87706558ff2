//! Sync Engine - classifies each repository against its upstream and applies
//! the smallest corrective action
//!
//! Repositories are processed strictly one at a time: fetch, classify, act,
//! then the next one. A failure in one repository is recorded in its
//! [`SyncResult`] and never stops the walk.

use anyhow::Result;
use std::collections::VecDeque;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::SyncConfig;
use crate::git::{has_pending_changes, parse_left_right, GitBackend};
use crate::prompt::CommitMessageSource;

/// Relationship between a local branch and its upstream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    UpToDate,
    /// Local commits the upstream lacks
    Ahead,
    /// Upstream commits the local branch lacks
    Behind,
    /// Both; needs a manual merge
    Diverged,
    /// The current branch tracks nothing
    NoUpstream,
}

impl SyncState {
    /// Classification from the two comparison flags
    pub fn classify(ahead: bool, behind: bool) -> Self {
        match (ahead, behind) {
            (true, true) => SyncState::Diverged,
            (true, false) => SyncState::Ahead,
            (false, true) => SyncState::Behind,
            (false, false) => SyncState::UpToDate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::UpToDate => "up-to-date",
            SyncState::Ahead => "ahead",
            SyncState::Behind => "behind",
            SyncState::Diverged => "diverged",
            SyncState::NoUpstream => "no-upstream",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of one repository, taken after fetching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoStatus {
    pub path: PathBuf,
    pub upstream: Option<String>,
    pub state: SyncState,
    pub ahead: usize,
    pub behind: usize,
    pub has_pending_changes: bool,
}

/// What the synchronizer does for a classified repository
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    None,
    Push,
    CommitAndPush,
    Pull,
}

/// Action for a repository. Pending changes only matter when it is ahead.
pub fn plan_action(status: &RepoStatus) -> SyncAction {
    match status.state {
        SyncState::Ahead if status.has_pending_changes => SyncAction::CommitAndPush,
        SyncState::Ahead => SyncAction::Push,
        SyncState::Behind => SyncAction::Pull,
        SyncState::UpToDate | SyncState::Diverged | SyncState::NoUpstream => SyncAction::None,
    }
}

/// Result of synchronizing one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// Nothing to do
    UpToDate { path: PathBuf },
    /// Local commits were pushed, after committing pending changes when `committed`
    Pushed { path: PathBuf, committed: bool },
    /// Upstream commits were pulled
    Pulled { path: PathBuf, commits_updated: usize },
    /// Both sides have unique commits; left for a manual merge
    Diverged {
        path: PathBuf,
        ahead: usize,
        behind: usize,
    },
    /// No upstream configured for the current branch
    NoUpstream { path: PathBuf },
    /// A git command failed
    Failed { path: PathBuf, error: String },
}

impl SyncResult {
    pub fn path(&self) -> &Path {
        match self {
            SyncResult::UpToDate { path }
            | SyncResult::Pushed { path, .. }
            | SyncResult::Pulled { path, .. }
            | SyncResult::Diverged { path, .. }
            | SyncResult::NoUpstream { path }
            | SyncResult::Failed { path, .. } => path,
        }
    }
}

/// Results from a complete sync operation
#[derive(Debug, Clone, Default)]
pub struct SyncSummary {
    pub total_repositories: usize,
    pub up_to_date: usize,
    pub pushed: usize,
    pub pulled: usize,
    pub diverged: usize,
    pub no_upstream: usize,
    pub failed: usize,
    pub duration: Duration,
    pub results: Vec<SyncResult>,
}

impl SyncSummary {
    fn compile(results: Vec<SyncResult>, duration: Duration) -> Self {
        let mut summary = SyncSummary {
            total_repositories: results.len(),
            duration,
            ..Default::default()
        };

        for result in &results {
            match result {
                SyncResult::UpToDate { .. } => summary.up_to_date += 1,
                SyncResult::Pushed { .. } => summary.pushed += 1,
                SyncResult::Pulled { .. } => summary.pulled += 1,
                SyncResult::Diverged { .. } => summary.diverged += 1,
                SyncResult::NoUpstream { .. } => summary.no_upstream += 1,
                SyncResult::Failed { .. } => summary.failed += 1,
            }
        }

        summary.results = results;
        summary
    }
}

/// Drives the per-repository decision procedure
pub struct SyncEngine {
    git: Arc<dyn GitBackend>,
    messages: Arc<dyn CommitMessageSource>,
    config: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        git: Arc<dyn GitBackend>,
        messages: Arc<dyn CommitMessageSource>,
        config: SyncConfig,
    ) -> Self {
        Self {
            git,
            messages,
            config,
        }
    }

    /// Fetch and classify one repository without changing it
    pub async fn analyze(&self, path: &Path) -> Result<RepoStatus> {
        info!("Fetching and checking status in {}", path.display());
        self.git.fetch(path).await?;

        let Some(upstream) = self.git.upstream(path).await? else {
            return Ok(RepoStatus {
                path: path.to_path_buf(),
                upstream: None,
                state: SyncState::NoUpstream,
                ahead: 0,
                behind: 0,
                has_pending_changes: false,
            });
        };

        let porcelain = self
            .git
            .status_porcelain(path, self.config.include_untracked)
            .await?;
        let divergence = parse_left_right(&self.git.left_right(path).await?);

        let status = RepoStatus {
            path: path.to_path_buf(),
            upstream: Some(upstream),
            state: SyncState::classify(divergence.ahead > 0, divergence.behind > 0),
            ahead: divergence.ahead,
            behind: divergence.behind,
            has_pending_changes: has_pending_changes(&porcelain),
        };

        debug!("Repository status: {:?}", status);
        Ok(status)
    }

    /// Synchronize one repository. Errors become [`SyncResult::Failed`].
    pub async fn sync_repository(&self, path: &Path) -> SyncResult {
        match self.try_sync_repository(path).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Failed to sync {}: {:#}", path.display(), e);
                SyncResult::Failed {
                    path: path.to_path_buf(),
                    error: format!("{:#}", e),
                }
            }
        }
    }

    async fn try_sync_repository(&self, path: &Path) -> Result<SyncResult> {
        let status = self.analyze(path).await?;
        let action = plan_action(&status);
        let path = status.path.clone();

        match (status.state, action) {
            (SyncState::NoUpstream, _) => {
                warn!("{} has no upstream configured, skipping", path.display());
                Ok(SyncResult::NoUpstream { path })
            }
            (SyncState::Diverged, _) => {
                warn!(
                    "Repository '{}' has diverged from {} ({} ahead, {} behind). Manual update required.",
                    path.display(),
                    status.upstream.as_deref().unwrap_or("upstream"),
                    status.ahead,
                    status.behind
                );
                Ok(SyncResult::Diverged {
                    path,
                    ahead: status.ahead,
                    behind: status.behind,
                })
            }
            (_, SyncAction::CommitAndPush) => {
                let committed = match self.messages.commit_message(&status).await? {
                    Some(message) => {
                        info!("Committing pending changes in {}", path.display());
                        self.git.add_all(&path).await?;
                        self.git.commit(&path, &message).await?;
                        true
                    }
                    None => {
                        info!(
                            "No commit message for {}, pushing existing commits only",
                            path.display()
                        );
                        false
                    }
                };
                self.push(&path, status.ahead).await?;
                Ok(SyncResult::Pushed { path, committed })
            }
            (_, SyncAction::Push) => {
                self.push(&path, status.ahead).await?;
                Ok(SyncResult::Pushed {
                    path,
                    committed: false,
                })
            }
            (_, SyncAction::Pull) => {
                info!(
                    "Repository '{}' is behind the remote by {} commits. Pulling updates...",
                    path.display(),
                    status.behind
                );
                self.git.pull(&path, self.config.fast_forward_only).await?;
                Ok(SyncResult::Pulled {
                    path,
                    commits_updated: status.behind,
                })
            }
            (_, SyncAction::None) => {
                info!("No changes detected in {}", path.display());
                Ok(SyncResult::UpToDate { path })
            }
        }
    }

    async fn push(&self, path: &Path, ahead: usize) -> Result<()> {
        info!(
            "Repository '{}' is ahead of the remote by {} commits. Pushing...",
            path.display(),
            ahead
        );
        self.git.push(path).await
    }

    /// Synchronize every queued repository in order
    pub async fn run(&self, mut queue: VecDeque<PathBuf>) -> SyncSummary {
        let start_time = Instant::now();
        let mut results = Vec::with_capacity(queue.len());

        info!("Synchronizing {} repositories", queue.len());

        while let Some(path) = queue.pop_front() {
            results.push(self.sync_repository(&path).await);
        }

        let summary = SyncSummary::compile(results, start_time.elapsed());

        info!(
            "Sync completed in {:.2}s: {} pushed, {} pulled, {} up to date, {} diverged, {} without upstream, {} failed",
            summary.duration.as_secs_f64(),
            summary.pushed,
            summary.pulled,
            summary.up_to_date,
            summary.diverged,
            summary.no_upstream,
            summary.failed
        );

        summary
    }

    /// Fetch and classify every queued repository without acting on any of them
    pub async fn dry_run(&self, mut queue: VecDeque<PathBuf>) -> Vec<(PathBuf, Result<RepoStatus>)> {
        let mut statuses = Vec::with_capacity(queue.len());

        while let Some(path) = queue.pop_front() {
            let status = self.analyze(&path).await;
            if let Err(e) = &status {
                warn!("Failed to analyze {}: {:#}", path.display(), e);
            }
            statuses.push((path, status));
        }

        statuses
    }
}
