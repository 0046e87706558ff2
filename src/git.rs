use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tokio::time::timeout;
use tracing::debug;

/// Commit counts on either side of `HEAD...@{u}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Divergence {
    /// Commits only on the local branch
    pub ahead: usize,
    /// Commits only on the upstream
    pub behind: usize,
}

/// The git operations the synchronizer needs, one call per subprocess.
///
/// Every method takes the repository path explicitly; nothing relies on the
/// process working directory.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GitBackend: Send + Sync {
    /// `git fetch`
    async fn fetch(&self, repo: &Path) -> Result<()>;

    /// Upstream of the current branch, `None` when none is configured
    async fn upstream(&self, repo: &Path) -> Result<Option<String>>;

    /// `git status --porcelain`, with `-uno` unless untracked files count
    async fn status_porcelain(&self, repo: &Path, include_untracked: bool) -> Result<String>;

    /// `git rev-list --left-right HEAD...@{u}`
    async fn left_right(&self, repo: &Path) -> Result<String>;

    /// `git add .`
    async fn add_all(&self, repo: &Path) -> Result<()>;

    /// `git commit -m <message>`
    async fn commit(&self, repo: &Path, message: &str) -> Result<()>;

    /// `git push`
    async fn push(&self, repo: &Path) -> Result<()>;

    /// `git pull`, optionally `--ff-only`
    async fn pull(&self, repo: &Path, fast_forward_only: bool) -> Result<()>;
}

/// [`GitBackend`] backed by the `git` executable
#[derive(Debug, Clone, Default)]
pub struct GitCli {
    command_timeout: Option<Duration>,
}

impl GitCli {
    pub fn new(command_timeout: Option<Duration>) -> Self {
        Self { command_timeout }
    }

    /// Run git in `repo` and return stdout, failing on a non-zero exit
    async fn run(&self, repo: &Path, args: &[&str]) -> Result<String> {
        let output = self.output(repo, args).await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "git {} failed in {}: {}",
                args.join(" "),
                repo.display(),
                stderr.trim()
            ));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn output(&self, repo: &Path, args: &[&str]) -> Result<std::process::Output> {
        debug!("git {} (in {})", args.join(" "), repo.display());

        let mut command = AsyncCommand::new("git");
        command.args(args).current_dir(repo).kill_on_drop(true);

        let future = command.output();
        let output = match self.command_timeout {
            Some(limit) => timeout(limit, future).await.map_err(|_| {
                anyhow!(
                    "git {} timed out after {}s in {}",
                    args.join(" "),
                    limit.as_secs(),
                    repo.display()
                )
            })?,
            None => future.await,
        };

        output.with_context(|| format!("Failed to execute git {}", args.join(" ")))
    }
}

#[async_trait]
impl GitBackend for GitCli {
    async fn fetch(&self, repo: &Path) -> Result<()> {
        self.run(repo, &["fetch"]).await.map(|_| ())
    }

    async fn upstream(&self, repo: &Path) -> Result<Option<String>> {
        let output = self
            .output(
                repo,
                &["rev-parse", "--abbrev-ref", "--symbolic-full-name", "@{u}"],
            )
            .await?;

        // a non-zero exit here means "no upstream" (or detached HEAD), not a failure
        if output.status.success() {
            let upstream = String::from_utf8_lossy(&output.stdout).trim().to_string();
            Ok((!upstream.is_empty()).then_some(upstream))
        } else {
            Ok(None)
        }
    }

    async fn status_porcelain(&self, repo: &Path, include_untracked: bool) -> Result<String> {
        if include_untracked {
            self.run(repo, &["status", "--porcelain"]).await
        } else {
            self.run(repo, &["status", "--porcelain", "-uno"]).await
        }
    }

    async fn left_right(&self, repo: &Path) -> Result<String> {
        self.run(repo, &["rev-list", "--left-right", "HEAD...@{u}"])
            .await
    }

    async fn add_all(&self, repo: &Path) -> Result<()> {
        self.run(repo, &["add", "."]).await.map(|_| ())
    }

    async fn commit(&self, repo: &Path, message: &str) -> Result<()> {
        self.run(repo, &["commit", "-m", message]).await.map(|_| ())
    }

    async fn push(&self, repo: &Path) -> Result<()> {
        self.run(repo, &["push"]).await.map(|_| ())
    }

    async fn pull(&self, repo: &Path, fast_forward_only: bool) -> Result<()> {
        if fast_forward_only {
            self.run(repo, &["pull", "--ff-only"]).await.map(|_| ())
        } else {
            self.run(repo, &["pull"]).await.map(|_| ())
        }
    }
}

/// Count the `<` (local-only) and `>` (upstream-only) lines of `rev-list --left-right`
pub fn parse_left_right(output: &str) -> Divergence {
    output
        .lines()
        .fold(Divergence::default(), |mut divergence, line| {
            match line.trim_start().chars().next() {
                Some('<') => divergence.ahead += 1,
                Some('>') => divergence.behind += 1,
                _ => {}
            }
            divergence
        })
}

/// Porcelain status lists one path per line; any line means pending changes
pub fn has_pending_changes(porcelain: &str) -> bool {
    porcelain.lines().any(|line| !line.trim().is_empty())
}
