//! Commit-message sources
//!
//! The synchronizer stops at exactly one point for human input: when a
//! repository is ahead of its upstream and also has uncommitted changes.
//! That point is a [`CommitMessageSource`], so automatic and interactive
//! runs share the same classification core.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Stdin};
use tokio::sync::Mutex;

use crate::sync::RepoStatus;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommitMessageSource: Send + Sync {
    /// Message for committing the pending changes of `status.path`.
    ///
    /// `None` leaves the changes uncommitted; existing local commits are still pushed.
    async fn commit_message(&self, status: &RepoStatus) -> Result<Option<String>>;
}

/// Always answers with the same message
#[derive(Debug, Clone)]
pub struct AutoMessage {
    message: String,
}

impl AutoMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[async_trait]
impl CommitMessageSource for AutoMessage {
    async fn commit_message(&self, _status: &RepoStatus) -> Result<Option<String>> {
        Ok(Some(self.message.clone()))
    }
}

/// Reads one line from standard input per repository
#[derive(Debug)]
pub struct StdinPrompt {
    // one reader per run: buffered lines must survive between prompts
    reader: Mutex<BufReader<Stdin>>,
}

impl StdinPrompt {
    pub fn new() -> Self {
        Self {
            reader: Mutex::new(BufReader::new(tokio::io::stdin())),
        }
    }
}

impl Default for StdinPrompt {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommitMessageSource for StdinPrompt {
    async fn commit_message(&self, status: &RepoStatus) -> Result<Option<String>> {
        let mut stdout = tokio::io::stdout();
        stdout
            .write_all(
                format!(
                    "📝 {} has uncommitted changes. Commit message (empty to skip): ",
                    status.path.display()
                )
                .as_bytes(),
            )
            .await?;
        stdout.flush().await?;

        let mut line = String::new();
        self.reader
            .lock()
            .await
            .read_line(&mut line)
            .await
            .context("Failed to read commit message from stdin")?;

        Ok(normalize_message(&line))
    }
}

fn normalize_message(line: &str) -> Option<String> {
    let trimmed = line.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
