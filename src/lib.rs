//! reposweep - local repository maintenance
//!
//! Walks a base directory, finds every git checkout below it and brings each
//! one in step with its upstream, while keeping the base directory's
//! `.gitignore` listing the directories that are not checkouts.
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`discovery`]: Repository detection and the directory walk
//! - [`gitignore`]: Ignore-list maintenance
//! - [`git`]: The git command-line collaborator
//! - [`sync`]: Classification and corrective actions per repository
//! - [`prompt`]: Commit-message sources (automatic or interactive)
//! - [`health`]: Preflight checks

pub mod config;
pub mod discovery;
pub mod git;
pub mod gitignore;
pub mod health;
pub mod prompt;
pub mod sync;

pub use config::Config;
pub use discovery::{discover_repositories, is_git_repo, RepoFilter};
pub use git::{GitBackend, GitCli};
pub use health::HealthCheck;
pub use prompt::{AutoMessage, CommitMessageSource, StdinPrompt};
pub use sync::{RepoStatus, SyncEngine, SyncResult, SyncState, SyncSummary};
