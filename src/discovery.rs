//! Repository discovery
//!
//! Walks a base directory and collects every git checkout below it. Nothing is
//! cached: repositories are found fresh on every run.

use anyhow::{Context, Result};
use regex::Regex;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

/// Name of the git metadata directory
pub const GIT_DIR: &str = ".git";

/// Check if a directory is a git repository (has a `.git` directory directly beneath it)
pub fn is_git_repo(path: &Path) -> bool {
    path.join(GIT_DIR).is_dir()
}

/// Repository exclusion patterns, matched against the path relative to the base directory
#[derive(Debug, Clone, Default)]
pub struct RepoFilter {
    patterns: Vec<Regex>,
}

impl RepoFilter {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p).with_context(|| format!("Invalid exclude pattern: {}", p)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { patterns })
    }

    pub fn is_excluded(&self, relative: &Path) -> bool {
        let relative = relative.to_string_lossy();
        self.patterns.iter().any(|p| p.is_match(&relative))
    }
}

/// Recursively find every repository strictly below `base`.
///
/// Symlinks are not descended into, but a symlink to a checkout is reported.
/// `.git` directories are not descended into.
/// Checkouts nested inside other checkouts are reported as well. The queue is
/// in walk order (entries sorted by file name within each directory).
pub fn discover_repositories(base: &Path, filter: &RepoFilter) -> VecDeque<PathBuf> {
    let mut queue = VecDeque::new();

    let walker = WalkDir::new(base)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.file_name() != GIT_DIR);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                debug!("Skipping unreadable entry: {}", e);
                continue;
            }
        };

        // symlinked checkouts count; the walk itself never follows links
        if !entry.path().is_dir() || !is_git_repo(entry.path()) {
            continue;
        }

        let relative = entry.path().strip_prefix(base).unwrap_or(entry.path());
        if filter.is_excluded(relative) {
            debug!("Excluded by pattern: {}", entry.path().display());
            continue;
        }

        queue.push_back(entry.into_path());
    }

    debug!(
        "Discovered {} repositories under {}",
        queue.len(),
        base.display()
    );
    queue
}
