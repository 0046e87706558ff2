//! Ignore-list maintenance
//!
//! Keeps the ignore file of a base directory listing the entries that are not
//! tracked there. Two variants exist:
//!
//! - [`append_new_entries`] appends every immediate child that is not yet
//!   listed, skipping a fixed set of names.
//! - [`rewrite_with_non_repositories`] rewrites the file, sorted, with every
//!   immediate subdirectory that is not itself a git checkout.
//!
//! Filesystem errors are returned to the caller; there is no recovery here.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::discovery::is_git_repo;

/// Entries added to an ignore file by one maintenance pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreUpdate {
    pub path: PathBuf,
    pub added: Vec<String>,
}

impl IgnoreUpdate {
    pub fn is_noop(&self) -> bool {
        self.added.is_empty()
    }
}

/// An ignore file on disk, one entry per line
#[derive(Debug, Clone)]
pub struct IgnoreFile {
    path: PathBuf,
}

impl IgnoreFile {
    pub fn in_dir(dir: &Path, file_name: &str) -> Self {
        Self {
            path: dir.join(file_name),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries currently listed; blank lines and `#` comments are skipped.
    /// A missing file has no entries.
    pub fn read_entries(&self) -> Result<BTreeSet<String>> {
        if !self.path.exists() {
            return Ok(BTreeSet::new());
        }

        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read ignore file: {:?}", self.path))?;

        Ok(parse_entries(&content))
    }

    /// Append entries at the end of the file, keeping existing content
    pub fn append<'a>(&self, entries: impl IntoIterator<Item = &'a String>) -> Result<()> {
        let needs_newline = match fs::read(&self.path) {
            Ok(bytes) => bytes.last().is_some_and(|b| *b != b'\n'),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read ignore file: {:?}", self.path))
            }
        };

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open ignore file: {:?}", self.path))?;

        let mut buffer = String::new();
        if needs_newline {
            buffer.push('\n');
        }
        for entry in entries {
            buffer.push_str(entry);
            buffer.push('\n');
        }

        file.write_all(buffer.as_bytes())
            .with_context(|| format!("Failed to write ignore file: {:?}", self.path))
    }

    /// Replace the file with `header` followed by `entries`
    pub fn rewrite<'a>(
        &self,
        header: &str,
        entries: impl IntoIterator<Item = &'a String>,
    ) -> Result<()> {
        let mut content = String::new();
        if !header.is_empty() {
            content.push_str(header);
            content.push('\n');
        }
        for entry in entries {
            content.push_str(entry);
            content.push('\n');
        }

        fs::write(&self.path, content)
            .with_context(|| format!("Failed to write ignore file: {:?}", self.path))
    }
}

fn parse_entries(content: &str) -> BTreeSet<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Canonical entry for a child of a directory: directories get a trailing `/`
pub fn entry_for(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    if path.is_dir() {
        Some(format!("{}/", name))
    } else {
        Some(name)
    }
}

/// Names never written by the append variant: the configured names plus the
/// file name of the running executable
pub fn default_exclusions(configured: &[String], ignore_file: &str) -> BTreeSet<String> {
    let mut exclusions: BTreeSet<String> = configured.iter().cloned().collect();
    exclusions.insert(ignore_file.to_string());

    if let Some(own_name) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_name().map(|n| n.to_string_lossy().into_owned()))
    {
        exclusions.insert(own_name);
    }

    exclusions
}

/// Append every immediate child of `dir` that is not excluded and not already listed.
///
/// Only the difference between the children and the recorded entries is
/// written, so running twice over unchanged contents adds nothing the second
/// time.
pub fn append_new_entries(
    dir: &Path,
    file_name: &str,
    exclusions: &BTreeSet<String>,
) -> Result<IgnoreUpdate> {
    let ignore_file = IgnoreFile::in_dir(dir, file_name);
    let existing = ignore_file.read_entries()?;

    let mut children = BTreeSet::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
        let entry = entry.with_context(|| format!("Failed to list {:?}", dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if exclusions.contains(&name) {
            continue;
        }
        if let Some(canonical) = entry_for(&entry.path()) {
            children.insert(canonical);
        }
    }

    let added: Vec<String> = children.difference(&existing).cloned().collect();

    if added.is_empty() {
        debug!("No new entries for {}", ignore_file.path().display());
    } else {
        ignore_file.append(&added)?;
        info!(
            "Added {} new entries to {}",
            added.len(),
            ignore_file.path().display()
        );
    }

    Ok(IgnoreUpdate {
        path: ignore_file.path().to_path_buf(),
        added,
    })
}

/// Rewrite the ignore file of `base` with every subdirectory that is not a repository.
///
/// Existing entries are kept. An entry is the same whether or not it carries a
/// trailing `/`; directory entries, including existing ones naming a
/// subdirectory, are written with exactly one. Patterns are kept verbatim. The file is
/// created when missing.
pub fn rewrite_with_non_repositories(
    base: &Path,
    file_name: &str,
    header: &str,
) -> Result<IgnoreUpdate> {
    let ignore_file = IgnoreFile::in_dir(base, file_name);

    // keyed by name without trailing separators
    let mut entries: BTreeMap<String, String> = ignore_file
        .read_entries()?
        .into_iter()
        .map(|entry| {
            let key = entry.trim_end_matches('/').to_string();
            let names_directory = !key.is_empty() && base.join(&key).is_dir();
            let normalized = if entry.ends_with('/') || names_directory {
                format!("{}/", key)
            } else {
                entry
            };
            (key, normalized)
        })
        .collect();

    let mut added = Vec::new();
    let mut listing: Vec<PathBuf> = fs::read_dir(base)
        .with_context(|| format!("Failed to list {:?}", base))?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<_>>()
        .with_context(|| format!("Failed to list {:?}", base))?;
    listing.sort();

    for path in listing {
        if !path.is_dir() || is_git_repo(&path) {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        if !entries.contains_key(&name) {
            let entry = format!("{}/", name);
            added.push(entry.clone());
            entries.insert(name, entry);
        }
    }

    ignore_file.rewrite(header, entries.values())?;

    if added.is_empty() {
        debug!("No new directories for {}", ignore_file.path().display());
    } else {
        info!(
            "Added {} directories to {}",
            added.len(),
            ignore_file.path().display()
        );
    }

    Ok(IgnoreUpdate {
        path: ignore_file.path().to_path_buf(),
        added,
    })
}
