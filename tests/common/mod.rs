//! Common test utilities: throwaway git remotes and checkouts for reposweep tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Run git in `dir`, panicking with stderr on failure
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to execute git");

    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );

    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Local identity so commits work without a global git config
pub fn configure_identity(repo: &Path) {
    git(repo, &["config", "user.name", "Test User"]);
    git(repo, &["config", "user.email", "test@example.com"]);
    git(repo, &["config", "commit.gpgsign", "false"]);
}

/// Write `name` in `repo` and commit it
pub fn commit_file(repo: &Path, name: &str, content: &str) {
    std::fs::write(repo.join(name), content).expect("Failed to write file");
    git(repo, &["add", name]);
    git(repo, &["commit", "-q", "-m", &format!("update {}", name)]);
}

pub fn head(repo: &Path) -> String {
    git(repo, &["rev-parse", "HEAD"])
}

pub fn commit_count(repo: &Path) -> usize {
    git(repo, &["rev-list", "--count", "HEAD"])
        .parse()
        .expect("rev-list --count returns a number")
}

/// A bare remote, a "seed" clone standing in for another machine, and a
/// base directory holding the checkout under test (`base/work`)
pub struct GitFixture {
    pub temp_dir: TempDir,
    pub remote: PathBuf,
    pub seed: PathBuf,
    pub base: PathBuf,
    pub work: PathBuf,
}

impl GitFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path();

        let remote = root.join("remote.git");
        let seed = root.join("seed");
        let base = root.join("base");
        let work = base.join("work");

        git(root, &["init", "-q", "--bare", "remote.git"]);
        git(root, &["clone", "-q", "remote.git", "seed"]);
        configure_identity(&seed);
        git(&seed, &["checkout", "-q", "-b", "main"]);
        commit_file(&seed, "README.txt", "initial\n");
        git(&seed, &["push", "-q", "-u", "origin", "main"]);

        std::fs::create_dir_all(&base).expect("Failed to create base dir");
        git(
            &base,
            &["clone", "-q", "-b", "main", remote.to_str().unwrap(), "work"],
        );
        configure_identity(&work);

        Self {
            temp_dir,
            remote,
            seed,
            base,
            work,
        }
    }

    /// Commit on the seed clone and publish it
    pub fn push_from_seed(&self, name: &str, content: &str) {
        commit_file(&self.seed, name, content);
        git(&self.seed, &["push", "-q"]);
    }

    /// Tip of `main` on the remote
    pub fn remote_head(&self) -> String {
        git(&self.remote, &["rev-parse", "main"])
    }

    /// A repository inside the base directory with a commit and no remote
    pub fn add_local_only_repo(&self, name: &str) -> PathBuf {
        let path = self.base.join(name);
        std::fs::create_dir_all(&path).expect("Failed to create repo dir");
        git(&path, &["init", "-q"]);
        configure_identity(&path);
        commit_file(&path, "file.txt", "local\n");
        path
    }

    /// Write a minimal config file and return its path
    pub fn write_config(&self, content: &str) -> PathBuf {
        let path = self.temp_dir.path().join("config.yml");
        std::fs::write(&path, content).expect("Failed to write test config");
        path
    }
}

/// Assertion helpers for test validation
pub fn assert_contains_all(text: &str, expected: &[&str]) {
    for item in expected {
        assert!(
            text.contains(item),
            "Expected text to contain '{}', but it didn't. Text: {}",
            item,
            text
        );
    }
}
