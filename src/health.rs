//! System health checks for reposweep
//!
//! Preflight checks that verify git is usable and the base directory exists
//! before a sync is attempted.

use std::path::{Path, PathBuf};

use crate::Config;

/// Result of system health checks
#[derive(Debug, Clone)]
pub struct HealthCheck {
    /// Git installation status
    pub git: CheckResult,
    /// Base directory status
    pub base_dir: CheckResult,
    /// Configuration file status (warning only, defaults apply)
    pub config_file: CheckResult,
}

/// Result of an individual health check
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub passed: bool,
    pub message: String,
    pub details: Option<String>,
    pub is_warning: bool,
}

impl CheckResult {
    fn ok_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: None,
            is_warning: false,
        }
    }

    fn error_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: false,
            message: message.into(),
            details: Some(details.into()),
            is_warning: false,
        }
    }

    fn warning_with_details(message: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            passed: true,
            message: message.into(),
            details: Some(details.into()),
            is_warning: true,
        }
    }
}

impl HealthCheck {
    /// Run all health checks against an already resolved base directory
    pub fn run(base_dir: &Path, config_path: Option<PathBuf>) -> Self {
        Self {
            git: Self::check_git(),
            base_dir: Self::check_base_dir(base_dir),
            config_file: Self::check_config_file(config_path),
        }
    }

    /// Check if all required checks passed (excludes warnings)
    pub fn all_passed(&self) -> bool {
        self.git.passed && self.base_dir.passed
    }

    /// Get list of warnings
    pub fn warnings(&self) -> Vec<&CheckResult> {
        [&self.git, &self.base_dir, &self.config_file]
            .into_iter()
            .filter(|r| r.is_warning)
            .collect()
    }

    /// Check git installation
    fn check_git() -> CheckResult {
        match std::process::Command::new("git").arg("--version").output() {
            Ok(output) if output.status.success() => {
                let version = String::from_utf8_lossy(&output.stdout);
                CheckResult::ok_with_details("Git installed", version.trim().to_string())
            }
            Ok(_) => CheckResult::error("Git command failed"),
            Err(_) => CheckResult::error_with_details(
                "Git not found in PATH",
                "Install git: https://git-scm.com/downloads",
            ),
        }
    }

    /// Check base directory exists
    fn check_base_dir(base_dir: &Path) -> CheckResult {
        if base_dir.is_dir() {
            CheckResult::ok_with_details("Base directory exists", base_dir.display().to_string())
        } else {
            CheckResult::error_with_details(
                "Base directory does not exist",
                format!("Run: mkdir -p {}", base_dir.display()),
            )
        }
    }

    /// Check for a configuration file (warning only)
    fn check_config_file(config_path: Option<PathBuf>) -> CheckResult {
        let resolved = match config_path {
            Some(path) => Ok(path),
            None => Config::default_config_path(),
        };
        let path = match resolved {
            Ok(path) => path,
            Err(e) => {
                return CheckResult::warning_with_details(
                    "Configuration directory unavailable",
                    e.to_string(),
                )
            }
        };

        if path.exists() {
            CheckResult::ok_with_details("Configuration file found", path.display().to_string())
        } else {
            CheckResult::warning_with_details(
                "No configuration file, using defaults",
                "Run: reposweep init",
            )
        }
    }

    /// Get all checks as a slice for iteration
    pub fn all_checks(&self) -> [(&'static str, &CheckResult); 3] {
        [
            ("Git", &self.git),
            ("Base Directory", &self.base_dir),
            ("Configuration", &self.config_file),
        ]
    }
}
