use anyhow::{Context, Result};
use dirs::config_dir;
use path_clean::PathClean;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for reposweep
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    /// Directory whose tree is walked for repositories (defaults to the working directory)
    #[serde(default)]
    pub base_directory: Option<String>,

    /// Ignore-list maintenance settings
    #[serde(default)]
    pub gitignore: GitignoreConfig,

    /// Synchronization behavior settings
    #[serde(default)]
    pub sync: SyncConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// How the ignore list in the base directory is maintained
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum IgnoreMode {
    /// Rewrite the file with every non-repository subdirectory, sorted
    #[default]
    Rewrite,
    /// Append entries for every new child that is not already listed
    Append,
    /// Leave the ignore file alone
    Off,
}

/// Ignore-list configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GitignoreConfig {
    #[serde(default)]
    pub mode: IgnoreMode,

    /// Name of the ignore file inside the base directory
    #[serde(default = "default_ignore_file")]
    pub file_name: String,

    /// Comment line written at the top of a rewritten file
    #[serde(default = "default_ignore_header")]
    pub header: String,

    /// Names never added in append mode
    #[serde(default = "default_exclude_names")]
    pub exclude_names: Vec<String>,
}

/// Where the commit message for pending changes comes from
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CommitMode {
    /// Use `auto_commit_message` without asking
    #[default]
    Auto,
    /// Ask on standard input for every repository that needs a commit
    Prompt,
}

/// Synchronization configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SyncConfig {
    #[serde(default)]
    pub commit_mode: CommitMode,

    #[serde(default = "default_commit_message")]
    pub auto_commit_message: String,

    /// Count untracked files as pending changes (`status` without `-uno`)
    #[serde(default)]
    pub include_untracked: bool,

    /// Fast-forward only pulls
    #[serde(default)]
    pub fast_forward_only: bool,

    /// Timeout for a single git command in seconds; unset waits forever
    #[serde(default)]
    pub command_timeout: Option<u64>,

    /// Repository exclusion patterns (regex against the path relative to the base directory)
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

/// Logging configuration
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String, // "info"
}

// Default value functions
fn default_ignore_file() -> String {
    ".gitignore".to_string()
}
fn default_ignore_header() -> String {
    "# Directories to ignore".to_string()
}
fn default_exclude_names() -> Vec<String> {
    vec![
        ".gitignore".to_string(),
        ".git".to_string(),
        "README.md".to_string(),
    ]
}
fn default_commit_message() -> String {
    "Automatic commit by reposweep".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

// Default implementations
impl Default for GitignoreConfig {
    fn default() -> Self {
        Self {
            mode: IgnoreMode::default(),
            file_name: default_ignore_file(),
            header: default_ignore_header(),
            exclude_names: default_exclude_names(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            commit_mode: CommitMode::default(),
            auto_commit_message: default_commit_message(),
            include_untracked: false,
            fast_forward_only: false,
            command_timeout: None,
            exclude_patterns: Vec::new(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load(&config_path)
        } else {
            tracing::debug!("No configuration at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Save configuration to a file, creating its directory if needed
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = serde_yaml::to_string(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    /// Get the default configuration file path (XDG compliant)
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = config_dir().context("Failed to get user config directory")?;

        Ok(config_dir.join("reposweep").join("config.yml"))
    }

    /// Resolve the base directory once, so every later operation receives it explicitly.
    ///
    /// An override (from the command line) wins over the configured value; with
    /// neither, the process working directory is used.
    pub fn resolve_base_directory(&self, override_dir: Option<&Path>) -> Result<PathBuf> {
        let raw = match (override_dir, &self.base_directory) {
            (Some(dir), _) => dir.to_path_buf(),
            (None, Some(configured)) => {
                let expanded = shellexpand::full(configured)
                    .context("Failed to expand base_directory path")?;
                PathBuf::from(expanded.as_ref())
            }
            (None, None) => {
                std::env::current_dir().context("Failed to determine working directory")?
            }
        };

        let absolute = if raw.is_absolute() {
            raw
        } else {
            std::env::current_dir()
                .context("Failed to determine working directory")?
                .join(raw)
        };

        Ok(absolute.clean())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_config_default_values() {
        let config = Config::default();

        assert!(config.base_directory.is_none());
        assert_eq!(config.gitignore.mode, IgnoreMode::Rewrite);
        assert_eq!(config.gitignore.file_name, ".gitignore");
        assert!(config
            .gitignore
            .exclude_names
            .contains(&"README.md".to_string()));
        assert_eq!(config.sync.commit_mode, CommitMode::Auto);
        assert!(!config.sync.include_untracked);
        assert!(!config.sync.fast_forward_only);
        assert!(config.sync.command_timeout.is_none());
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_load_nonexistent_file() {
        let nonexistent_path = Path::new("/nonexistent/path/config.yml");
        let result = Config::load(nonexistent_path);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("reposweep").join("config.yml");

        let mut config = Config::default();
        config.base_directory = Some("/custom/path".to_string());
        config.gitignore.mode = IgnoreMode::Append;
        config.sync.commit_mode = CommitMode::Prompt;
        config.sync.command_timeout = Some(120);

        config.save(&config_path).expect("Failed to save config");
        let loaded = Config::load(&config_path).expect("Failed to load config");

        assert_eq!(loaded.base_directory.as_deref(), Some("/custom/path"));
        assert_eq!(loaded.gitignore.mode, IgnoreMode::Append);
        assert_eq!(loaded.sync.commit_mode, CommitMode::Prompt);
        assert_eq!(loaded.sync.command_timeout, Some(120));
    }

    #[test]
    fn test_config_default_path_xdg() {
        let default_path = Config::default_config_path().expect("Failed to get default path");
        assert!(default_path.to_string_lossy().contains("reposweep"));
        assert!(default_path.to_string_lossy().ends_with("config.yml"));
    }

    #[test]
    fn test_yaml_parsing() {
        let yaml_content = r#"
base_directory: "~/projects"
gitignore:
  mode: append
  exclude_names: ["notes.md"]
sync:
  commit_mode: prompt
  include_untracked: true
  fast_forward_only: true
  command_timeout: 30
  exclude_patterns: ["^vendor/"]
logging:
  level: "debug"
"#;

        let config: Config = serde_yaml::from_str(yaml_content).expect("Failed to parse YAML");

        assert_eq!(config.base_directory.as_deref(), Some("~/projects"));
        assert_eq!(config.gitignore.mode, IgnoreMode::Append);
        assert_eq!(config.gitignore.exclude_names, vec!["notes.md".to_string()]);
        // unspecified keys keep their defaults
        assert_eq!(config.gitignore.file_name, ".gitignore");
        assert_eq!(config.sync.commit_mode, CommitMode::Prompt);
        assert!(config.sync.include_untracked);
        assert!(config.sync.fast_forward_only);
        assert_eq!(config.sync.command_timeout, Some(30));
        assert_eq!(config.sync.exclude_patterns, vec!["^vendor/".to_string()]);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_invalid_mode_rejected() {
        let result: Result<Config, _> = serde_yaml::from_str("gitignore:\n  mode: sometimes\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_base_directory_override_wins() {
        let mut config = Config::default();
        config.base_directory = Some("/configured".to_string());

        let resolved = config
            .resolve_base_directory(Some(Path::new("/override/./repos/../repos")))
            .unwrap();
        assert_eq!(resolved, PathBuf::from("/override/repos"));
    }

    #[test]
    fn test_resolve_base_directory_expands_variables() {
        env::set_var("TEST_REPOSWEEP_HOME", "/test/home");

        let mut config = Config::default();
        config.base_directory = Some("${TEST_REPOSWEEP_HOME}/dev".to_string());

        let resolved = config.resolve_base_directory(None).unwrap();
        assert_eq!(resolved, PathBuf::from("/test/home/dev"));

        env::remove_var("TEST_REPOSWEEP_HOME");
    }

    #[test]
    fn test_resolve_base_directory_defaults_to_cwd() {
        let config = Config::default();
        let resolved = config.resolve_base_directory(None).unwrap();
        assert_eq!(resolved, env::current_dir().unwrap().clean());
    }
}
