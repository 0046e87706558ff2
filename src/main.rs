use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reposweep::config::{CommitMode, IgnoreMode};
use reposweep::gitignore::{self, IgnoreUpdate};
use reposweep::sync::plan_action;
use reposweep::{
    discover_repositories, AutoMessage, CommitMessageSource, Config, GitCli, HealthCheck,
    RepoFilter, StdinPrompt, SyncEngine, SyncResult,
};

#[derive(Parser)]
#[command(name = "reposweep")]
#[command(about = "Keep every git checkout under a directory in step with its upstream")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory to walk (defaults to the configured base directory, then the working directory)
    #[arg(short, long, global = true)]
    base_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Update the ignore list, then sync every repository (the default)
    Sync {
        /// Fetch and classify only; never commit, push or pull
        #[arg(long)]
        dry_run: bool,

        /// Ask for a commit message instead of using the automatic one
        #[arg(long)]
        prompt: bool,

        /// Count untracked files as pending changes
        #[arg(long)]
        include_untracked: bool,
    },

    /// Update the ignore list of the base directory only
    Ignore {
        /// Override the configured maintenance mode
        #[arg(long, value_enum)]
        mode: Option<IgnoreMode>,
    },

    /// List repositories that would be synced
    List,

    /// Write a configuration file with default settings
    Init {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// System health check and diagnostics
    Doctor,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // init may name a config file that does not exist yet
    let config = match (&cli.command, cli.config.as_deref()) {
        (Some(Commands::Init { .. }), Some(path)) if !path.exists() => Config::default(),
        (_, path) => load_config(path)?,
    };
    init_logging(cli.verbose, &config.logging.level)?;
    info!("Starting reposweep v{}", env!("CARGO_PKG_VERSION"));

    let base_dir = config.resolve_base_directory(cli.base_dir.as_deref())?;

    match cli.command.unwrap_or(Commands::Sync {
        dry_run: false,
        prompt: false,
        include_untracked: false,
    }) {
        Commands::Sync {
            dry_run,
            prompt,
            include_untracked,
        } => cmd_sync(&base_dir, dry_run, prompt, include_untracked, config).await,
        Commands::Ignore { mode } => {
            let mode = mode.unwrap_or(config.gitignore.mode);
            cmd_ignore(&base_dir, mode, &config)
        }
        Commands::List => cmd_list(&base_dir, &config),
        Commands::Init { force } => cmd_init(cli.config, &base_dir, force),
        Commands::Doctor => cmd_doctor(&base_dir, cli.config),
    }
}

/// Initialize logging: RUST_LOG wins, then --verbose, then the configured level
fn init_logging(verbose: bool, level: &str) -> Result<()> {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_or_default(),
    }
}

/// Maintain the ignore list, then sync each discovered repository in turn
async fn cmd_sync(
    base_dir: &Path,
    dry_run: bool,
    prompt: bool,
    include_untracked: bool,
    mut config: Config,
) -> Result<()> {
    if !dry_run {
        cmd_ignore(base_dir, config.gitignore.mode, &config)?;
    }

    if prompt {
        config.sync.commit_mode = CommitMode::Prompt;
    }
    if include_untracked {
        config.sync.include_untracked = true;
    }

    let filter = RepoFilter::new(&config.sync.exclude_patterns)?;
    println!("🔍 Discovering repositories in {}...", base_dir.display());
    let queue = discover_repositories(base_dir, &filter);
    println!("   Found {} repositories", queue.len());

    let git = Arc::new(GitCli::new(
        config.sync.command_timeout.map(Duration::from_secs),
    ));
    let messages: Arc<dyn CommitMessageSource> = match config.sync.commit_mode {
        CommitMode::Auto => Arc::new(AutoMessage::new(config.sync.auto_commit_message.clone())),
        CommitMode::Prompt => Arc::new(StdinPrompt::new()),
    };
    let engine = SyncEngine::new(git, messages, config.sync.clone());

    if dry_run {
        println!("\n🔍 Dry run mode - analyzing repository states");
        for (path, status) in engine.dry_run(queue).await {
            match status {
                Ok(status) => println!(
                    "   {} {}: {} ({} ahead, {} behind{}) -> {:?}",
                    state_icon(status.state),
                    path.display(),
                    status.state,
                    status.ahead,
                    status.behind,
                    if status.has_pending_changes {
                        ", uncommitted changes"
                    } else {
                        ""
                    },
                    plan_action(&status)
                ),
                Err(e) => println!("   ❌ {}: {:#}", path.display(), e),
            }
        }
        return Ok(());
    }

    let summary = engine.run(queue).await;

    println!();
    for result in &summary.results {
        match result {
            SyncResult::UpToDate { path } => {
                println!("   ✅ No changes detected in {}", path.display())
            }
            SyncResult::Pushed { path, committed } => println!(
                "   ⬆️  Pushed {}{}",
                path.display(),
                if *committed { " (committed pending changes)" } else { "" }
            ),
            SyncResult::Pulled {
                path,
                commits_updated,
            } => println!("   ⬇️  Pulled {} commits into {}", commits_updated, path.display()),
            SyncResult::Diverged { path, ahead, behind } => println!(
                "   ⚠️  {} has diverged from the remote ({} ahead, {} behind). Manual update required.",
                path.display(),
                ahead,
                behind
            ),
            SyncResult::NoUpstream { path } => {
                println!("   ⏭️  {} has no upstream branch", path.display())
            }
            SyncResult::Failed { path, error } => {
                println!("   ❌ Failed to sync {}: {}", path.display(), error)
            }
        }
    }

    println!("\n🎉 Synchronization Complete!");
    println!("   📊 Total repositories: {}", summary.total_repositories);
    println!("   ⬆️  Pushed: {}", summary.pushed);
    println!("   ⬇️  Pulled: {}", summary.pulled);
    println!("   ✅ Up to date: {}", summary.up_to_date);
    println!("   ⚠️  Diverged: {}", summary.diverged);
    println!("   ⏭️  No upstream: {}", summary.no_upstream);
    println!("   ❌ Failed: {}", summary.failed);
    println!("   ⏱️  Duration: {:.2}s", summary.duration.as_secs_f64());

    Ok(())
}

fn state_icon(state: reposweep::SyncState) -> &'static str {
    use reposweep::SyncState::*;
    match state {
        UpToDate => "✅",
        Ahead => "⬆️ ",
        Behind => "⬇️ ",
        Diverged => "⚠️ ",
        NoUpstream => "⏭️ ",
    }
}

/// Run the ignore-list maintainer once; filesystem errors abort the run
fn cmd_ignore(base_dir: &Path, mode: IgnoreMode, config: &Config) -> Result<()> {
    let settings = &config.gitignore;

    let update = match mode {
        IgnoreMode::Off => return Ok(()),
        IgnoreMode::Append => {
            let exclusions =
                gitignore::default_exclusions(&settings.exclude_names, &settings.file_name);
            gitignore::append_new_entries(base_dir, &settings.file_name, &exclusions)?
        }
        IgnoreMode::Rewrite => gitignore::rewrite_with_non_repositories(
            base_dir,
            &settings.file_name,
            &settings.header,
        )?,
    };

    print_ignore_update(&update);
    Ok(())
}

fn print_ignore_update(update: &IgnoreUpdate) {
    if update.is_noop() {
        println!("No new entries to add to {}.", update.path.display());
    } else {
        println!(
            "Added {} new entries to {}.",
            update.added.len(),
            update.path.display()
        );
    }
}

/// List repositories that would be synced
fn cmd_list(base_dir: &Path, config: &Config) -> Result<()> {
    let filter = RepoFilter::new(&config.sync.exclude_patterns)?;
    let queue = discover_repositories(base_dir, &filter);

    println!("Repositories ({}): ", queue.len());
    for path in queue {
        let display = path.strip_prefix(base_dir).unwrap_or(&path);
        println!("  📁 {}", display.display());
    }

    Ok(())
}

/// Write a default configuration file pointing at the base directory
fn cmd_init(config_path: Option<PathBuf>, base_dir: &Path, force: bool) -> Result<()> {
    let config_path = match config_path {
        Some(path) => path,
        None => Config::default_config_path()?,
    };

    if config_path.exists() && !force {
        println!("⚠️  Configuration already exists: {}", config_path.display());
        println!("   Use --force to overwrite it");
        return Ok(());
    }

    let config = Config {
        base_directory: Some(base_dir.display().to_string()),
        ..Default::default()
    };
    config.save(&config_path)?;

    println!("✅ reposweep initialized successfully!");
    println!("   Config: {}", config_path.display());
    println!("   Base directory: {}", base_dir.display());

    Ok(())
}

/// System health check and diagnostics
fn cmd_doctor(base_dir: &Path, config_path: Option<PathBuf>) -> Result<()> {
    let health = HealthCheck::run(base_dir, config_path);
    print_health_report(&health);

    if !health.all_passed() {
        std::process::exit(1);
    }
    Ok(())
}

/// Print health check report to stdout
fn print_health_report(health: &HealthCheck) {
    use reposweep::health::CheckResult;

    fn print_check(name: &str, result: &CheckResult) {
        println!("{}:", name);
        let icon = if result.passed {
            if result.is_warning {
                "⚠️ "
            } else {
                "✅"
            }
        } else {
            "❌"
        };
        println!("  {} {}", icon, result.message);
        if let Some(details) = &result.details {
            for line in details.lines() {
                println!("     {}", line);
            }
        }
    }

    println!("🔍 reposweep System Diagnostics");
    println!();

    for (name, result) in health.all_checks() {
        print_check(name, result);
        println!();
    }

    if health.all_passed() {
        println!("✅ All checks passed");
    } else {
        println!("❌ Some checks failed");
    }
}
