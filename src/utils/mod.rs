use anyhow::Result;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, Registry, fmt, layer::SubscriberExt};

use crate::builders::hooks::{self, HookInstall};
use crate::builders::reporter::{ConsoleReporter, JsonReporter, Summary, ViolationReporter};
use crate::core::config::{ConfigFormat, ConfigManager, ConfigProvider};
use crate::core::engine::{FixOutcome, LintEngine};
use crate::core::git::{Git2Client, GitClient};

/// Output format of the `check` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

/// Installs the global `tracing` subscriber. Diagnostics go to stderr so
/// they never mix with reports. `RUST_LOG` applies unless `verbose` is set.
pub fn init_logging(verbose: bool) -> Result<()> {
    let filter = if verbose {
        EnvFilter::new("warn,import_order_lint=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let fmt_layer = fmt::layer().with_writer(std::io::stderr).with_target(false);
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

// Helper function to create ConfigManager instance
fn get_config_manager(config: Option<PathBuf>) -> Result<ConfigManager> {
    let config_manager = ConfigManager::new()?;
    Ok(match config {
        Some(path) => config_manager.with_config_path(path),
        None => config_manager,
    })
}

pub fn initialize_project(config: Option<PathBuf>) -> Result<()> {
    let config_manager = get_config_manager(config)?;
    let path = config_manager.get_config_path()?;
    if config_manager.initialize()? {
        println!("✓ Wrote default configuration to {}", path.display());
    } else {
        println!("ℹ️  Configuration already exists at {}", path.display());
    }
    println!("Run 'import-order-lint install-hook' to check staged files on every commit");
    Ok(())
}

pub fn check(
    config: Option<PathBuf>,
    paths: Vec<PathBuf>,
    staged: bool,
    format: ReportFormat,
    verbose: bool,
) -> Result<()> {
    let config_manager = get_config_manager(config)?;
    let project_root = config_manager.get_project_root().to_path_buf();
    let mut engine = LintEngine::new(&config_manager)?;

    let reports = if staged {
        let git = Git2Client::new(&project_root)?;
        engine.lint_staged(&git)?
    } else if paths.is_empty() {
        match Git2Client::new(&project_root) {
            Ok(git) => engine.lint_tracked(&git)?,
            Err(e) => {
                debug!("{e:#}; walking {} instead", project_root.display());
                engine.lint_paths(&[project_root])?
            }
        }
    } else {
        engine.lint_paths(&paths)?
    };

    let reporter: Box<dyn ViolationReporter> = match format {
        ReportFormat::Text => Box::new(ConsoleReporter::new(verbose)),
        ReportFormat::Json => Box::new(JsonReporter::new()),
    };
    reporter.generate_report(&reports)?;

    let summary = Summary::of(&reports);
    if summary.errors > 0 {
        anyhow::bail!("{} files could not be linted", summary.errors);
    }
    if summary.violations > 0 {
        anyhow::bail!(
            "Found {} import violations in {} files",
            summary.violations,
            summary.files_with_violations
        );
    }
    Ok(())
}

pub fn fix(config: Option<PathBuf>, paths: Vec<PathBuf>, verbose: bool) -> Result<()> {
    let config_manager = get_config_manager(config)?;
    let paths = if paths.is_empty() {
        vec![config_manager.get_project_root().to_path_buf()]
    } else {
        paths
    };
    let mut engine = LintEngine::new(&config_manager)?;
    let reports = engine.fix_paths(&paths)?;

    let mut rewritten = 0;
    for report in &reports {
        match &report.outcome {
            FixOutcome::Rewritten(_) => {
                rewritten += 1;
                println!("✓ Fixed {}", report.path);
            }
            FixOutcome::Skipped(reason) => println!("⚠️  Skipped {}: {reason}", report.path),
            FixOutcome::Unchanged if verbose => println!("  {} is already in order", report.path),
            FixOutcome::Unchanged => {}
        }
    }
    println!("📈 Rewrote {rewritten} of {} files", reports.len());
    Ok(())
}

pub fn validate(config: Option<PathBuf>) -> Result<()> {
    get_config_manager(config)?.validate_config()
}

pub fn export(config: Option<PathBuf>, file: String, format: String) -> Result<()> {
    let config_manager = get_config_manager(config)?;
    config_manager.export_config(&file, ConfigFormat::parse(&format))?;
    println!("✓ Exported configuration to {file}");
    Ok(())
}

pub fn install_hook(config: Option<PathBuf>) -> Result<()> {
    let config_manager = get_config_manager(config)?;
    let git = Git2Client::new(config_manager.get_project_root())?;
    match hooks::install_pre_commit_hook(&git.get_git_dir())? {
        HookInstall::Installed => println!("✓ Installed pre-commit hook"),
        HookInstall::AlreadyInstalled => println!("ℹ️  pre-commit hook already installed"),
        HookInstall::ReplacedExisting => {
            println!("ℹ️  Backed up existing pre-commit hook to pre-commit.backup");
            println!("✓ Installed pre-commit hook");
        }
    }
    Ok(())
}
