/// The Big IDEA:
/// A Next.js code base stays navigable only if every file imports things
/// the same way: framework first, then packages, then our own root modules,
/// then relative files, each block separated by one blank line. Modules
/// must be imported through their public entry point, never by reaching
/// into them or by climbing out with `../`.
/// This tool checks exactly that (and can rewrite the import block), from
/// the command line or from a pre-commit hook.
use anyhow::Result;
use clap::{Parser, Subcommand};
use import_order_lint::utils::{self, ReportFormat};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "import-order-lint")]
#[command(version, about = "Checks import grouping, ordering and module boundaries")]
struct Cli {
    /// Configuration file to use instead of .import-order.toml at the project root
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging and list files without violations
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write the default configuration for this project
    Init,
    /// Lint files; without paths every tracked file is checked
    Check {
        paths: Vec<PathBuf>,
        /// Lint the staged content of staged files
        #[arg(long, conflicts_with = "paths")]
        staged: bool,
        #[arg(long, value_enum, default_value = "text")]
        format: ReportFormat,
    },
    /// Rewrite import blocks into canonical order
    Fix { paths: Vec<PathBuf> },
    /// Check the configuration for errors and dead rules
    Validate,
    /// Export the configuration to another file
    Export {
        file: String,
        #[arg(long, default_value = "toml", value_parser = ["toml", "json", "yaml"])]
        format: String,
    },
    /// Install a git pre-commit hook running `check --staged`
    InstallHook,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    utils::init_logging(cli.verbose)?;

    match cli.command {
        Commands::Init => utils::initialize_project(cli.config),
        Commands::Check {
            paths,
            staged,
            format,
        } => utils::check(cli.config, paths, staged, format, cli.verbose),
        Commands::Fix { paths } => utils::fix(cli.config, paths, cli.verbose),
        Commands::Validate => utils::validate(cli.config),
        Commands::Export { file, format } => utils::export(cli.config, file, format),
        Commands::InstallHook => utils::install_hook(cli.config),
    }
}
