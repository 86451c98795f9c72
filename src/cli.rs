//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::commands;

/// Tryton Tasks - Keep the repositories of a Tryton workspace in sync
#[derive(Parser, Debug)]
#[command(name = "tryton-tasks")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalArgs,
}

/// Output format of batch results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored lines, as the tools print them
    Text,
    /// One JSON report per batch
    Json,
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Workspace root; manifest paths are relative to it
    #[arg(long, global = true, value_name = "DIR", env = "TRYTON_TASKS_ROOT", default_value = ".")]
    pub root: PathBuf,

    /// Manifest file to read instead of config/*.cfg and local.cfg
    ///
    /// May be given several times; later files override earlier ones.
    #[arg(short = 'c', long = "config", global = true, value_name = "PATH")]
    pub manifests: Vec<PathBuf>,

    /// Include repositories marked `unstable = true`
    #[arg(long, global = true)]
    pub unstable: bool,

    /// Ignore pinned revisions and follow branches
    #[arg(long, global = true)]
    pub development: bool,

    /// Do not unapply the patch series around batch operations
    #[arg(long, global = true)]
    pub no_quilt: bool,

    /// Treat repositories that are not cloned yet as successes
    #[arg(long, global = true)]
    pub ignore_missing: bool,

    /// Maximum number of repositories processed at the same time
    #[arg(
        short = 'j',
        long,
        global = true,
        value_name = "N",
        env = "TRYTON_TASKS_JOBS",
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub jobs: Option<u16>,

    /// Colorize output (always, never, auto)
    #[arg(
        long,
        global = true,
        value_name = "WHEN",
        default_value = "auto",
        value_parser = ["always", "never", "auto"]
    )]
    pub color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        default_value = "warn",
        value_parser = ["error", "warn", "info", "debug", "trace"]
    )]
    pub log_level: String,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Clone the repositories that are missing from the workspace
    Clone(commands::clone::CloneArgs),

    /// Pull every repository and update the working copies
    Pull(commands::pull::PullArgs),

    /// Show the changed files of every repository
    Status(commands::status::StatusArgs),

    /// Show the diff of every repository
    Diff(commands::diff::DiffArgs),

    /// Push Mercurial repositories to their manifest URL
    Push(commands::push::PushArgs),

    /// Update Mercurial working copies to their branch or pinned revision
    Update(commands::update::UpdateArgs),

    /// Switch Mercurial working copies to another branch
    Branch(commands::branch::BranchArgs),

    /// List the branches of every repository
    Branches(commands::branches::BranchesArgs),

    /// Discard local changes and untracked files
    Clean(commands::clean::CleanArgs),

    /// Show local changes against an empty base, file by file
    ModuleDiff(commands::module_diff::ModuleDiffArgs),

    /// Pull and update existing repositories, then clone missing ones
    Fetch(commands::fetch::FetchArgs),

    /// Print the tip revision of every repository
    Revision(commands::revision::RevisionArgs),

    /// Print the version declared in each repository's tryton.cfg
    ModuleVersion(commands::module_version::ModuleVersionArgs),

    /// Inspect and move the workspace patch series
    Quilt(commands::quilt::QuiltArgs),

    /// Edit the repository manifests
    Config(commands::config::ConfigArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    pub fn global(&self) -> &GlobalArgs {
        &self.global
    }

    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        let global = &self.global;
        match self.command {
            Commands::Clone(args) => commands::clone::execute(args, global),
            Commands::Pull(args) => commands::pull::execute(args, global),
            Commands::Status(args) => commands::status::execute(args, global),
            Commands::Diff(args) => commands::diff::execute(args, global),
            Commands::Push(args) => commands::push::execute(args, global),
            Commands::Update(args) => commands::update::execute(args, global),
            Commands::Branch(args) => commands::branch::execute(args, global),
            Commands::Branches(args) => commands::branches::execute(args, global),
            Commands::Clean(args) => commands::clean::execute(args, global),
            Commands::ModuleDiff(args) => commands::module_diff::execute(args, global),
            Commands::Fetch(args) => commands::fetch::execute(args, global),
            Commands::Revision(args) => commands::revision::execute(args, global),
            Commands::ModuleVersion(args) => commands::module_version::execute(args, global),
            Commands::Quilt(args) => commands::quilt::execute(args, global),
            Commands::Config(args) => commands::config::execute(args, global),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}
