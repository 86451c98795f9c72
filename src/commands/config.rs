//! # Config Command Implementation
//!
//! Rewrites keys of the repository manifests in place. Every manifest file
//! the workspace reads is edited; patch-only sections are never touched.
//!
//! ## Subcommands
//!
//! - **`set-branch <BRANCH>`**: Write `branch = <BRANCH>` into every
//!   repository section.
//! - **`set-revision`**: Pin every repository to the revision it is at, as
//!   reported by the `revision` command. Repositories without a revision
//!   keep their section as is.

use anyhow::Result;
use clap::{Args, Subcommand};
use tryton_tasks::manifest;
use tryton_tasks::registry::Operation;
use tryton_tasks::suggestions;

use super::{check, collect_batch, Gate, Session};
use crate::cli::GlobalArgs;

/// Edit the repository manifests
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigSubcommand {
    /// Set the branch of every repository
    SetBranch(SetBranchArgs),
    /// Pin every repository to its current revision
    SetRevision,
}

/// Arguments for the config set-branch command
#[derive(Args, Debug)]
pub struct SetBranchArgs {
    /// Branch to write into the manifests
    #[arg(value_name = "BRANCH")]
    pub branch: String,
}

/// Execute the config command
pub fn execute(args: ConfigArgs, global: &GlobalArgs) -> Result<()> {
    match args.command {
        ConfigSubcommand::SetBranch(args) => set_branch(args, global),
        ConfigSubcommand::SetRevision => set_revision(global),
    }
}

fn set_branch(args: SetBranchArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    // Fails with hints when there is nothing to edit.
    session.workspace()?;

    for path in session.settings.manifest_files().map_err(suggestions::explain)? {
        let updated = manifest::set_key(&path, "branch", |_| Some(args.branch.clone()))
            .map_err(suggestions::explain)?;
        println!(
            "Set branch {} on {} repositories in {}",
            args.branch,
            updated,
            path.display()
        );
    }
    Ok(())
}

fn set_revision(global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    let workspace = session.workspace()?;
    let options = session.operation_options();

    let outcome = collect_batch(&workspace, session.format, Gate::Bypass, |observer| {
        workspace.run(Operation::Revision, options, Some(observer))
    })?;

    for path in session.settings.manifest_files().map_err(suggestions::explain)? {
        let updated = manifest::set_key(&path, "revision", |name| {
            outcome.get(name).and_then(|result| result.value.clone())
        })
        .map_err(suggestions::explain)?;
        eprintln!("Pinned {} repositories in {}", updated, path.display());
    }
    check(&outcome)
}
