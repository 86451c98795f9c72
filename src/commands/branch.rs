//! # Branch Command Implementation
//!
//! Switches every Mercurial working copy to the given branch. Repositories
//! that do not have the branch stay where they are; Git repositories are
//! skipped.
//!
//! The manifests are not edited; use `config set-branch` for that.

use anyhow::Result;
use clap::Args;
use tryton_tasks::registry::Operation;
use tryton_tasks::scm::OperationOptions;

use super::{run_batch, Gate, Session};
use crate::cli::GlobalArgs;

/// Switch Mercurial working copies to another branch
#[derive(Args, Debug)]
pub struct BranchArgs {
    /// Branch to switch to
    #[arg(value_name = "BRANCH")]
    pub branch: String,

    /// Discard local changes while switching
    #[arg(short = 'C', long)]
    pub clean: bool,

    /// Pop and push patches with --force
    #[arg(short, long)]
    pub force: bool,
}

/// Execute the branch command
pub fn execute(args: BranchArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    let workspace = session.workspace()?;
    let options = OperationOptions {
        target_branch: Some(args.branch),
        clean: args.clean,
        ..session.operation_options()
    };

    run_batch(
        &workspace,
        session.format,
        Gate::Patches { force: args.force },
        |observer| workspace.run_supported(Operation::BranchSwitch, options, Some(observer)),
    )
}
