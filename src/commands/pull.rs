//! # Pull Command Implementation
//!
//! Pulls every repository with the patch series unapplied. Mercurial working
//! copies are then moved to their pinned revision, or to the tip of their
//! manifest branch, unless `--no-update` is given.

use anyhow::Result;
use clap::Args;
use tryton_tasks::registry::Operation;
use tryton_tasks::scm::OperationOptions;

use super::{run_batch, Gate, Session};
use crate::cli::GlobalArgs;

/// Pull every repository and update the working copies
#[derive(Args, Debug)]
pub struct PullArgs {
    /// Only pull, leave Mercurial working copies where they are
    #[arg(long)]
    pub no_update: bool,

    /// Discard local changes when updating
    #[arg(long, conflicts_with = "no_update")]
    pub clean: bool,

    /// Pop and push patches with --force
    #[arg(short, long)]
    pub force: bool,
}

/// Execute the pull command
pub fn execute(args: PullArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    let workspace = session.workspace()?;
    let options = OperationOptions {
        update: !args.no_update,
        clean: args.clean,
        ..session.operation_options()
    };

    run_batch(
        &workspace,
        session.format,
        Gate::Patches { force: args.force },
        |observer| workspace.run(Operation::Pull, options, Some(observer)),
    )
}
