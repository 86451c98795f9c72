//! # Status Command Implementation
//!
//! Lists the changed files of every repository, grouped by kind of change,
//! and warns about working copies cloned from another URL than the
//! manifest's.

use anyhow::Result;
use clap::Args;
use tryton_tasks::registry::Operation;

use super::{run_batch, Gate, Session};
use crate::cli::GlobalArgs;

/// Show the changed files of every repository
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Pop and push patches with --force
    #[arg(short, long)]
    pub force: bool,

    /// Report changes with the patch series applied
    #[arg(long)]
    pub with_patches: bool,
}

/// Execute the status command
pub fn execute(args: StatusArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    let workspace = session.workspace()?;
    let options = session.operation_options();
    let gate = if args.with_patches {
        Gate::Bypass
    } else {
        Gate::Patches { force: args.force }
    };

    run_batch(&workspace, session.format, gate, |observer| {
        workspace.run(Operation::Status, options, Some(observer))
    })
}
