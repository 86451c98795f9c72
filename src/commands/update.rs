//! # Update Command Implementation
//!
//! Moves Mercurial working copies without contacting the remote. Git
//! repositories are skipped.
//!
//! ## Targets
//!
//! - Default: the pinned revision, or the working copy's current branch
//!   head.
//! - `--clean`: the pinned revision, or the manifest branch, discarding
//!   local changes.

use anyhow::Result;
use clap::Args;
use tryton_tasks::registry::Operation;
use tryton_tasks::scm::OperationOptions;

use super::{run_batch, Gate, Session};
use crate::cli::GlobalArgs;

/// Update Mercurial working copies to their branch or pinned revision
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Discard local changes and move to the manifest branch
    #[arg(short = 'C', long)]
    pub clean: bool,

    /// Pop and push patches with --force
    #[arg(short, long)]
    pub force: bool,
}

/// Execute the update command
pub fn execute(args: UpdateArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    let workspace = session.workspace()?;
    let options = OperationOptions {
        clean: args.clean,
        ..session.operation_options()
    };

    run_batch(
        &workspace,
        session.format,
        Gate::Patches { force: args.force },
        |observer| workspace.run_supported(Operation::Update, options, Some(observer)),
    )
}
