//! # Clean Command Implementation
//!
//! Reverts every Mercurial working copy to its last changeset and deletes
//! untracked files. A working copy cloned from another URL than the
//! manifest's is removed entirely so that the next `clone` fetches it from
//! the right place.
//!
//! Since both steps lose data, the command asks first unless `--force` is
//! given. Git repositories report that cleaning is not implemented.

use anyhow::Result;
use clap::Args;
use tryton_tasks::registry::Operation;
use tryton_tasks::scm::OperationOptions;

use super::{confirm, run_batch, Gate, Session};
use crate::cli::GlobalArgs;

/// Discard local changes and untracked files
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Do not ask for confirmation
    #[arg(short, long)]
    pub force: bool,
}

/// Execute the clean command
pub fn execute(args: CleanArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    let workspace = session.workspace()?;

    let prompt = format!(
        "Discard local changes in {} repositories and remove working copies cloned from another URL?",
        workspace.repositories().len()
    );
    if !confirm(&prompt, args.force)? {
        println!("Clean cancelled.");
        return Ok(());
    }

    let options = OperationOptions {
        force: args.force,
        ..session.operation_options()
    };
    run_batch(
        &workspace,
        session.format,
        Gate::Patches { force: args.force },
        |observer| workspace.run(Operation::Clean, options, Some(observer)),
    )
}
