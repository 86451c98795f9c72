//! # Diff Command Implementation
//!
//! Prints the working-copy diff of every repository. File paths are
//! prefixed with the repository location so the output of the whole
//! workspace applies from the root with `patch -p1`.

use anyhow::Result;
use clap::Args;
use tryton_tasks::registry::Operation;

use super::{run_batch, Gate, Session};
use crate::cli::GlobalArgs;

/// Show the diff of every repository
#[derive(Args, Debug)]
pub struct DiffArgs {}

/// Execute the diff command
pub fn execute(_args: DiffArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    let workspace = session.workspace()?;
    let options = session.operation_options();

    run_batch(&workspace, session.format, Gate::Bypass, |observer| {
        workspace.run(Operation::Diff, options, Some(observer))
    })
}
