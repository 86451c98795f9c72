//! List the branches of every repository.
//!
//! The active branch is marked with `*` and the manifest branch is shown in
//! brackets. Lines are green when both agree, red when they differ.

use anyhow::Result;
use clap::Args;
use tryton_tasks::registry::Operation;

use super::{run_batch, Gate, Session};
use crate::cli::GlobalArgs;

/// List the branches of every repository
#[derive(Args, Debug)]
pub struct BranchesArgs {}

pub fn execute(_args: BranchesArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    let workspace = session.workspace()?;
    let options = session.operation_options();

    run_batch(&workspace, session.format, Gate::Bypass, |observer| {
        workspace.run(Operation::Branches, options, Some(observer))
    })
}
