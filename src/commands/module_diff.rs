//! Show, for every repository with local changes, the diff of the changed
//! files followed by their full content as a diff against an empty base.

use anyhow::Result;
use clap::Args;
use tryton_tasks::registry::Operation;

use super::{run_batch, Gate, Session};
use crate::cli::GlobalArgs;

/// Show local changes against an empty base, file by file
#[derive(Args, Debug)]
pub struct ModuleDiffArgs {}

pub fn execute(_args: ModuleDiffArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    let workspace = session.workspace()?;
    let options = session.operation_options();

    run_batch(&workspace, session.format, Gate::Bypass, |observer| {
        workspace.run(Operation::ModuleDiff, options, Some(observer))
    })
}
