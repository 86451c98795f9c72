//! Print the version every module declares in its `tryton.cfg`.

use anyhow::Result;
use clap::Args;
use tryton_tasks::registry::Operation;

use super::{run_batch, Gate, Session};
use crate::cli::GlobalArgs;

/// Print the version declared in each repository's tryton.cfg
#[derive(Args, Debug)]
pub struct ModuleVersionArgs {}

pub fn execute(_args: ModuleVersionArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    let workspace = session.workspace()?;
    let options = session.operation_options();

    run_batch(&workspace, session.format, Gate::Bypass, |observer| {
        workspace.run(Operation::ModuleVersion, options, Some(observer))
    })
}
