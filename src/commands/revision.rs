//! Print the newest revision of the current branch of every repository.

use anyhow::Result;
use clap::Args;
use tryton_tasks::registry::Operation;

use super::{run_batch, Gate, Session};
use crate::cli::GlobalArgs;

/// Print the tip revision of every repository
#[derive(Args, Debug)]
pub struct RevisionArgs {}

pub fn execute(_args: RevisionArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    let workspace = session.workspace()?;
    let options = session.operation_options();

    run_batch(&workspace, session.format, Gate::Bypass, |observer| {
        workspace.run(Operation::Revision, options, Some(observer))
    })
}
