//! Push Mercurial repositories to their manifest URL. Git repositories and
//! repositories served over HTTP are skipped.

use anyhow::Result;
use clap::Args;
use tryton_tasks::registry::Operation;
use tryton_tasks::scm::OperationOptions;

use super::{run_batch, Gate, Session};
use crate::cli::GlobalArgs;

/// Push Mercurial repositories to their manifest URL
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Allow creating branches the remote does not have
    #[arg(long)]
    pub new_branch: bool,
}

pub fn execute(args: PushArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    let workspace = session.workspace()?;
    let options = OperationOptions {
        new_branches: args.new_branch,
        ..session.operation_options()
    };

    run_batch(&workspace, session.format, Gate::Bypass, |observer| {
        workspace.run_supported(Operation::Push, options, Some(observer))
    })
}
