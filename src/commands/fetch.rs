//! # Fetch Command Implementation
//!
//! Brings a workspace up to date in one step: existing repositories are
//! pulled and updated, then the missing ones are cloned. Everything runs
//! with the patch series unapplied and the series is pushed back at the end.

use anyhow::Result;
use clap::Args;

use super::{run_batch, Gate, Session};
use crate::cli::GlobalArgs;

/// Pull and update existing repositories, then clone missing ones
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Pop and push patches with --force
    #[arg(short, long)]
    pub force: bool,
}

/// Execute the fetch command
pub fn execute(args: FetchArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    let workspace = session.workspace()?;
    let options = session.operation_options();

    run_batch(
        &workspace,
        session.format,
        Gate::Patches { force: args.force },
        |observer| workspace.fetch(options, Some(observer)),
    )
}
