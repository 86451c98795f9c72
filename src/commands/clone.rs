//! # Clone Command Implementation
//!
//! Clones every manifest repository whose working copy does not exist yet.
//! Repositories already present are left alone, so running `clone` on a
//! complete workspace does nothing and succeeds.
//!
//! The config repository is pulled first so the manifests are current. The
//! module links inside the server are removed before cloning and recreated
//! afterwards, even when some clones failed.
//!
//! Clones are not gated: a missing working copy has no patches applied.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use log::{debug, warn};
use tryton_tasks::layout;
use tryton_tasks::scm::OperationContext;

use super::{check, collect_batch, Gate, Session};
use crate::cli::{GlobalArgs, OutputFormat};

/// Clone the repositories that are missing from the workspace
#[derive(Args, Debug)]
pub struct CloneArgs {
    /// Seconds before a single clone attempt is killed and retried
    ///
    /// Overrides `clone_timeout` from the user settings file.
    #[arg(long, value_name = "SECONDS")]
    pub timeout: Option<u64>,
}

/// Execute the clone command
pub fn execute(args: CloneArgs, global: &GlobalArgs) -> Result<()> {
    let mut session = Session::new(global)?;
    if let Some(timeout) = args.timeout {
        session.settings.clone_timeout = Duration::from_secs(timeout);
    }
    let root = session.settings.root.clone();
    let options = session.operation_options();

    let ctx = OperationContext::new(session.executor(), options.clone());
    if let Some(pulled) = layout::update_config_repository(&root, &ctx)? {
        if session.format == OutputFormat::Text {
            pulled.stdout.iter().for_each(|line| println!("{}", line));
        }
        pulled.stderr.iter().for_each(|line| eprintln!("{}", line));
        if pulled.failed() {
            warn!("the config repository could not be pulled, cloning from the manifests on disk");
        }
    }

    let workspace = session.workspace()?;
    let removed = layout::remove_module_links(&root)?;
    debug!("removed {} module links", removed);

    let outcome = collect_batch(&workspace, session.format, Gate::Bypass, |observer| {
        workspace.clone_missing(options, Some(observer))
    })?;
    layout::create_links(&root)?;
    check(&outcome)
}
