//! # Quilt Command Implementation
//!
//! Inspects and moves the workspace patch series (`patches/series`) by hand.
//! Batch commands do the same pop and push around their work; these
//! subcommands are for recovering after a conflict or preparing a patch.
//!
//! ## Subcommands
//!
//! - **`applied`**: List the applied patches, bottom first
//! - **`unapplied`**: List the patches that can still be pushed
//! - **`push [PATCH]`**: Apply the series, or up to PATCH
//! - **`pop`**: Remove every applied patch
//!
//! None of them needs a repository manifest.

use anyhow::Result;
use clap::{Args, Subcommand};
use tryton_tasks::patches::{self, PatchStackState, PushTarget, QuiltEngine, StackChange};
use tryton_tasks::suggestions;

use super::Session;
use crate::cli::{GlobalArgs, OutputFormat};

/// Inspect and move the workspace patch series
#[derive(Args, Debug)]
pub struct QuiltArgs {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: QuiltSubcommand,
}

#[derive(Subcommand, Debug)]
pub enum QuiltSubcommand {
    /// List the applied patches
    Applied,
    /// List the patches not applied yet
    Unapplied,
    /// Apply patches from the series
    Push(PushArgs),
    /// Remove all applied patches
    Pop(PopArgs),
}

/// Arguments for the quilt push command
#[derive(Args, Debug)]
pub struct PushArgs {
    /// Stop after this patch instead of applying the whole series
    #[arg(value_name = "PATCH")]
    pub patch: Option<String>,

    /// Apply patches even when they leave rejects behind
    #[arg(short, long)]
    pub force: bool,
}

/// Arguments for the quilt pop command
#[derive(Args, Debug)]
pub struct PopArgs {
    /// Remove patches even when their files were modified
    #[arg(short, long)]
    pub force: bool,
}

/// Execute the quilt command
pub fn execute(args: QuiltArgs, global: &GlobalArgs) -> Result<()> {
    let session = Session::new(global)?;
    let root = session.settings.root.clone();

    match args.command {
        QuiltSubcommand::Applied => {
            let state = PatchStackState::load(&root).map_err(suggestions::explain)?;
            list(state.applied_patches(), session.format)
        }
        QuiltSubcommand::Unapplied => {
            let state = PatchStackState::load(&root).map_err(suggestions::explain)?;
            list(state.unapplied_patches(), session.format)
        }
        QuiltSubcommand::Push(args) => {
            let engine = QuiltEngine::new(&root, session.executor());
            let target = match args.patch {
                Some(patch) => {
                    let state = PatchStackState::load(&root).map_err(suggestions::explain)?;
                    if !state.series.contains(&patch) {
                        return Err(suggestions::unknown_patch(&patch, &state.series));
                    }
                    PushTarget::UpTo(patch)
                }
                None => PushTarget::All,
            };
            report(patches::push_to(&engine, &target, args.force))
        }
        QuiltSubcommand::Pop(args) => {
            let engine = QuiltEngine::new(&root, session.executor());
            report(patches::pop_all(&engine, args.force))
        }
    }
}

fn list(names: &[String], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(names)?),
        OutputFormat::Text => {
            for name in names {
                println!("{}", name);
            }
        }
    }
    Ok(())
}

fn report(change: StackChange) -> Result<()> {
    println!("{}", change.message);
    if change.exit_code == 0 {
        return Ok(());
    }
    match change.conflict {
        Some(patch) => Err(suggestions::patch_conflict(&patch, "quilt refused to apply it")),
        None => anyhow::bail!("The patch stack was not changed"),
    }
}
