//! # Tryton Tasks Library
//!
//! This library provides the multi-repository synchronization engine behind
//! the `tryton-tasks` command-line tool. A Tryton customer workspace is a
//! root directory holding dozens of Mercurial and Git working copies listed
//! in INI manifests, optionally with a quilt patch series applied on top.
//!
//! ## Quick Example
//!
//! ```
//! use std::path::Path;
//! use tryton_tasks::manifest::{Manifest, ManifestOptions, RepoKind};
//! use tryton_tasks::registry::{self, Operation};
//!
//! let manifest = Manifest::parse(
//!     "[trytond]\nrepo = hg\nurl = https://hg.tryton.org/trytond\npath = ./trytond\n\
//!      [sao]\nrepo = git\nurl = https://github.com/tryton/sao\npath = ./public_data\n",
//!     Path::new("/workspace"),
//!     ManifestOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(manifest.len(), 2);
//! assert_eq!(manifest.get("sao").unwrap().kind, RepoKind::Git);
//!
//! // Git repositories cannot be pushed, so planning fails before any work.
//! assert!(registry::plan(Operation::Push, manifest.into_repositories()).is_err());
//! ```
//!
//! ## Core Concepts
//!
//! - **Manifest (`manifest`)**: Reads `config/*.cfg` and `local.cfg` into
//!   [`manifest::RepositoryDescriptor`] values.
//! - **Registry (`registry`)**: Maps a repository kind and an
//!   [`registry::Operation`] to the executor function handling it.
//! - **Executors (`scm`)**: One function per operation and kind, driving
//!   `hg` and `git` through the command runner.
//! - **Dispatcher (`dispatch`)**: Runs a plan over a bounded worker pool and
//!   aggregates the per-repository results.
//! - **Patch gate (`patches`)**: Unapplies the quilt series around batches
//!   that touch working copies.
//! - **Runner (`runner`)**: Spawns external commands with timeouts and
//!   incremental output.
//! - **Layout (`layout`)**: Keeps the config repository current and the
//!   module links in place around clones.
//!
//! ## Execution Flow
//!
//! [`sync::Workspace`] wires these together for one invocation:
//!
//! 1.  **Load**: read the manifests named by [`config::Settings`].
//! 2.  **Plan**: resolve a handler for every repository, failing the whole
//!     batch on an unsupported pair.
//! 3.  **Gate**: pop the patch stack if needed.
//! 4.  **Dispatch**: run the plan, at most `jobs` repositories at a time.
//! 5.  **Restore**: push the patch stack back to where it was.

pub mod config;
pub mod defaults;
pub mod dispatch;
pub mod error;
pub mod layout;
pub mod manifest;
pub mod output;
pub mod patches;
pub mod registry;
pub mod retry;
pub mod runner;
pub mod scm;
pub mod suggestions;
pub mod sync;

#[cfg(test)]
mod manifest_proptest;
#[cfg(test)]
mod test_support;
