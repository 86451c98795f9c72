//! # Workspace Sync
//!
//! Ties the pieces together for one workspace: the manifest gives the
//! repositories, the registry plans the batch, the dispatcher runs it, and
//! the patch gate brackets operations that touch working copies.
//!
//! The gate and the batch are sequenced by the caller, so no repository
//! operation starts before patches are unapplied:
//!
//! ```text
//! gated(|| run(Pull)) : quilt pop -a -> hg pull ... -> quilt push <top>
//! ```

use log::info;

use crate::config::Settings;
use crate::dispatch::{BatchOutcome, Dispatcher, Observer};
use crate::error::Result;
use crate::manifest::{Manifest, RepositoryDescriptor};
use crate::patches::{GateOutcome, PatchGate, QuiltEngine};
use crate::registry::{self, Operation};
use crate::runner::CommandExecutor;
use crate::scm::{OperationContext, OperationOptions};

/// A loaded workspace ready to run batches.
pub struct Workspace<'a> {
    settings: &'a Settings,
    executor: &'a dyn CommandExecutor,
    manifest: Manifest,
}

impl<'a> Workspace<'a> {
    /// Reads the manifests named by `settings`.
    pub fn open(settings: &'a Settings, executor: &'a dyn CommandExecutor) -> Result<Self> {
        let manifest = settings.load_manifest()?;
        info!(
            "loaded {} repositories from {} manifest file(s)",
            manifest.len(),
            manifest.sources().len()
        );
        Ok(Self::new(settings, executor, manifest))
    }

    pub fn new(settings: &'a Settings, executor: &'a dyn CommandExecutor, manifest: Manifest) -> Self {
        Self {
            settings,
            executor,
            manifest,
        }
    }

    pub fn settings(&self) -> &Settings {
        self.settings
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn repositories(&self) -> &[RepositoryDescriptor] {
        self.manifest.repositories()
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(self.settings.jobs)
    }

    /// Runs `operation` on `repositories`. Nothing runs if one of them does
    /// not support it.
    pub fn run_on(
        &self,
        operation: Operation,
        repositories: Vec<RepositoryDescriptor>,
        options: OperationOptions,
        observer: Option<Observer<'_>>,
    ) -> Result<BatchOutcome> {
        let plan = registry::plan(operation, repositories)?;
        let ctx = OperationContext::new(self.executor, options);
        self.dispatcher().run_all(&plan, &ctx, observer)
    }

    /// Runs `operation` on every repository of the manifest.
    pub fn run(
        &self,
        operation: Operation,
        options: OperationOptions,
        observer: Option<Observer<'_>>,
    ) -> Result<BatchOutcome> {
        self.run_on(operation, self.repositories().to_vec(), options, observer)
    }

    /// Runs `operation` on the repositories whose kind supports it and logs
    /// the others.
    pub fn run_supported(
        &self,
        operation: Operation,
        options: OperationOptions,
        observer: Option<Observer<'_>>,
    ) -> Result<BatchOutcome> {
        let (supported, skipped): (Vec<_>, Vec<_>) = self
            .repositories()
            .iter()
            .cloned()
            .partition(|repo| registry::supports(repo.kind, operation));
        for repo in &skipped {
            info!(
                "skipping {}: {} repositories do not support {}",
                repo.name, repo.kind, operation
            );
        }
        self.run_on(operation, supported, options, observer)
    }

    /// Clones every repository that has no working copy yet.
    pub fn clone_missing(
        &self,
        options: OperationOptions,
        observer: Option<Observer<'_>>,
    ) -> Result<BatchOutcome> {
        let missing: Vec<RepositoryDescriptor> = self
            .repositories()
            .iter()
            .filter(|repo| !repo.is_present())
            .cloned()
            .collect();
        info!("{} repositories to clone", missing.len());
        self.run_on(Operation::Clone, missing, options, observer)
    }

    /// Pulls and updates the existing working copies, then clones the
    /// missing ones.
    pub fn fetch(
        &self,
        options: OperationOptions,
        observer: Option<Observer<'_>>,
    ) -> Result<BatchOutcome> {
        let pull_options = OperationOptions {
            update: true,
            ignore_missing: true,
            ..options.clone()
        };
        let mut outcome = self.run(Operation::Pull, pull_options, observer)?;
        outcome.extend(self.clone_missing(options, observer)?);
        Ok(outcome)
    }

    pub fn patch_engine(&self) -> QuiltEngine<'a> {
        QuiltEngine::new(&self.settings.root, self.executor)
    }

    /// Runs `action` with the workspace patches unapplied. The gate is
    /// skipped when quilt is disabled or the workspace has no series.
    pub fn gated<T, F>(&self, force: bool, action: F) -> Result<GateOutcome<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let engine = self.patch_engine();
        let gate = if self.settings.use_quilt && engine.has_series() {
            PatchGate::new(&engine)
        } else {
            PatchGate::disabled()
        };
        gate.with_force(force).with_patches_unapplied(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::patches::{APPLIED_FILE, PATCHES_DIR, PC_DIR, SERIES_FILE};
    use crate::retry::RetryPolicy;
    use crate::test_support::ScriptedExecutor;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    const MANIFEST: &str = "\
[trytond]
repo = hg
url = https://hg.tryton.org/trytond
path = ./tryton

[sao]
repo = git
url = https://github.com/tryton/sao
path = ./tryton
";

    fn workspace_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::write(dir.path().join("config/base.cfg"), MANIFEST).unwrap();
        dir
    }

    fn settings(root: &Path) -> Settings {
        let mut settings = Settings::new(root);
        settings.jobs = 2;
        settings
    }

    fn options() -> OperationOptions {
        OperationOptions {
            retry: RetryPolicy::none(),
            ..OperationOptions::default()
        }
    }

    #[test]
    fn test_clone_missing_only_clones_absent_working_copies() {
        let dir = workspace_dir();
        fs::create_dir_all(dir.path().join("tryton/trytond")).unwrap();
        let settings = settings(dir.path());
        let executor = ScriptedExecutor::new();
        let workspace = Workspace::open(&settings, &executor).unwrap();

        let outcome = workspace.clone_missing(options(), None).unwrap();

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].repository, "sao");
        assert_eq!(executor.count("git clone"), 1);
        assert_eq!(executor.count("hg clone"), 0);
    }

    #[test]
    fn test_clone_with_everything_present_is_a_no_op() {
        let dir = workspace_dir();
        fs::create_dir_all(dir.path().join("tryton/trytond")).unwrap();
        fs::create_dir_all(dir.path().join("tryton/sao")).unwrap();
        let settings = settings(dir.path());
        let executor = ScriptedExecutor::new();
        let workspace = Workspace::open(&settings, &executor).unwrap();

        let outcome = workspace.clone_missing(options(), None).unwrap();

        assert_eq!(outcome.aggregate_exit_code(), 0);
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn test_unsupported_operation_fails_before_dispatch() {
        let dir = workspace_dir();
        let settings = settings(dir.path());
        let executor = ScriptedExecutor::new();
        let workspace = Workspace::open(&settings, &executor).unwrap();

        let error = workspace.run(Operation::Push, options(), None).unwrap_err();

        assert!(matches!(error, Error::UnsupportedOperation { .. }));
        assert!(executor.calls().is_empty());
    }

    #[test]
    fn test_run_supported_skips_other_kinds() {
        let dir = workspace_dir();
        fs::create_dir_all(dir.path().join("tryton/trytond")).unwrap();
        let settings = settings(dir.path());
        let executor = ScriptedExecutor::new();
        let workspace = Workspace::open(&settings, &executor).unwrap();

        let outcome = workspace.run_supported(Operation::Update, options(), None).unwrap();

        assert_eq!(outcome.results.len(), 1);
        assert_eq!(outcome.results[0].repository, "trytond");
        assert_eq!(executor.calls(), vec!["hg update -y"]);
    }

    #[test]
    fn test_fetch_pulls_present_and_clones_missing() {
        let dir = workspace_dir();
        fs::create_dir_all(dir.path().join("tryton/trytond")).unwrap();
        let settings = settings(dir.path());
        let executor = ScriptedExecutor::new();
        let workspace = Workspace::open(&settings, &executor).unwrap();

        let outcome = workspace.fetch(options(), None).unwrap();

        assert_eq!(outcome.aggregate_exit_code(), 0);
        assert_eq!(executor.count("hg pull"), 1);
        assert_eq!(executor.count("hg update -y -r default"), 1);
        assert_eq!(executor.count("git pull"), 0);
        assert_eq!(executor.count("git clone"), 1);
        assert_eq!(outcome.results.len(), 3);
    }

    #[test]
    fn test_gate_brackets_the_batch() {
        let dir = workspace_dir();
        fs::create_dir_all(dir.path().join("tryton/trytond")).unwrap();
        fs::create_dir_all(dir.path().join(PATCHES_DIR)).unwrap();
        fs::create_dir_all(dir.path().join(PC_DIR)).unwrap();
        fs::write(dir.path().join(PATCHES_DIR).join(SERIES_FILE), "a.diff\nb.diff\n").unwrap();
        fs::write(dir.path().join(PC_DIR).join(APPLIED_FILE), "a.diff\n").unwrap();
        let settings = settings(dir.path());
        let executor = ScriptedExecutor::new();
        let workspace = Workspace::open(&settings, &executor).unwrap();

        let outcome = workspace
            .gated(false, || workspace.run_supported(Operation::Update, options(), None))
            .unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert_eq!(
            executor.calls(),
            vec!["quilt pop -a", "hg update -y", "quilt push -q a.diff"]
        );
    }

    #[test]
    fn test_gate_is_skipped_without_quilt() {
        let dir = workspace_dir();
        fs::create_dir_all(dir.path().join(PATCHES_DIR)).unwrap();
        fs::create_dir_all(dir.path().join(PC_DIR)).unwrap();
        fs::write(dir.path().join(PATCHES_DIR).join(SERIES_FILE), "a.diff\n").unwrap();
        fs::write(dir.path().join(PC_DIR).join(APPLIED_FILE), "a.diff\n").unwrap();
        let mut settings = settings(dir.path());
        settings.use_quilt = false;
        let executor = ScriptedExecutor::new();
        let workspace = Workspace::open(&settings, &executor).unwrap();

        let outcome = workspace.gated(false, || Ok(())).unwrap();

        assert_eq!(outcome.exit_code, 0);
        assert!(executor.calls().is_empty());
    }
}
