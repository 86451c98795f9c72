//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `tryton-tasks` command-line tool. Each subcommand is defined in its own
//! file to keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` together with the
//!   global options and performs the command's logic.
//!
//! The helpers below are shared by the batch commands: [`Session`] builds the
//! runtime settings from the global flags, the environment and the user
//! settings file, and [`run_batch`] runs one batch, optionally inside the
//! patch gate, printing results as repositories complete.

pub mod branch;
pub mod branches;
pub mod clean;
pub mod clone;
pub mod completions;
pub mod config;
pub mod diff;
pub mod fetch;
pub mod module_diff;
pub mod module_version;
pub mod pull;
pub mod push;
pub mod quilt;
pub mod revision;
pub mod status;
pub mod update;

use anyhow::{Context, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use log::debug;

use tryton_tasks::config::{Settings, UserSettings};
use tryton_tasks::dispatch::{BatchOutcome, Observer, OperationResult};
use tryton_tasks::manifest::ManifestOptions;
use tryton_tasks::runner::{CommandExecutor, SystemExecutor};
use tryton_tasks::scm::OperationOptions;
use tryton_tasks::suggestions;
use tryton_tasks::sync::Workspace;

use crate::cli::{GlobalArgs, OutputFormat};

/// Settings and executor for one invocation.
pub struct Session {
    pub settings: Settings,
    pub format: OutputFormat,
    executor: SystemExecutor,
}

impl Session {
    /// Layers the global flags (and their environment variables) over the
    /// user settings file and the built-in defaults.
    pub fn new(global: &GlobalArgs) -> Result<Self> {
        let user = UserSettings::load_default().map_err(suggestions::explain)?;
        let mut settings = Settings::new(&global.root).with_user_settings(&user);
        settings.manifests = global.manifests.clone();
        settings.manifest_options = ManifestOptions {
            unstable: global.unstable,
            development: global.development,
        };
        settings.use_quilt = !global.no_quilt;
        settings.ignore_missing = global.ignore_missing;
        if let Some(jobs) = global.jobs {
            settings.jobs = usize::from(jobs);
        }
        debug!("settings: {:?}", settings);

        let executor = SystemExecutor::new(settings.callback_interval);
        Ok(Self {
            settings,
            format: global.format,
            executor,
        })
    }

    pub fn executor(&self) -> &dyn CommandExecutor {
        &self.executor
    }

    pub fn workspace(&self) -> Result<Workspace<'_>> {
        Workspace::open(&self.settings, &self.executor).map_err(suggestions::explain)
    }

    pub fn operation_options(&self) -> OperationOptions {
        self.settings.operation_options()
    }
}

/// Whether a batch runs inside the patch gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    Bypass,
    Patches { force: bool },
}

/// Prints results while the batch runs.
struct Reporter {
    format: OutputFormat,
    bar: ProgressBar,
}

impl Reporter {
    fn new(format: OutputFormat) -> Result<Self> {
        let attended = console::Term::stderr().is_term();
        let bar = if format == OutputFormat::Text && attended {
            let bar = ProgressBar::new_spinner();
            bar.set_style(ProgressStyle::with_template(
                "{elapsed_precise:.green} {spinner} {pos} done  {wide_msg}",
            )?);
            bar.enable_steady_tick(std::time::Duration::from_millis(100));
            bar
        } else {
            ProgressBar::hidden()
        };
        Ok(Self { format, bar })
    }

    fn observe(&self, result: &OperationResult) {
        self.bar.inc(1);
        self.bar.set_message(result.repository.clone());
        if self.format == OutputFormat::Json {
            return;
        }
        self.bar.suspend(|| {
            for line in result.stdout.iter().filter(|line| !line.is_empty()) {
                println!("{}", line);
            }
            for line in result.stderr.iter().filter(|line| !line.is_empty()) {
                eprintln!("{}", line);
            }
        });
    }

    fn messages(&self, messages: &[String]) {
        self.bar.suspend(|| {
            for message in messages {
                eprintln!("{}", message);
            }
        });
    }

    fn finish(&self, outcome: &BatchOutcome) -> Result<()> {
        self.bar.finish_and_clear();
        if self.format == OutputFormat::Json {
            println!("{}", outcome.to_json().map_err(suggestions::explain)?);
        }
        Ok(())
    }
}

/// Fails when some repository of the batch failed.
pub fn check(outcome: &BatchOutcome) -> Result<()> {
    let aggregate = outcome.aggregate_exit_code();
    if aggregate < 0 {
        let failed: Vec<&str> = outcome.failures().map(|r| r.repository.as_str()).collect();
        return Err(suggestions::batch_failed(outcome.operation.name(), aggregate, &failed));
    }
    Ok(())
}

/// Runs `batch`, printing every result as soon as its repository is done,
/// and fails when a repository failed.
///
/// With [`Gate::Patches`] the batch runs with the patch series unapplied.
/// A stack that could not be removed or restored makes the command fail
/// after the results are printed.
pub fn run_batch<F>(workspace: &Workspace<'_>, format: OutputFormat, gate: Gate, batch: F) -> Result<()>
where
    F: FnOnce(Observer<'_>) -> tryton_tasks::error::Result<BatchOutcome>,
{
    let outcome = collect_batch(workspace, format, gate, batch)?;
    check(&outcome)
}

/// Like [`run_batch`], but hands the outcome back whatever the repositories
/// reported.
pub fn collect_batch<F>(
    workspace: &Workspace<'_>,
    format: OutputFormat,
    gate: Gate,
    batch: F,
) -> Result<BatchOutcome>
where
    F: FnOnce(Observer<'_>) -> tryton_tasks::error::Result<BatchOutcome>,
{
    let reporter = Reporter::new(format)?;
    let observer: Observer<'_> = &|result: &OperationResult| reporter.observe(result);

    let force = match gate {
        Gate::Bypass => {
            let outcome = batch(observer).map_err(suggestions::explain)?;
            reporter.finish(&outcome)?;
            return Ok(outcome);
        }
        Gate::Patches { force } => force,
    };

    let gated = workspace
        .gated(force, || batch(observer))
        .map_err(suggestions::explain)?;
    reporter.messages(&gated.messages);
    let Some(outcome) = gated.value else {
        reporter.bar.finish_and_clear();
        anyhow::bail!("Could not remove the applied patches, nothing was run");
    };
    reporter.finish(&outcome)?;
    if gated.exit_code != 0 {
        return Err(suggestions::patches_not_restored());
    }
    Ok(outcome)
}

/// Asks before a destructive step. `yes` skips the question.
pub fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    if !console::user_attended() {
        anyhow::bail!(
            "{prompt}\n\n\
             hint: No terminal to ask for confirmation\n\
             hint: Use --force to proceed without asking"
        );
    }
    let theme = ColorfulTheme::default();
    Confirm::with_theme(&theme)
        .with_prompt(prompt)
        .default(false)
        .interact()
        .context("Failed to read confirmation")
}
