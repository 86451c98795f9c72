//! # Operation Executors
//!
//! One function per (repository kind, operation) pair lives in [`hg`] and
//! [`git`]. Every executor has the same shape: it takes a
//! [`RepositoryDescriptor`] and an [`OperationContext`] and returns an
//! [`ExecOutput`] holding the lines to print and an exit code.
//!
//! Exit code conventions:
//! - `0`: success, or nothing to do
//! - `-1`: failure (missing working copy, command failure, invalid revision)
//!
//! Executors never print. They talk to the outside world only through the
//! context's [`CommandExecutor`], so tests can script the version control
//! tools' responses.

pub mod git;
pub mod hg;
pub mod status;

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use console::style;
use ini::{Ini, ParseOption};
use log::warn;

use crate::defaults;
use crate::error::{Error, Result};
use crate::manifest::{effective_url, RepositoryDescriptor};
use crate::output;
use crate::retry::RetryPolicy;
use crate::runner::{CommandExecutor, Invocation, RunOptions, RunOutput};

pub use status::{ChangeKind, ChangeSet};

/// What an executor produced for one repository.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// Scalar answer of query operations such as `revision`.
    pub value: Option<String>,
    /// Structured change list of `status`, `diff`, and `module-diff`.
    pub changes: Option<ChangeSet>,
}

impl ExecOutput {
    pub fn out(&mut self, line: impl Into<String>) {
        self.stdout.push(line.into());
    }

    pub fn err(&mut self, line: impl Into<String>) {
        self.stderr.push(line.into());
    }

    /// Record a failure message and mark the output failed.
    pub fn fail(&mut self, line: impl Into<String>) {
        self.err(line);
        self.exit_code = -1;
    }

    pub fn failed(&self) -> bool {
        self.exit_code < 0
    }
}

/// Switches shared by every executor of a batch.
#[derive(Debug, Clone)]
pub struct OperationOptions {
    /// Update the working copy after pulling (Mercurial only).
    pub update: bool,
    /// Discard local modifications when updating.
    pub clean: bool,
    /// Skip interactive confirmations of the underlying tools.
    pub force: bool,
    /// Treat a missing working copy as a no-op instead of a failure.
    pub ignore_missing: bool,
    /// Destination of a branch switch.
    pub target_branch: Option<String>,
    /// Allow pushing branches the remote does not have yet.
    pub new_branches: bool,
    /// Whether an SSH agent is available. Without one `ssh` URLs are
    /// contacted over `https`.
    pub ssh_agent: bool,
    /// Workspace root; diff headers show working copy paths relative to it.
    pub root: PathBuf,
    pub clone_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for OperationOptions {
    fn default() -> Self {
        Self {
            update: true,
            clean: false,
            force: false,
            ignore_missing: false,
            target_branch: None,
            new_branches: false,
            ssh_agent: true,
            root: PathBuf::from("."),
            clone_timeout: defaults::CLONE_TIMEOUT,
            retry: RetryPolicy::default(),
        }
    }
}

type Sleeper = Box<dyn Fn(Duration) + Send + Sync>;

/// Everything an executor needs besides the repository itself.
pub struct OperationContext<'a> {
    pub executor: &'a dyn CommandExecutor,
    pub options: OperationOptions,
    sleep: Sleeper,
}

impl<'a> OperationContext<'a> {
    pub fn new(executor: &'a dyn CommandExecutor, options: OperationOptions) -> Self {
        Self {
            executor,
            options,
            sleep: Box::new(std::thread::sleep),
        }
    }

    /// Replace how retry backoff delays are waited out.
    pub fn with_sleeper(mut self, sleep: impl Fn(Duration) + Send + Sync + 'static) -> Self {
        self.sleep = Box::new(sleep);
        self
    }

    pub fn sleep(&self, delay: Duration) {
        (self.sleep)(delay)
    }

    /// The URL to contact for `repo`.
    pub fn url_for(&self, repo: &RepositoryDescriptor) -> String {
        effective_url(&repo.url, self.options.ssh_agent)
    }

    pub fn run(&self, invocation: &Invocation, options: &RunOptions) -> Result<RunOutput> {
        self.executor.run(invocation, options)
    }

    /// Like [`run`](Self::run) but a nonzero exit becomes
    /// [`Error::CommandFailed`].
    pub fn run_checked(&self, invocation: &Invocation, options: &RunOptions) -> Result<RunOutput> {
        let result = self.run(invocation, options)?;
        require_success(invocation, result)
    }

    /// Runs one clone attempt into `repo`'s working copy path. When the
    /// attempt fails and the destination did not exist before, whatever it
    /// created there is removed so the next attempt starts from scratch.
    pub fn run_clone(
        &self,
        repo: &RepositoryDescriptor,
        invocation: &Invocation,
        options: &RunOptions,
    ) -> Result<RunOutput> {
        let existed = repo.local_path.exists();
        let result = self.run(invocation, options);
        let failed = !matches!(&result, Ok(output) if output.success());
        if failed && !existed {
            discard_partial_clone(&repo.local_path);
        }
        result
    }
}

pub(crate) fn require_success(invocation: &Invocation, result: RunOutput) -> Result<RunOutput> {
    if result.success() {
        Ok(result)
    } else {
        Err(Error::CommandFailed {
            command: invocation.to_string(),
            code: result.exit_code,
            stderr: result.stderr_text(),
        })
    }
}

fn discard_partial_clone(path: &Path) {
    if !path.exists() {
        return;
    }
    warn!("removing incomplete clone at {}", path.display());
    if let Err(error) = fs::remove_dir_all(path) {
        warn!("could not remove {}: {}", path.display(), error);
    }
}

impl std::fmt::Debug for OperationContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationContext")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// The output to return when `repo` has no working copy, or `None` when it
/// has one.
pub(crate) fn missing(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Option<ExecOutput> {
    if repo.is_present() {
        return None;
    }
    let mut output = ExecOutput::default();
    if !ctx.options.ignore_missing {
        output.fail(output::missing_repository(&repo.local_path));
    }
    Some(output)
}

/// The working copy path relative to the workspace root, as used in diff
/// headers.
pub(crate) fn relative_prefix(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> String {
    let path = repo
        .local_path
        .strip_prefix(&ctx.options.root)
        .unwrap_or(&repo.local_path);
    path.components()
        .filter(|component| matches!(component, Component::Normal(_) | Component::ParentDir))
        .collect::<PathBuf>()
        .to_string_lossy()
        .into_owned()
}

/// Version declared in the `[tryton]` section of the working copy's
/// `tryton.cfg`. Repositories without that file are reported but do not
/// fail.
pub fn module_version(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let mut output = ExecOutput::default();
    let path = repo.local_path.join(defaults::MODULE_CONFIG_FILE);
    if !path.is_file() {
        output.err(output::missing_module_config(&path));
        return Ok(output);
    }
    let options = ParseOption {
        enabled_indented_mutiline_value: true,
        ..ParseOption::default()
    };
    let config = Ini::load_from_file_opt(&path, options)?;
    match config.get_from(Some("tryton"), "version") {
        Some(version) => {
            output.out(format!("{:<40}{}", repo.name, version));
            output.value = Some(version.to_string());
        }
        None => output.fail(format!("{}: no version in the [tryton] section", path.display())),
    }
    Ok(output)
}

/// Whether `actual` (read from the working copy) matches the manifest URL,
/// ignoring trailing slashes and the ssh/https fallback.
pub(crate) fn same_url(actual: &str, repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> bool {
    let actual = actual.trim().trim_end_matches('/');
    actual == repo.url.trim_end_matches('/') || actual == ctx.url_for(repo).trim_end_matches('/')
}

pub(crate) fn url_drift_message(repo: &RepositoryDescriptor, actual: &str) -> String {
    format!(
        "{}{}(Disk!=Cfg) {}",
        output::repo_banner(&repo.name),
        output::red(" URL differs "),
        output::bold(format!("{} != {}", actual.trim(), repo.url))
    )
}

/// One line listing a repository's branches.
///
/// The active branch is prefixed with `*` and the manifest's branch is
/// wrapped in brackets. The line is green when the manifest's branch is
/// checked out, red when it exists but another one is active, and yellow
/// when the working copy does not have it at all.
pub fn format_branches(name: &str, branches: &[String], active: &str, configured: &str) -> String {
    let mut branches: Vec<&str> = branches.iter().map(String::as_str).collect();
    branches.sort_unstable();
    branches.dedup();
    branches.reverse();

    let marked: Vec<String> = branches
        .iter()
        .map(|branch| {
            let mut label = branch.to_string();
            if *branch == active {
                label = format!("*{}", label);
            }
            if *branch == configured {
                label = format!("[{}]", label);
            }
            label
        })
        .collect();
    let line = format!("{:<40}{}", name, marked.join("\t"));

    let styled = style(line);
    let painted = if active == configured {
        styled.green()
    } else if branches.contains(&configured) {
        styled.red()
    } else {
        styled.yellow()
    };
    painted.to_string()
}
