//! # Patch Stack Gate
//!
//! A workspace may carry a quilt patch series (`patches/series`) applied on
//! top of the checked-out repositories. Pulling or updating with patches
//! applied would mix local edits into the sync, so batch operations run
//! inside [`PatchGate::with_patches_unapplied`]:
//!
//! 1. every applied patch is popped,
//! 2. the action runs,
//! 3. the stack is pushed back to the patch that was on top before.
//!
//! Reapplication happens on success, on `Err`, and while unwinding from a
//! panic. A conflict while pushing back is reported with the offending patch
//! and a `-1` status; it is not raised, the caller decides what to do.
//!
//! The patch tool itself sits behind the [`PatchEngine`] trait.
//! [`QuiltEngine`] drives the `quilt` binary through a
//! [`CommandExecutor`].

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use regex::Regex;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::output;
use crate::runner::{CommandExecutor, Invocation, RunOptions};

pub const PATCHES_DIR: &str = "patches";
pub const SERIES_FILE: &str = "series";
pub const PC_DIR: &str = ".pc";
pub const APPLIED_FILE: &str = "applied-patches";

/// quilt's exit status when there is nothing to do.
const QUILT_NOTHING_TO_DO: i32 = 2;

/// The patch quilt names in its "does not apply" message.
fn conflicting_patch(message: &str) -> Option<String> {
    let pattern = Regex::new(r"Patch (\S+) does not apply").ok()?;
    Some(pattern.captures(message)?[1].to_string())
}

/// The patch series and how much of it is applied.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PatchStackState {
    pub series: Vec<String>,
    /// Number of patches applied, counted from the start of the series.
    pub applied: usize,
}

/// Where the stack stands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum PatchStackStatus {
    AllApplied,
    PartiallyApplied,
    AllUnapplied,
    ConflictDetected { patch: String },
}

impl PatchStackState {
    pub fn new(series: Vec<String>, applied: usize) -> Self {
        Self { series, applied }
    }

    /// Reads `patches/series` and `.pc/applied-patches` under `root`.
    ///
    /// A missing series means an empty stack; a missing applied file means
    /// nothing is applied.
    pub fn load(root: &Path) -> Result<Self> {
        let series = read_names(&root.join(PATCHES_DIR).join(SERIES_FILE))?;
        let applied = read_names(&root.join(PC_DIR).join(APPLIED_FILE))?;

        if applied.len() > series.len() || series.iter().zip(&applied).any(|(s, a)| s != a) {
            return Err(Error::Patch {
                message: format!(
                    "{}/{} does not match {}/{}",
                    PC_DIR, APPLIED_FILE, PATCHES_DIR, SERIES_FILE
                ),
            });
        }
        Ok(Self::new(series, applied.len()))
    }

    pub fn status(&self) -> PatchStackStatus {
        if self.applied == 0 {
            PatchStackStatus::AllUnapplied
        } else if self.applied >= self.series.len() {
            PatchStackStatus::AllApplied
        } else {
            PatchStackStatus::PartiallyApplied
        }
    }

    /// The last applied patch.
    pub fn top(&self) -> Option<&str> {
        self.applied
            .checked_sub(1)
            .and_then(|index| self.series.get(index))
            .map(String::as_str)
    }

    pub fn applied_patches(&self) -> &[String] {
        &self.series[..self.applied.min(self.series.len())]
    }

    pub fn unapplied_patches(&self) -> &[String] {
        &self.series[self.applied.min(self.series.len())..]
    }
}

/// Patch names from a series-like file, skipping comments and options.
fn read_names(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let content = fs::read_to_string(path)?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_whitespace().next())
        .map(String::from)
        .collect())
}

/// How far to push the stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushTarget {
    All,
    /// Up to and including the named patch.
    UpTo(String),
}

/// Boundary to the external patch tool.
pub trait PatchEngine: Send + Sync {
    fn state(&self) -> Result<PatchStackState>;

    /// Unapplies every patch. Succeeds when nothing was applied.
    fn pop_all(&self, force: bool) -> Result<()>;

    /// Applies patches up to `target`. Succeeds when they already are;
    /// fails with [`Error::PatchConflict`] when a patch does not apply.
    fn push(&self, target: &PushTarget, force: bool) -> Result<()>;
}

/// [`PatchEngine`] running `quilt` in the workspace root.
pub struct QuiltEngine<'a> {
    root: PathBuf,
    executor: &'a dyn CommandExecutor,
}

impl<'a> QuiltEngine<'a> {
    pub fn new(root: impl Into<PathBuf>, executor: &'a dyn CommandExecutor) -> Self {
        Self {
            root: root.into(),
            executor,
        }
    }

    /// Whether the workspace has a patch series at all.
    pub fn has_series(&self) -> bool {
        self.root.join(PATCHES_DIR).join(SERIES_FILE).is_file()
    }

    fn quilt(&self) -> Invocation {
        Invocation::new("quilt")
            .current_dir(&self.root)
            .env("QUILT_PATCHES", PATCHES_DIR)
            .env("QUILT_PC", PC_DIR)
    }
}

impl PatchEngine for QuiltEngine<'_> {
    fn state(&self) -> Result<PatchStackState> {
        PatchStackState::load(&self.root)
    }

    fn pop_all(&self, force: bool) -> Result<()> {
        let mut invocation = self.quilt().args(["pop", "-a"]);
        if force {
            invocation = invocation.arg("-f");
        }
        let result = self.executor.run(&invocation, &RunOptions::default())?;
        match result.exit_code {
            0 | QUILT_NOTHING_TO_DO => Ok(()),
            _ => Err(Error::Patch {
                message: format!("{}{}", result.stdout_text(), result.stderr_text()),
            }),
        }
    }

    fn push(&self, target: &PushTarget, force: bool) -> Result<()> {
        let mut invocation = self.quilt().arg("push").arg("-q");
        invocation = match target {
            PushTarget::All => invocation.arg("-a"),
            PushTarget::UpTo(patch) => invocation.arg(patch.as_str()),
        };
        if force {
            invocation = invocation.arg("-f");
        }
        let result = self.executor.run(&invocation, &RunOptions::default())?;
        if matches!(result.exit_code, 0 | QUILT_NOTHING_TO_DO) {
            return Ok(());
        }

        let message = [result.stdout_text(), result.stderr_text()]
            .into_iter()
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if message.contains("is not in series") {
            return Err(Error::Patch { message });
        }
        let patch = match conflicting_patch(&message) {
            Some(patch) => patch,
            None => {
                let state = self.state()?;
                state
                    .series
                    .get(state.applied)
                    .cloned()
                    .unwrap_or_else(|| "unknown".to_string())
            }
        };
        Err(Error::PatchConflict { patch, message })
    }
}

/// Result of moving the stack, ready to print.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackChange {
    pub exit_code: i32,
    pub message: String,
    /// The patch that did not apply.
    pub conflict: Option<String>,
}

impl StackChange {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: output::green(message.into()),
            conflict: None,
        }
    }

    fn ko(message: impl Into<String>, conflict: Option<String>) -> Self {
        Self {
            exit_code: -1,
            message: output::red(message.into()),
            conflict,
        }
    }
}

pub fn pop_all(engine: &dyn PatchEngine, force: bool) -> StackChange {
    match engine.pop_all(force) {
        Ok(()) => StackChange::ok("OK: All Patches removed"),
        Err(error) => {
            warn!("could not remove patches: {}", error);
            StackChange::ko(format!("KO: Error removing patches: {}", error), None)
        }
    }
}

pub fn push_to(engine: &dyn PatchEngine, target: &PushTarget, force: bool) -> StackChange {
    if *target == PushTarget::All {
        if let Ok(PatchStackStatus::AllApplied) = engine.state().map(|state| state.status()) {
            return StackChange::ok("OK: Patches already Applied");
        }
    }
    match engine.push(target, force) {
        Ok(()) => StackChange::ok("OK: All Patches Applied"),
        Err(Error::PatchConflict { patch, message }) => {
            warn!("patch {} does not apply: {}", patch, message);
            StackChange::ko(format!("KO: Error applying patch: {}", patch), Some(patch))
        }
        Err(error) => {
            warn!("could not apply patches: {}", error);
            StackChange::ko(format!("KO: Error applying patch: {}", error), None)
        }
    }
}

pub fn push_all(engine: &dyn PatchEngine, force: bool) -> StackChange {
    push_to(engine, &PushTarget::All, force)
}

/// What happened inside [`PatchGate::with_patches_unapplied`].
#[derive(Debug)]
pub struct GateOutcome<T> {
    /// The action's value; `None` when it did not run.
    pub value: Option<T>,
    /// `0`, or `-1` when removing or reapplying patches failed.
    pub exit_code: i32,
    /// Stack status once the gate is done.
    pub status: PatchStackStatus,
    /// Lines reporting each stack change.
    pub messages: Vec<String>,
}

/// Pushes the stack back if the action panics.
struct ReapplyOnUnwind<'e> {
    engine: &'e dyn PatchEngine,
    boundary: Option<String>,
    force: bool,
}

impl Drop for ReapplyOnUnwind<'_> {
    fn drop(&mut self) {
        if !std::thread::panicking() {
            return;
        }
        if let Some(top) = self.boundary.take() {
            if let Err(error) = self.engine.push(&PushTarget::UpTo(top), self.force) {
                warn!("could not reapply patches after a panic: {}", error);
            }
        }
    }
}

/// Brackets batch operations with a pop/push of the patch stack.
pub struct PatchGate<'a> {
    engine: Option<&'a dyn PatchEngine>,
    force: bool,
}

impl<'a> PatchGate<'a> {
    pub fn new(engine: &'a dyn PatchEngine) -> Self {
        Self {
            engine: Some(engine),
            force: false,
        }
    }

    /// A gate that runs actions directly.
    pub fn disabled() -> Self {
        Self {
            engine: None,
            force: false,
        }
    }

    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Runs `action` with every patch unapplied, restoring the previous
    /// boundary afterwards.
    ///
    /// If removing the patches fails, `action` is not run and the outcome
    /// carries `-1`. If `action` fails, patches are reapplied before the
    /// error is returned.
    pub fn with_patches_unapplied<T, F>(&self, action: F) -> Result<GateOutcome<T>>
    where
        F: FnOnce() -> Result<T>,
    {
        let Some(engine) = self.engine else {
            return Ok(GateOutcome {
                value: Some(action()?),
                exit_code: 0,
                status: PatchStackStatus::AllUnapplied,
                messages: Vec::new(),
            });
        };

        let before = engine.state()?;
        let status = before.status();
        let boundary = before.top().map(str::to_string);
        let mut messages = Vec::new();

        if boundary.is_some() {
            info!("removing {} applied patches", before.applied);
            let popped = pop_all(engine, self.force);
            messages.push(popped.message);
            if popped.exit_code != 0 {
                return Ok(GateOutcome {
                    value: None,
                    exit_code: -1,
                    status,
                    messages,
                });
            }
        } else {
            debug!("no patch applied, nothing to remove");
        }

        let guard = ReapplyOnUnwind {
            engine,
            boundary: boundary.clone(),
            force: self.force,
        };
        let result = action();
        drop(guard);

        let Some(top) = boundary else {
            return result.map(|value| GateOutcome {
                value: Some(value),
                exit_code: 0,
                status,
                messages,
            });
        };

        info!("reapplying patches up to {}", top);
        let pushed = push_to(engine, &PushTarget::UpTo(top), self.force);
        messages.push(pushed.message);
        let value = result?;
        let (exit_code, status) = match pushed.conflict {
            Some(patch) => (-1, PatchStackStatus::ConflictDetected { patch }),
            None if pushed.exit_code != 0 => (
                -1,
                engine.state().map(|state| state.status()).unwrap_or(status),
            ),
            None => (0, status),
        };
        Ok(GateOutcome {
            value: Some(value),
            exit_code,
            status,
            messages,
        })
    }
}
