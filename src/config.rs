//! # Settings
//!
//! Runtime settings are an explicit value built once per invocation and
//! passed down, never a global. They come from, in increasing precedence:
//!
//! 1. built-in defaults ([`crate::defaults`]),
//! 2. the user settings file `~/.tryton-tasks.cfg`,
//! 3. environment variables (`TRYTON_TASKS_JOBS`, `TRYTON_TASKS_ROOT`),
//! 4. command-line flags.
//!
//! The first two are handled here; the CLI layers the last two on top.
//!
//! ## User settings file
//!
//! ```ini
//! [tasks]
//! jobs = 8
//! clone_timeout = 900
//! callback_interval = 5
//! ```
//!
//! Durations are in seconds. Unknown keys are ignored.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ini::Ini;
use log::debug;

use crate::defaults;
use crate::error::{Error, Result};
use crate::manifest::{self, Manifest, ManifestOptions};
use crate::retry::RetryPolicy;
use crate::scm::OperationOptions;

const SETTINGS_SECTION: &str = "tasks";

/// Values read from the user settings file. Absent keys are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserSettings {
    pub jobs: Option<usize>,
    pub clone_timeout: Option<Duration>,
    pub callback_interval: Option<Duration>,
}

impl UserSettings {
    /// Reads `path`; a missing file yields empty settings.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            debug!("no user settings at {}", path.display());
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        let Some(section) = ini.section(Some(SETTINGS_SECTION)) else {
            return Ok(Self::default());
        };

        let number = |key: &str| -> Result<Option<u64>> {
            section
                .get(key)
                .map(|value| {
                    value.trim().parse::<u64>().map_err(|e| Error::InvalidSetting {
                        path: path.display().to_string(),
                        key: key.to_string(),
                        message: format!("'{}' is not a whole number ({})", value, e),
                    })
                })
                .transpose()
        };

        Ok(Self {
            jobs: number("jobs")?.map(|jobs| jobs as usize),
            clone_timeout: number("clone_timeout")?.map(Duration::from_secs),
            callback_interval: number("callback_interval")?.map(Duration::from_secs),
        })
    }

    /// Reads the settings file from the home directory, if there is one.
    pub fn load_default() -> Result<Self> {
        match defaults::default_user_settings_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }
}

/// Everything a command needs to know about the workspace and how to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Workspace root; manifest `path` values are relative to it.
    pub root: PathBuf,
    /// Explicit manifests. Empty means the conventional search path.
    pub manifests: Vec<PathBuf>,
    pub manifest_options: ManifestOptions,
    /// Bracket batch operations with the patch gate.
    pub use_quilt: bool,
    pub ignore_missing: bool,
    pub jobs: usize,
    pub clone_timeout: Duration,
    pub callback_interval: Duration,
    /// Whether `ssh` URLs can be used as is.
    pub ssh_agent: bool,
}

impl Settings {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            manifests: Vec::new(),
            manifest_options: ManifestOptions::default(),
            use_quilt: true,
            ignore_missing: false,
            jobs: defaults::MAX_CONCURRENCY,
            clone_timeout: defaults::CLONE_TIMEOUT,
            callback_interval: defaults::CALLBACK_INTERVAL,
            ssh_agent: manifest::ssh_agent_available(),
        }
    }

    /// Applies the values present in `user`.
    pub fn with_user_settings(mut self, user: &UserSettings) -> Self {
        if let Some(jobs) = user.jobs {
            self.jobs = jobs.max(1);
        }
        if let Some(timeout) = user.clone_timeout {
            self.clone_timeout = timeout;
        }
        if let Some(interval) = user.callback_interval {
            self.callback_interval = interval;
        }
        self
    }

    pub fn load_manifest(&self) -> Result<Manifest> {
        Manifest::load(&self.root, &self.manifests, self.manifest_options)
    }

    /// Manifest files commands that edit manifests should rewrite.
    pub fn manifest_files(&self) -> Result<Vec<PathBuf>> {
        if self.manifests.is_empty() {
            manifest::search_paths(&self.root)
        } else {
            Ok(self.manifests.clone())
        }
    }

    /// Executor options shared by every batch.
    pub fn operation_options(&self) -> OperationOptions {
        OperationOptions {
            ignore_missing: self.ignore_missing,
            ssh_agent: self.ssh_agent,
            root: self.root.clone(),
            clone_timeout: self.clone_timeout,
            retry: RetryPolicy::default(),
            ..OperationOptions::default()
        }
    }
}
