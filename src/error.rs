//! # Error Handling
//!
//! This module defines the centralized error type for the `tryton-tasks`
//! library. It uses `thiserror` to build a single `Error` enum covering every
//! failure mode of the synchronization engine, each variant carrying enough
//! context to print a useful message.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. Variants fall into the same families the
//!   command layer reacts to:
//!   - configuration errors (missing or malformed manifest, unsupported
//!     repository kind/operation pairs), which abort before any dispatch;
//!   - transient SCM errors (`TimedOut`), which the executors retry;
//!   - consistency errors (`InvalidRevisionForBranch`), reported per
//!     repository;
//!   - patch stack errors (`Patch`, `PatchConflict`).
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.

use std::time::Duration;

use thiserror::Error;

/// Main error type for tryton-tasks operations
#[derive(Error, Debug)]
pub enum Error {
    /// No manifest file could be found.
    ///
    /// `searched` lists the locations that were tried.
    #[error("Repository manifest not found (searched: {searched}){}", hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ManifestNotFound {
        searched: String,
        /// Optional hint for how to fix the lookup
        hint: Option<String>,
    },

    /// A manifest file is malformed.
    #[error("Manifest parsing error in {path}: {message}")]
    ManifestParse { path: String, message: String },

    /// A user settings value could not be understood.
    #[error("Invalid setting '{key}' in {path}: {message}")]
    InvalidSetting {
        path: String,
        key: String,
        message: String,
    },

    /// A repository kind does not support the requested operation.
    #[error("Operation '{operation}' is not supported for {kind} repositories")]
    UnsupportedOperation { kind: String, operation: String },

    /// A documented gap: the operation exists but has no implementation for
    /// this repository kind.
    #[error("Feature not implemented: {feature}")]
    NotImplemented { feature: String },

    /// An external command exceeded its time limit and was killed.
    ///
    /// Carries the output captured before the process was terminated.
    #[error("Command timed out after {timeout:?}: {command}")]
    TimedOut {
        command: String,
        timeout: Duration,
        stdout: Vec<String>,
        stderr: Vec<String>,
    },

    /// An external command could not be started.
    #[error("Failed to run '{command}': {message}")]
    CommandSpawn { command: String, message: String },

    /// An external command ran but exited unsuccessfully.
    #[error("Command '{command}' failed with exit code {code}: {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    /// A pinned revision is not on the branch the manifest asks for.
    #[error("Invalid revision '{revision}': it isn't in branch '{branch}'")]
    InvalidRevisionForBranch { revision: String, branch: String },

    /// The patch engine refused an operation (unknown patch, corrupt state).
    #[error("Patch stack error: {message}")]
    Patch { message: String },

    /// A patch did not apply cleanly while pushing the stack.
    #[error("Patch '{patch}' does not apply: {message}")]
    PatchConflict { patch: String, message: String },

    /// A workspace layout change (links, directories) failed on disk.
    #[error("Filesystem error: {message}")]
    Filesystem { message: String },

    /// The worker pool could not be built.
    #[error("Worker pool error: {message}")]
    WorkerPool { message: String },

    /// An error indicating that a mutex or other lock has been poisoned.
    #[error("Lock poisoned: {context}")]
    LockPoisoned { context: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An INI loading error, wrapped from `ini::Error`.
    #[error("INI error: {0}")]
    Ini(#[from] ini::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// A JSON serialization error, wrapped from `serde_json::Error`.
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying the same command may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TimedOut { .. })
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
