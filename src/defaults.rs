//! Default values for tryton-tasks configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on repositories processed at the same time.
pub const MAX_CONCURRENCY: usize = 25;

/// Ceiling for a single clone before it is killed and retried.
pub const CLONE_TIMEOUT: Duration = Duration::from_secs(600);

/// Additional clone attempts after the first one times out.
pub const CLONE_RETRIES: u32 = 2;

/// Delay before the first retry; doubled for every following one.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(10);

/// Minimum time between two incremental output callbacks.
pub const CALLBACK_INTERVAL: Duration = Duration::from_secs(2);

/// Readiness poll used while waiting for subprocess output.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Directory (relative to the workspace root) holding the manifests.
pub const MANIFEST_DIR: &str = "config";

/// Glob used inside [`MANIFEST_DIR`].
pub const MANIFEST_PATTERN: &str = "*.cfg";

/// Optional workspace-local manifest, read after the shared ones.
pub const LOCAL_MANIFEST: &str = "local.cfg";

/// Module descriptor read by `module-version`, inside each working copy.
pub const MODULE_CONFIG_FILE: &str = "tryton.cfg";

/// Git working copy of the manifests, pulled before cloning.
pub const CONFIG_REPOSITORY: &str = "config";

/// Where module working copies are cloned.
pub const MODULES_DIR: &str = "tryton/modules";

/// The server's module directory, which links back into [`MODULES_DIR`].
pub const SERVER_MODULES_DIR: &str = "tryton/trytond/trytond/modules";

/// Shortcuts created at the workspace root, as (link, target) pairs.
pub const ROOT_LINKS: [(&str, &str); 4] = [
    ("sao", "tryton/sao"),
    ("trytond", "tryton/trytond"),
    ("proteus", "tryton/proteus"),
    ("modules", SERVER_MODULES_DIR),
];

/// Name of the per-user settings file in the home directory.
pub const USER_SETTINGS_FILE: &str = ".tryton-tasks.cfg";

/// Returns the per-user settings file location.
///
/// This is `~/.tryton-tasks.cfg`; `None` when the home directory cannot be
/// determined.
pub fn default_user_settings_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(USER_SETTINGS_FILE))
}
