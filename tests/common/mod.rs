//! Shared test utilities for E2E tests.
//!
//! ## Usage
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_manifest(manifests::MIXED);
//!     fixture.command().arg("status").assert().code(1);
//! }
//! ```

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::manifests;
    pub use super::TestFixture;
}

/// Manifest snippets.
#[allow(dead_code)]
pub mod manifests {
    /// One Mercurial and one Git repository under `tryton/`.
    pub const MIXED: &str = "\
[trytond]
repo = hg
url = https://hg.tryton.org/trytond
path = ./tryton
branch = 7.0

[sao]
repo = git
url = https://github.com/tryton/sao
path = ./tryton

[account_invoice_fix]
patch = True
";

    /// A stable repository and one only read with `--unstable`.
    pub const WITH_UNSTABLE: &str = "\
[trytond]
repo = hg
url = https://hg.tryton.org/trytond
path = ./tryton

[experimental]
repo = hg
url = https://hg.example.com/experimental
path = ./modules
unstable = true
";

    /// A section without `url`.
    pub const MISSING_URL: &str = "\
[trytond]
repo = hg
path = ./tryton
";
}

/// A workspace in a temporary directory, with a private home directory so
/// the developer's `~/.tryton-tasks.cfg` never leaks into tests.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
    home: assert_fs::TempDir,
}

impl TestFixture {
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
            home: assert_fs::TempDir::new().expect("Failed to create home directory"),
        }
    }

    /// Add `config/base.cfg` with the given content.
    pub fn with_manifest(self, content: &str) -> Self {
        self.with_file("config/base.cfg", content)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Create an (empty) working copy directory.
    #[allow(dead_code)]
    pub fn with_working_copy(self, path: &str) -> Self {
        self.temp_dir
            .child(path)
            .create_dir_all()
            .expect("Failed to create working copy");
        self
    }

    /// Write the user settings file in the private home directory.
    #[allow(dead_code)]
    pub fn with_user_settings(self, content: &str) -> Self {
        self.home
            .child(".tryton-tasks.cfg")
            .write_str(content)
            .expect("Failed to write user settings");
        self
    }

    /// Add a patch series with the first `applied` patches applied.
    #[allow(dead_code)]
    pub fn with_patches(self, series: &[&str], applied: usize) -> Self {
        let mut listing = series.join("\n");
        listing.push('\n');
        let mut applied_listing = series[..applied].join("\n");
        applied_listing.push('\n');
        self.with_file("patches/series", &listing)
            .with_file(".pc/applied-patches", &applied_listing)
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    #[allow(dead_code)]
    pub fn manifest_path(&self) -> PathBuf {
        self.temp_dir.path().join("config/base.cfg")
    }

    #[allow(dead_code)]
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command configured to run in this fixture's directory.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tryton-tasks");
        cmd.current_dir(self.path())
            .env("HOME", self.home.path())
            .env_remove("TRYTON_TASKS_ROOT")
            .env_remove("TRYTON_TASKS_JOBS")
            .env_remove("RUST_LOG");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
