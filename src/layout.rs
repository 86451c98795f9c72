//! Workspace layout on disk.
//!
//! Besides the working copies listed in the manifest, a workspace has:
//!
//! 1.  **The config repository**: `config/` is itself a Git working copy
//!     holding the manifests. It is pulled before cloning so newly listed
//!     repositories are picked up.
//!
//! 2.  **Module links**: every module cloned under `tryton/modules` is
//!     linked into the server's `tryton/trytond/trytond/modules` directory
//!     as `../../../modules/<name>`.
//!
//! 3.  **Root shortcuts**: `sao`, `trytond`, `proteus`, and `modules` at the
//!     workspace root point into `tryton/`.
//!
//! Module links are removed before a clone and recreated afterwards, so
//! links to modules dropped from the manifest disappear.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::defaults;
use crate::error::{Error, Result};
use crate::manifest::{RepoKind, RepositoryDescriptor};
use crate::scm::{git, ExecOutput, OperationContext};

/// Pulls the config repository when `config/` is a Git working copy.
///
/// Returns `None` when there is nothing to pull.
pub fn update_config_repository(root: &Path, ctx: &OperationContext<'_>) -> Result<Option<ExecOutput>> {
    let path = root.join(defaults::CONFIG_REPOSITORY);
    if !path.join(".git").exists() {
        debug!("{} is not a git working copy, not pulling it", path.display());
        return Ok(None);
    }
    info!("pulling {}", path.display());
    let repository = RepositoryDescriptor::new(defaults::CONFIG_REPOSITORY, RepoKind::Git, "", path);
    git::pull(&repository, ctx).map(Some)
}

fn filesystem_error(action: &str, path: &Path, error: io::Error) -> Error {
    Error::Filesystem {
        message: format!("Failed to {} '{}': {}", action, path.display(), error),
    }
}

/// Whether anything, including a dangling link, exists at `path`.
fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn symlink(target: &Path, link: &Path) -> io::Result<()> {
    std::os::windows::fs::symlink_dir(target, link)
}

fn create_link(target: &Path, link: &Path) -> Result<()> {
    symlink(target, link).map_err(|e| filesystem_error("create link", link, e))?;
    debug!("linked {} -> {}", link.display(), target.display());
    Ok(())
}

/// Removes every symbolic link from the server's module directory and
/// returns how many were removed. Real directories are left alone.
pub fn remove_module_links(root: &Path) -> Result<usize> {
    let modules = root.join(defaults::SERVER_MODULES_DIR);
    if !modules.is_dir() {
        return Ok(0);
    }
    let mut removed = 0;
    for entry in fs::read_dir(&modules).map_err(|e| filesystem_error("read", &modules, e))? {
        let path = entry.map_err(|e| filesystem_error("read", &modules, e))?.path();
        if !fs::symlink_metadata(&path).is_ok_and(|meta| meta.file_type().is_symlink()) {
            continue;
        }
        fs::remove_file(&path).map_err(|e| filesystem_error("remove link", &path, e))?;
        removed += 1;
    }
    debug!("removed {} module links from {}", removed, modules.display());
    Ok(removed)
}

/// Links every cloned module into the server and creates the root
/// shortcuts. Existing entries are kept, and shortcuts whose target has not
/// been cloned are skipped. Returns the links created.
pub fn create_links(root: &Path) -> Result<Vec<PathBuf>> {
    let mut created = Vec::new();

    let sources = root.join(defaults::MODULES_DIR);
    let server_modules = root.join(defaults::SERVER_MODULES_DIR);
    if sources.is_dir() && server_modules.is_dir() {
        let mut names: Vec<_> = fs::read_dir(&sources)
            .map_err(|e| filesystem_error("read", &sources, e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name())
            .collect();
        names.sort();
        for name in names {
            let link = server_modules.join(&name);
            if occupied(&link) {
                continue;
            }
            create_link(&Path::new("../../../modules").join(&name), &link)?;
            created.push(link);
        }
    } else {
        debug!("no {} or {}, no module links", sources.display(), server_modules.display());
    }

    for (name, target) in defaults::ROOT_LINKS {
        let link = root.join(name);
        if occupied(&link) || !root.join(target).exists() {
            continue;
        }
        create_link(Path::new(target), &link)?;
        created.push(link);
    }

    info!("created {} links", created.len());
    Ok(created)
}
