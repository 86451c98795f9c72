//! Mercurial executors.
//!
//! Mercurial repositories are the primary citizens of a workspace: every
//! operation is supported. Clones and pulls are retried, and pinned
//! revisions are checked against the manifest branch before the working copy
//! is moved to them.

use std::fs;

use log::{debug, info, warn};

use super::{
    missing, relative_prefix, require_success, same_url, status, url_drift_message, ExecOutput,
    OperationContext,
};
use crate::error::{Error, Result};
use crate::manifest::RepositoryDescriptor;
use crate::output;
use crate::retry::run_with_retry;
use crate::runner::{Invocation, RunOptions, RunOutput};

const NOTHING_UPDATED: &str = "0 files updated, 0 files merged, 0 files removed, 0 files unresolved";
const UNKNOWN_REVISION: &str = "abort: unknown revision";

fn hg(repo: &RepositoryDescriptor) -> Invocation {
    Invocation::new("hg").current_dir(&repo.local_path)
}

/// Failures of network commands worth another try.
fn retryable(error: &Error) -> bool {
    error.is_transient() || matches!(error, Error::CommandFailed { .. })
}

/// Runs a network command under the context's retry policy. A command that
/// keeps exiting nonzero is reported in `output` and yields `None`.
fn with_retries(
    repo: &RepositoryDescriptor,
    ctx: &OperationContext<'_>,
    invocation: &Invocation,
    attempt: &dyn Fn() -> Result<RunOutput>,
    output: &mut ExecOutput,
) -> Result<Option<()>> {
    let path = repo.local_path.display().to_string();
    let result = run_with_retry(
        &ctx.options.retry,
        &|delay| ctx.sleep(delay),
        |_| attempt(),
        retryable,
        |retries_left, error| {
            warn!("{} failed, {} retries left: {}", invocation, retries_left, error);
            output.err(output::retry_banner(&path, retries_left));
            output.err(format!("Error running {}", error));
        },
    );
    match result {
        Ok(_) => Ok(Some(())),
        Err(Error::CommandFailed { stderr, .. }) => {
            output.err(output::failure_banner(&path));
            output.fail(stderr);
            Ok(None)
        }
        Err(error) => Err(error),
    }
}

/// The branch a revision belongs to.
fn branch_of(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>, revision: &str) -> Result<String> {
    let result = ctx.run_checked(
        &hg(repo).args(["log", "-r", revision, "--template", "{branch}"]),
        &RunOptions::default(),
    )?;
    Ok(result.stdout_text().trim().to_string())
}

/// Checks that `revision` is on the manifest branch; reports it in `output`
/// and returns false otherwise.
fn verify_revision(
    repo: &RepositoryDescriptor,
    ctx: &OperationContext<'_>,
    revision: &str,
    output: &mut ExecOutput,
) -> Result<bool> {
    if branch_of(repo, ctx, revision)? == repo.branch {
        return Ok(true);
    }
    let error = Error::InvalidRevisionForBranch {
        revision: revision.to_string(),
        branch: repo.branch.clone(),
    };
    output.err(output::failure_banner(&repo.name));
    output.fail(error.to_string());
    Ok(false)
}

fn current_branch(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<String> {
    let result = ctx.run_checked(&hg(repo).arg("branch"), &RunOptions::default())?;
    Ok(result.stdout_text().trim().to_string())
}

/// Reports URL drift in `output`. Returns true when the working copy's
/// default path differs from the manifest.
fn check_url(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>, output: &mut ExecOutput) -> Result<bool> {
    let result = ctx.run(&hg(repo).args(["paths", "default"]), &RunOptions::default())?;
    let actual = result.stdout_text();
    if same_url(&actual, repo, ctx) {
        return Ok(false);
    }
    warn!("{}: default path {} differs from {}", repo.name, actual.trim(), repo.url);
    output.err(url_drift_message(repo, &actual));
    Ok(true)
}

/// Runs `hg update` and reports what it did. Updates that touched nothing
/// are silent.
fn run_update(
    repo: &RepositoryDescriptor,
    ctx: &OperationContext<'_>,
    revision: Option<&str>,
    tolerate_unknown: bool,
) -> Result<ExecOutput> {
    let mut output = ExecOutput::default();
    let mut invocation = hg(repo)
        .arg("update")
        .arg(if ctx.options.clean { "-C" } else { "-y" });
    if let Some(revision) = revision {
        invocation = invocation.args(["-r", revision]);
    }

    let result = ctx.run(&invocation, &RunOptions::default())?;
    if !result.success() {
        let stderr = result.stderr_text();
        if tolerate_unknown && stderr.contains(UNKNOWN_REVISION) {
            debug!("{} has no revision {:?}, left as is", repo.name, revision);
            return Ok(output);
        }
        output.err(output::red(format!("= {} = KO!", repo.name)));
        output.fail(stderr);
        return Ok(output);
    }

    let stdout = result.stdout_text();
    if !stdout.contains(NOTHING_UPDATED) {
        output.out(output::section_header(&repo.name));
        output.out(stdout);
    }
    Ok(output)
}

/// Moves the working copy to the pinned revision, or to the tip of the
/// manifest branch.
fn update_to_target(
    repo: &RepositoryDescriptor,
    ctx: &OperationContext<'_>,
    mut output: ExecOutput,
) -> Result<ExecOutput> {
    let target = match &repo.revision {
        Some(revision) => {
            if !verify_revision(repo, ctx, revision, &mut output)? {
                return Ok(output);
            }
            revision.as_str()
        }
        None => repo.branch.as_str(),
    };
    let updated = run_update(repo, ctx, Some(target), false)?;
    output.exit_code = updated.exit_code;
    output.stdout.extend(updated.stdout);
    output.stderr.extend(updated.stderr);
    Ok(output)
}

pub fn clone(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    let mut output = ExecOutput::default();
    let path = repo.local_path.display().to_string();
    let target = repo.revision.as_deref().unwrap_or(&repo.branch);
    let invocation = Invocation::new("hg")
        .args(["clone", "--pull", "-u", target])
        .arg(ctx.url_for(repo))
        .path_arg(&repo.local_path);
    let options = RunOptions::with_timeout(ctx.options.clone_timeout).labelled(repo.name.as_str());

    info!("cloning {} into {}", repo.name, path);
    let attempt = || {
        ctx.run_clone(repo, &invocation, &options)
            .and_then(|result| require_success(&invocation, result))
    };
    if with_retries(repo, ctx, &invocation, &attempt, &mut output)?.is_none() {
        return Ok(output);
    }
    if repo.revision.is_some() && !verify_revision(repo, ctx, target, &mut output)? {
        return Ok(output);
    }
    output.out(format!(
        "Repo {} {} to Revision: {}",
        output::bold(&path),
        output::green("Updated"),
        target
    ));
    Ok(output)
}

pub fn pull(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let mut output = ExecOutput::default();
    let options = RunOptions::default().labelled(repo.name.as_str());
    let invocation = hg(repo).arg("pull");
    let attempt = || ctx.run_checked(&invocation, &options);
    if with_retries(repo, ctx, &invocation, &attempt, &mut output)?.is_none() {
        return Ok(output);
    }
    if ctx.options.update {
        return update_to_target(repo, ctx, output);
    }
    Ok(output)
}

pub fn update(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let branch = ctx.options.clean.then_some(repo.branch.as_str());
    let revision = repo.revision.as_deref().or(branch);
    run_update(repo, ctx, revision, branch.is_some())
}

pub fn branch_switch(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let Some(target) = ctx.options.target_branch.as_deref() else {
        let mut output = ExecOutput::default();
        output.fail("No target branch given");
        return Ok(output);
    };
    run_update(repo, ctx, Some(target), true)
}

pub fn status(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let mut output = ExecOutput::default();
    check_url(repo, ctx, &mut output)?;
    let result = ctx.run_checked(&hg(repo).arg("status"), &RunOptions::default())?;
    let changes = status::parse_hg_status(result.stdout_lines());
    output.stdout.extend(changes.render(&repo.name));
    output.changes = Some(changes);
    Ok(output)
}

pub fn diff(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let mut output = ExecOutput::default();
    let result = ctx.run_checked(&hg(repo).args(["diff", "--git"]), &RunOptions::default())?;
    let colored = status::colorize_diff(result.stdout_lines(), &relative_prefix(repo, ctx));
    if !colored.is_empty() {
        output.out(output::repo_banner(&repo.name));
        output.stdout.extend(colored);
    }
    output.changes = Some(status::changes_from_diff(result.stdout_lines()));
    Ok(output)
}

pub fn module_diff(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let mut output = ExecOutput::default();
    let result = ctx.run_checked(&hg(repo).arg("status"), &RunOptions::default())?;
    let changes = status::parse_hg_status(result.stdout_lines());
    let files = changes.tracked_paths();
    output.changes = Some(changes);
    if files.is_empty() {
        return Ok(output);
    }

    let path = repo.local_path.display();
    let branch = current_branch(repo, ctx)?;
    let diff = ctx.run_checked(
        &hg(repo).args(["diff", "--git"]).args(files.iter().map(String::as_str)),
        &RunOptions::default(),
    )?;
    let base = ctx.run(
        &hg(repo)
            .args(["diff", "--git", "-r"])
            .arg(format!("null:{}", branch))
            .args(files.iter().map(String::as_str)),
        &RunOptions::default(),
    )?;

    output.out(output::bold(format!("{} module diff:", path)));
    output.stdout.extend(diff.stdout_lines().map(String::from));
    output.out(output::bold(format!("{} module base diff:", path)));
    output.stdout.extend(base.stdout_lines().map(String::from));
    Ok(output)
}

pub fn branches(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let mut output = ExecOutput::default();
    let result = ctx.run_checked(
        &hg(repo).args(["branches", "--template", "{branch}\n"]),
        &RunOptions::default(),
    )?;
    let names: Vec<String> = result
        .stdout_lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect();
    let active = current_branch(repo, ctx)?;
    output.out(super::format_branches(&repo.name, &names, &active, &repo.branch));
    Ok(output)
}

/// Discards local modifications and untracked files, then removes the
/// working copy entirely if it was cloned from another URL.
pub fn clean(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let mut output = ExecOutput::default();
    let mut update = hg(repo).args(["update", "-C"]);
    let mut purge = hg(repo).args(["--config", "extensions.purge=", "purge"]);
    if ctx.options.force {
        update = update.arg("-y");
        purge = purge.arg("-y");
    }

    let mut cleaned = ctx.run(&update, &RunOptions::default())?.success();
    if cleaned {
        cleaned = ctx.run(&purge, &RunOptions::default())?.success();
    }
    if !cleaned {
        warn!("{} could not be cleaned", repo.name);
        output.err(format!(
            "{} module {}",
            output::bold(&repo.name),
            output::red("has uncommitted changes")
        ));
    }

    if check_url(repo, ctx, &mut output)? {
        info!("removing {} cloned from another URL", repo.local_path.display());
        fs::remove_dir_all(&repo.local_path)?;
        output.err(format!("{}{}", output::repo_banner(&repo.name), output::red(" Removed")));
    }
    Ok(output)
}

/// Identifier of the newest changeset on the working copy's branch.
pub fn revision(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let mut output = ExecOutput::default();
    let result = ctx.run(
        &hg(repo).args(["log", "-r", "max(branch(.))", "--template", "{node|short}"]),
        &RunOptions::default(),
    )?;
    let id = result.stdout_text().trim().to_string();
    if result.success() && !id.is_empty() {
        output.out(format!("{:<40}{}", repo.name, id));
        output.value = Some(id);
    } else {
        debug!("{} has no revision: {}", repo.name, result.stderr_text());
    }
    Ok(output)
}

pub fn push(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let mut output = ExecOutput::default();
    if repo.url.starts_with("http") {
        debug!("{} is served over http, not pushing", repo.name);
        return Ok(output);
    }
    let mut invocation = hg(repo).arg("push").arg(repo.url.as_str());
    if ctx.options.new_branches {
        invocation = invocation.arg("--new-branch");
    }
    let result = ctx.run(&invocation, &RunOptions::default().labelled(repo.name.as_str()))?;
    match result.exit_code {
        0 => {
            output.out(output::section_header(&repo.name));
            output.out(result.stdout_text());
        }
        // nothing to push
        1 => {}
        _ => {
            output.err(output::red(format!("= {} = KO!", repo.name)));
            output.fail(result.stderr_text());
        }
    }
    Ok(output)
}
