//! Git executors.
//!
//! Git repositories get a reduced set of operations: they track a branch and
//! ignore pinned revisions. `clean` and `revision` are known gaps and fail
//! with [`Error::NotImplemented`].

use log::{debug, info, warn};

use super::{missing, relative_prefix, same_url, status, url_drift_message, ExecOutput, OperationContext};
use crate::error::{Error, Result};
use crate::manifest::RepositoryDescriptor;
use crate::output;
use crate::retry::run_with_retry;
use crate::runner::{Invocation, RunOptions};

fn git(repo: &RepositoryDescriptor) -> Invocation {
    Invocation::new("git").current_dir(&repo.local_path)
}

fn check_url(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>, output: &mut ExecOutput) -> Result<()> {
    let result = ctx.run(
        &git(repo).args(["config", "--get", "remote.origin.url"]),
        &RunOptions::default(),
    )?;
    let actual = result.stdout_text();
    if !same_url(&actual, repo, ctx) {
        warn!("{}: origin {} differs from {}", repo.name, actual.trim(), repo.url);
        output.err(url_drift_message(repo, &actual));
    }
    Ok(())
}

/// Clones the manifest branch. Only timeouts are retried.
pub fn clone(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    let mut output = ExecOutput::default();
    let path = repo.local_path.display().to_string();
    let invocation = Invocation::new("git")
        .args(["clone", "-v", "-b", repo.branch.as_str()])
        .arg(ctx.url_for(repo))
        .path_arg(&repo.local_path);
    let options = RunOptions::with_timeout(ctx.options.clone_timeout).labelled(repo.name.as_str());

    if let Some(revision) = &repo.revision {
        debug!("{}: git clones ignore pinned revision {}", repo.name, revision);
    }
    info!("cloning {} into {}", repo.name, path);
    output.out(format!("Cloning {}...", path));
    let result = run_with_retry(
        &ctx.options.retry,
        &|delay| ctx.sleep(delay),
        |_| ctx.run_clone(repo, &invocation, &options),
        Error::is_transient,
        |retries_left, error| {
            warn!("{} failed, {} retries left: {}", invocation, retries_left, error);
            output.err(output::retry_banner(&path, retries_left));
            output.err(format!("Error running {}", error));
        },
    )?;

    if !result.success() {
        output.err(output::failure_banner(&path));
        output.fail(result.stderr_text());
        return Ok(output);
    }
    output.out(format!("{} {}", output::success_banner(&path), output::green("Cloned")));
    Ok(output)
}

pub fn pull(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let mut output = ExecOutput::default();
    let result = ctx.run(&git(repo).arg("pull"), &RunOptions::default().labelled(repo.name.as_str()))?;
    if !result.success() {
        output.err(output::red(format!("= {} = KO!", repo.name)));
        output.fail(result.stderr_text());
        return Ok(output);
    }
    let stdout = result.stdout_text();
    if stdout.contains("Already up to date") || stdout.contains("Already up-to-date") {
        return Ok(output);
    }
    output.out(output::section_header(&repo.name));
    output.out(stdout);
    Ok(output)
}

pub fn status(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let mut output = ExecOutput::default();
    check_url(repo, ctx, &mut output)?;
    let result = ctx.run_checked(&git(repo).args(["status", "--porcelain"]), &RunOptions::default())?;
    let changes = status::parse_git_status(result.stdout_lines());
    output.stdout.extend(changes.render(&repo.name));
    output.changes = Some(changes);
    Ok(output)
}

pub fn diff(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let mut output = ExecOutput::default();
    let result = ctx.run_checked(&git(repo).arg("diff"), &RunOptions::default())?;
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
    let result = ctx.run_checked(&git(repo).args(["status", "--porcelain"]), &RunOptions::default())?;
    let changes = status::parse_git_status(result.stdout_lines());
    let files = changes.tracked_paths();
    output.changes = Some(changes);
    if files.is_empty() {
        return Ok(output);
    }

    let path = repo.local_path.display();
    let diff = ctx.run_checked(
        &git(repo).args(["diff", "--"]).args(files.iter().map(String::as_str)),
        &RunOptions::default(),
    )?;
    let empty_tree = ctx.run_checked(
        &git(repo).args(["hash-object", "-t", "tree", "/dev/null"]),
        &RunOptions::default(),
    )?;
    let base = ctx.run(
        &git(repo)
            .args(["diff-tree", "-p"])
            .arg(empty_tree.stdout_text().trim())
            .args(["HEAD", "--"])
            .args(files.iter().map(String::as_str)),
        &RunOptions::default(),
    )?;

    output.out(output::bold(format!("{} module diff:", path)));
    output.stdout.extend(diff.stdout_lines().map(String::from));
    output.out(output::bold(format!("{} module base diff:", path)));
    output.stdout.extend(base.stdout_lines().map(String::from));
    Ok(output)
}

/// Parses `git branch -a` into branch names and the active branch.
fn parse_branch_listing<'a>(lines: impl IntoIterator<Item = &'a str>) -> (Vec<String>, String) {
    let mut names = Vec::new();
    let mut active = String::new();
    for line in lines {
        if line.contains("HEAD") {
            continue;
        }
        let is_active = line.starts_with('*');
        let name = line
            .trim_start_matches('*')
            .trim()
            .trim_start_matches("remotes/origin/")
            .to_string();
        if name.is_empty() {
            continue;
        }
        if is_active {
            active = name.clone();
        }
        names.push(name);
    }
    (names, active)
}

pub fn branches(repo: &RepositoryDescriptor, ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    if let Some(output) = missing(repo, ctx) {
        return Ok(output);
    }
    let mut output = ExecOutput::default();
    let result = ctx.run_checked(&git(repo).args(["branch", "-a"]), &RunOptions::default())?;
    let (names, active) = parse_branch_listing(result.stdout_lines());
    output.out(super::format_branches(&repo.name, &names, &active, &repo.branch));
    Ok(output)
}

pub fn clean(repo: &RepositoryDescriptor, _ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    Err(Error::NotImplemented {
        feature: format!("clean for git repository {}", repo.name),
    })
}

pub fn revision(repo: &RepositoryDescriptor, _ctx: &OperationContext<'_>) -> Result<ExecOutput> {
    Err(Error::NotImplemented {
        feature: format!("revision query for git repository {}", repo.name),
    })
}
