//! # Handler Registry
//!
//! Maps a (repository kind, operation) pair to the executor that performs
//! it. The table is a single exhaustive `match`, so adding an operation or a
//! repository kind does not compile until every pair has been decided.
//!
//! Unsupported pairs are reported before anything runs: [`plan`] resolves a
//! handler for every repository up front and fails on the first gap, while
//! [`supports`] lets callers filter a batch down to the kinds that can take
//! part.

use std::fmt;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::manifest::{RepoKind, RepositoryDescriptor};
use crate::scm::{self, git, hg, ExecOutput, OperationContext};

/// Everything a batch can do to a repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operation {
    Clone,
    Pull,
    Update,
    Status,
    Diff,
    ModuleDiff,
    BranchSwitch,
    Branches,
    Clean,
    Revision,
    Push,
    ModuleVersion,
}

impl Operation {
    pub const ALL: [Operation; 12] = [
        Operation::Clone,
        Operation::Pull,
        Operation::Update,
        Operation::Status,
        Operation::Diff,
        Operation::ModuleDiff,
        Operation::BranchSwitch,
        Operation::Branches,
        Operation::Clean,
        Operation::Revision,
        Operation::Push,
        Operation::ModuleVersion,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::Clone => "clone",
            Operation::Pull => "pull",
            Operation::Update => "update",
            Operation::Status => "status",
            Operation::Diff => "diff",
            Operation::ModuleDiff => "module-diff",
            Operation::BranchSwitch => "branch",
            Operation::Branches => "branches",
            Operation::Clean => "clean",
            Operation::Revision => "revision",
            Operation::Push => "push",
            Operation::ModuleVersion => "module-version",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An operation executor.
pub type Handler = for<'a> fn(&RepositoryDescriptor, &OperationContext<'a>) -> Result<ExecOutput>;

fn unsupported(kind: RepoKind, operation: Operation) -> Error {
    Error::UnsupportedOperation {
        kind: kind.to_string(),
        operation: operation.to_string(),
    }
}

/// Looks up the executor for `operation` on repositories of `kind`.
///
/// Git `clean` and `revision` resolve to executors that fail with
/// [`Error::NotImplemented`]; Git `update`, `branch`, and `push` are not
/// supported at all.
pub fn resolve(kind: RepoKind, operation: Operation) -> Result<Handler> {
    use Operation::*;
    let handler: Handler = match (kind, operation) {
        (RepoKind::Mercurial, Clone) => hg::clone,
        (RepoKind::Mercurial, Pull) => hg::pull,
        (RepoKind::Mercurial, Update) => hg::update,
        (RepoKind::Mercurial, Status) => hg::status,
        (RepoKind::Mercurial, Diff) => hg::diff,
        (RepoKind::Mercurial, ModuleDiff) => hg::module_diff,
        (RepoKind::Mercurial, BranchSwitch) => hg::branch_switch,
        (RepoKind::Mercurial, Branches) => hg::branches,
        (RepoKind::Mercurial, Clean) => hg::clean,
        (RepoKind::Mercurial, Revision) => hg::revision,
        (RepoKind::Mercurial, Push) => hg::push,
        (RepoKind::Mercurial, ModuleVersion) => scm::module_version,

        (RepoKind::Git, Clone) => git::clone,
        (RepoKind::Git, Pull) => git::pull,
        (RepoKind::Git, Status) => git::status,
        (RepoKind::Git, Diff) => git::diff,
        (RepoKind::Git, ModuleDiff) => git::module_diff,
        (RepoKind::Git, Branches) => git::branches,
        (RepoKind::Git, Clean) => git::clean,
        (RepoKind::Git, Revision) => git::revision,
        (RepoKind::Git, ModuleVersion) => scm::module_version,
        (RepoKind::Git, Update | BranchSwitch | Push) => return Err(unsupported(kind, operation)),
    };
    Ok(handler)
}

/// Whether `operation` can be dispatched to repositories of `kind`.
pub fn supports(kind: RepoKind, operation: Operation) -> bool {
    resolve(kind, operation).is_ok()
}

/// A repository paired with the executor that will handle it.
#[derive(Clone)]
pub struct PlannedRepository {
    pub repository: RepositoryDescriptor,
    pub handler: Handler,
}

impl PlannedRepository {
    pub fn new(repository: RepositoryDescriptor, handler: Handler) -> Self {
        Self {
            repository,
            handler,
        }
    }
}

impl fmt::Debug for PlannedRepository {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannedRepository")
            .field("repository", &self.repository.name)
            .finish_non_exhaustive()
    }
}

/// A fully resolved batch: every repository has a handler.
#[derive(Debug, Clone)]
pub struct Plan {
    operation: Operation,
    entries: Vec<PlannedRepository>,
}

impl Plan {
    pub fn new(operation: Operation, entries: Vec<PlannedRepository>) -> Self {
        Self { operation, entries }
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn entries(&self) -> &[PlannedRepository] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolves a handler for every repository, failing on the first
/// unsupported pair before any work starts.
pub fn plan<I>(operation: Operation, repositories: I) -> Result<Plan>
where
    I: IntoIterator<Item = RepositoryDescriptor>,
{
    let entries = repositories
        .into_iter()
        .map(|repository| {
            let handler = resolve(repository.kind, operation)?;
            Ok(PlannedRepository::new(repository, handler))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Plan::new(operation, entries))
}
