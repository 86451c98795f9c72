//! # Parallel Dispatcher
//!
//! Fans a [`Plan`] out over a bounded worker pool and collects one
//! [`OperationResult`] per repository.
//!
//! ## Failure isolation
//!
//! A repository failing never stops its siblings. Executor errors and
//! panics are both turned into a result with exit code `-1` and a red
//! banner, and the batch carries on.
//!
//! ## Ordering
//!
//! Results come back in plan order regardless of completion order. An
//! optional observer sees each result as soon as it is ready, which is how
//! the CLI prints progress while the batch runs.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use log::{debug, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::defaults;
use crate::error::{Error, Result};
use crate::manifest::RepoKind;
use crate::output;
use crate::registry::{Operation, Plan, PlannedRepository};
use crate::scm::{ChangeSet, ExecOutput, OperationContext};

/// Outcome of one operation on one repository.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationResult {
    pub repository: String,
    pub kind: RepoKind,
    pub operation: Operation,
    pub exit_code: i32,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub duration_seconds: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changes: Option<ChangeSet>,
}

impl OperationResult {
    pub fn failed(&self) -> bool {
        self.exit_code < 0
    }
}

/// Every result of a batch, in plan order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchOutcome {
    pub operation: Operation,
    pub results: Vec<OperationResult>,
}

impl BatchOutcome {
    pub fn empty(operation: Operation) -> Self {
        Self {
            operation,
            results: Vec::new(),
        }
    }

    /// Sum of the negative exit codes: `0` when everything succeeded,
    /// `-N` when N repositories failed with `-1`.
    pub fn aggregate_exit_code(&self) -> i32 {
        self.results
            .iter()
            .map(|result| result.exit_code)
            .filter(|code| *code < 0)
            .sum()
    }

    pub fn is_success(&self) -> bool {
        self.aggregate_exit_code() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = &OperationResult> {
        self.results.iter().filter(|result| result.failed())
    }

    pub fn get(&self, repository: &str) -> Option<&OperationResult> {
        self.results.iter().find(|result| result.repository == repository)
    }

    /// Appends the results of a follow-up batch.
    pub fn extend(&mut self, other: BatchOutcome) {
        self.results.extend(other.results);
    }

    /// Machine-readable report of the batch.
    pub fn to_json(&self) -> Result<String> {
        #[derive(Serialize)]
        struct Report<'a> {
            operation: Operation,
            aggregate_exit_code: i32,
            failed: Vec<&'a str>,
            results: &'a [OperationResult],
        }

        let report = Report {
            operation: self.operation,
            aggregate_exit_code: self.aggregate_exit_code(),
            failed: self.failures().map(|r| r.repository.as_str()).collect(),
            results: &self.results,
        };
        Ok(serde_json::to_string_pretty(&report)?)
    }
}

/// Observer called from worker threads as each repository completes.
pub type Observer<'a> = &'a (dyn Fn(&OperationResult) + Sync);

/// Runs plans on at most `max_concurrency` repositories at a time.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    max_concurrency: usize,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new(defaults::MAX_CONCURRENCY)
    }
}

impl Dispatcher {
    /// A concurrency of zero is treated as one.
    pub fn new(max_concurrency: usize) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Executes every entry of `plan` and waits for all of them.
    ///
    /// Only a failure to build the worker pool is returned as an error;
    /// per-repository failures end up in the outcome.
    pub fn run_all(
        &self,
        plan: &Plan,
        ctx: &OperationContext<'_>,
        observer: Option<Observer<'_>>,
    ) -> Result<BatchOutcome> {
        let operation = plan.operation();
        if plan.is_empty() {
            return Ok(BatchOutcome::empty(operation));
        }

        let workers = self.max_concurrency.min(plan.len());
        debug!("running {} on {} repositories with {} workers", operation, plan.len(), workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|index| format!("tryton-tasks-worker-{}", index))
            .build()
            .map_err(|e| Error::WorkerPool {
                message: e.to_string(),
            })?;

        let results = pool.install(|| {
            plan.entries()
                .par_iter()
                .map(|entry| {
                    let result = execute(operation, entry, ctx);
                    if let Some(observe) = observer {
                        observe(&result);
                    }
                    result
                })
                .collect::<Vec<_>>()
        });

        Ok(BatchOutcome { operation, results })
    }
}

fn execute(operation: Operation, entry: &PlannedRepository, ctx: &OperationContext<'_>) -> OperationResult {
    let repository = &entry.repository;
    let started = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(repository, ctx)));

    let output = match outcome {
        Ok(Ok(output)) => output,
        Ok(Err(error)) => {
            warn!("{} failed on {}: {}", operation, repository.name, error);
            let mut output = ExecOutput::default();
            if let Error::TimedOut { stdout, stderr, .. } = &error {
                output.stdout.extend(stdout.iter().cloned());
                output.stderr.extend(stderr.iter().cloned());
            }
            output.err(output::failure_banner(&repository.name));
            output.fail(error.to_string());
            output
        }
        Err(_) => {
            warn!("{} panicked on {}", operation, repository.name);
            let mut output = ExecOutput::default();
            output.err(output::failure_banner(&repository.name));
            output.fail(format!("{} aborted unexpectedly", operation));
            output
        }
    };

    OperationResult {
        repository: repository.name.clone(),
        kind: repository.kind,
        operation,
        exit_code: output.exit_code,
        stdout: output.stdout,
        stderr: output.stderr,
        duration_seconds: started.elapsed().as_secs_f64(),
        value: output.value,
        changes: output.changes,
    }
}
