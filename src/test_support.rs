//! Test doubles for the command boundary.

use std::collections::VecDeque;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::runner::{CommandExecutor, Invocation, OutputLine, RunOptions, RunOutput};

#[derive(Debug, Clone)]
enum Scripted {
    Exit {
        code: i32,
        stdout: String,
        stderr: String,
    },
    TimedOut {
        stdout: String,
    },
}

#[derive(Debug)]
struct Rule {
    pattern: String,
    queue: VecDeque<Scripted>,
}

/// A [`CommandExecutor`] answering from a script instead of spawning
/// processes.
///
/// Responses are keyed by a substring of the rendered command line; the
/// longest matching pattern wins. Registering the same pattern several times
/// queues responses, the last one repeating forever. Commands nothing
/// matches succeed with no output. Every call is recorded.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    rules: Mutex<Vec<Rule>>,
    calls: Mutex<Vec<(Invocation, RunOptions)>>,
    creates: Vec<(String, PathBuf)>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(self, pattern: &str, scripted: Scripted) -> Self {
        {
            let mut rules = self.rules.lock().unwrap();
            match rules.iter_mut().find(|rule| rule.pattern == pattern) {
                Some(rule) => rule.queue.push_back(scripted),
                None => rules.push(Rule {
                    pattern: pattern.to_string(),
                    queue: VecDeque::from([scripted]),
                }),
            }
        }
        self
    }

    pub fn exit(self, pattern: &str, code: i32, stdout: &str, stderr: &str) -> Self {
        self.script(
            pattern,
            Scripted::Exit {
                code,
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
            },
        )
    }

    pub fn ok(self, pattern: &str, stdout: &str) -> Self {
        self.exit(pattern, 0, stdout, "")
    }

    pub fn fail(self, pattern: &str, code: i32, stderr: &str) -> Self {
        self.exit(pattern, code, "", stderr)
    }

    pub fn time_out(self, pattern: &str) -> Self {
        self.time_out_with(pattern, "")
    }

    /// Times out after printing `stdout`.
    pub fn time_out_with(self, pattern: &str, stdout: &str) -> Self {
        self.script(
            pattern,
            Scripted::TimedOut {
                stdout: stdout.to_string(),
            },
        )
    }

    /// Every command matching `pattern` creates `dir` before answering, the
    /// way a clone creates its destination. Like a clone, it refuses to run
    /// when `dir` already has content.
    pub fn creates_dir(mut self, pattern: &str, dir: impl Into<PathBuf>) -> Self {
        self.creates.push((pattern.to_string(), dir.into()));
        self
    }

    /// Rendered command lines, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(invocation, _)| invocation.to_string())
            .collect()
    }

    pub fn invocations(&self) -> Vec<(Invocation, RunOptions)> {
        self.calls.lock().unwrap().clone()
    }

    /// How many calls contained `pattern`.
    pub fn count(&self, pattern: &str) -> usize {
        self.calls().iter().filter(|call| call.contains(pattern)).count()
    }
}

fn lines(text: &str) -> Vec<OutputLine> {
    text.lines()
        .map(|line| OutputLine::new(Duration::ZERO, line))
        .collect()
}

impl CommandExecutor for ScriptedExecutor {
    fn run(&self, invocation: &Invocation, options: &RunOptions) -> Result<RunOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((invocation.clone(), options.clone()));

        let command = invocation.to_string();
        for (pattern, dir) in &self.creates {
            if !command.contains(pattern.as_str()) {
                continue;
            }
            let occupied = fs::read_dir(dir).map(|mut entries| entries.next().is_some()).unwrap_or(false);
            if occupied {
                return Ok(RunOutput {
                    exit_code: 255,
                    stdout: vec![],
                    stderr: lines(&format!("abort: destination '{}' is not empty", dir.display())),
                });
            }
            fs::create_dir_all(dir).unwrap();
            fs::write(dir.join("partial"), "").unwrap();
        }
        let scripted = {
            let mut rules = self.rules.lock().unwrap();
            rules
                .iter_mut()
                .filter(|rule| command.contains(&rule.pattern))
                .max_by_key(|rule| rule.pattern.len())
                .and_then(|rule| {
                    if rule.queue.len() > 1 {
                        rule.queue.pop_front()
                    } else {
                        rule.queue.front().cloned()
                    }
                })
        };

        match scripted {
            None => Ok(RunOutput::default()),
            Some(Scripted::Exit {
                code,
                stdout,
                stderr,
            }) => Ok(RunOutput {
                exit_code: code,
                stdout: lines(&stdout),
                stderr: lines(&stderr),
            }),
            Some(Scripted::TimedOut { stdout }) => Err(Error::TimedOut {
                command,
                timeout: options.timeout.unwrap_or_default(),
                stdout: stdout.lines().map(String::from).collect(),
                stderr: vec![],
            }),
        }
    }
}
