//! # Shell Command Runner
//!
//! Every interaction with `hg`, `git` and `quilt` goes through this module.
//! A command runs in its own process; its stdout and stderr are read
//! incrementally, each line is stamped with the time elapsed since the start,
//! and an optional callback receives the new lines at a bounded rate.
//!
//! ## Behavior
//!
//! - Output is collected with a short readiness poll (100 ms by default).
//! - The callback fires when at least `callback_interval` (2 s by default)
//!   has passed since the previous call *and* new lines exist.
//! - On timeout the process is killed and [`Error::TimedOut`] is returned with
//!   everything captured so far.
//! - After the process exits, a final forced callback delivers the remaining
//!   lines, so the callback sees every line exactly once.
//!
//! The [`CommandExecutor`] trait is the process boundary the rest of the crate
//! depends on. [`SystemExecutor`] is the real implementation; tests substitute
//! scripted executors.

use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use log::debug;

use crate::defaults;
use crate::error::{Error, Result};

/// A command line to execute, independent of how it is executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn path_arg(self, path: &Path) -> Self {
        self.arg(path.to_string_lossy().into_owned())
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn arguments(&self) -> &[String] {
        &self.args
    }

    pub fn working_dir(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    pub fn environment(&self) -> &[(String, String)] {
        &self.env
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(dir) = &self.cwd {
            command.current_dir(dir);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

/// One line of subprocess output with the time it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub elapsed: Duration,
    pub text: String,
}

impl OutputLine {
    pub fn new(elapsed: Duration, text: impl Into<String>) -> Self {
        Self {
            elapsed,
            text: text.into(),
        }
    }
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8.3}s {}", self.elapsed.as_secs_f64(), self.text)
    }
}

/// Everything a finished command produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOutput {
    pub exit_code: i32,
    pub stdout: Vec<OutputLine>,
    pub stderr: Vec<OutputLine>,
}

impl RunOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Raw stdout lines, without timestamps.
    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.iter().map(|line| line.text.as_str())
    }

    /// Raw stderr lines, without timestamps.
    pub fn stderr_lines(&self) -> impl Iterator<Item = &str> {
        self.stderr.iter().map(|line| line.text.as_str())
    }

    pub fn stdout_text(&self) -> String {
        self.stdout_lines().collect::<Vec<_>>().join("\n")
    }

    pub fn stderr_text(&self) -> String {
        self.stderr_lines().collect::<Vec<_>>().join("\n")
    }
}

/// Callback receiving the stdout and stderr lines produced since its last call.
pub type OutputCallback<'a> = &'a mut dyn FnMut(&[OutputLine], &[OutputLine]);

struct Buffers {
    stdout: Vec<OutputLine>,
    stderr: Vec<OutputLine>,
    stdout_seen: usize,
    stderr_seen: usize,
    last_call: Instant,
}

impl Buffers {
    fn new(start: Instant) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: Vec::new(),
            stdout_seen: 0,
            stderr_seen: 0,
            last_call: start,
        }
    }

    fn push(&mut self, stream: Stream, line: OutputLine) {
        match stream {
            Stream::Stdout => self.stdout.push(line),
            Stream::Stderr => self.stderr.push(line),
        }
    }

    fn notify(&mut self, callback: &mut Option<OutputCallback<'_>>, interval: Duration, force: bool) {
        let Some(callback) = callback.as_mut() else {
            return;
        };
        if !force && self.last_call.elapsed() < interval {
            return;
        }
        self.last_call = Instant::now();

        let stdout = &self.stdout[self.stdout_seen..];
        let stderr = &self.stderr[self.stderr_seen..];
        if stdout.is_empty() && stderr.is_empty() {
            return;
        }
        callback(stdout, stderr);
        self.stdout_seen = self.stdout.len();
        self.stderr_seen = self.stderr.len();
    }

    fn rendered(lines: &[OutputLine]) -> Vec<String> {
        lines.iter().map(ToString::to_string).collect()
    }
}

/// Runs one command with incremental output collection and an optional
/// timeout.
#[derive(Debug, Clone)]
pub struct Runner {
    poll_interval: Duration,
    callback_interval: Duration,
    timeout: Option<Duration>,
}

impl Default for Runner {
    fn default() -> Self {
        Self {
            poll_interval: defaults::POLL_INTERVAL,
            callback_interval: defaults::CALLBACK_INTERVAL,
            timeout: None,
        }
    }
}

impl Runner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_callback_interval(mut self, interval: Duration) -> Self {
        self.callback_interval = interval;
        self
    }

    /// Executes `invocation` and waits for it to finish.
    ///
    /// Returns the exit code and all captured output. A process killed by a
    /// signal reports exit code `-1`.
    pub fn run(
        &self,
        invocation: &Invocation,
        mut callback: Option<OutputCallback<'_>>,
    ) -> Result<RunOutput> {
        debug!("run: {}", invocation);
        let start = Instant::now();
        let mut child = invocation
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| Error::CommandSpawn {
                command: invocation.to_string(),
                message: e.to_string(),
            })?;

        let (sender, receiver) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            spawn_reader(stdout, Stream::Stdout, start, sender.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            spawn_reader(stderr, Stream::Stderr, start, sender.clone());
        }
        drop(sender);

        let mut buffers = Buffers::new(start);
        let mut exit_status = None;
        let mut streams_open = true;

        let status = loop {
            if streams_open {
                match receiver.recv_timeout(self.poll_interval) {
                    Ok((stream, line)) => {
                        buffers.push(stream, line);
                        for (stream, line) in receiver.try_iter() {
                            buffers.push(stream, line);
                        }
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => streams_open = false,
                }
            } else if exit_status.is_none() {
                thread::sleep(self.poll_interval);
            }

            if exit_status.is_none() {
                exit_status = child.try_wait()?;
            }
            if let Some(status) = exit_status {
                if !streams_open {
                    break status;
                }
            }

            buffers.notify(&mut callback, self.callback_interval, false);

            if let Some(timeout) = self.timeout {
                if start.elapsed() > timeout {
                    debug!("killing '{}' after {:?}", invocation, timeout);
                    let _ = child.kill();
                    let _ = child.wait();
                    for (stream, line) in receiver.try_iter() {
                        buffers.push(stream, line);
                    }
                    return Err(Error::TimedOut {
                        command: invocation.to_string(),
                        timeout,
                        stdout: Buffers::rendered(&buffers.stdout),
                        stderr: Buffers::rendered(&buffers.stderr),
                    });
                }
            }
        };

        buffers.notify(&mut callback, self.callback_interval, true);

        Ok(RunOutput {
            exit_code: status.code().unwrap_or(-1),
            stdout: buffers.stdout,
            stderr: buffers.stderr,
        })
    }
}

fn spawn_reader<R>(pipe: R, stream: Stream, start: Instant, sender: Sender<(Stream, OutputLine)>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut reader = BufReader::new(pipe);
        let mut buffer = Vec::new();
        loop {
            buffer.clear();
            match reader.read_until(b'\n', &mut buffer) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let text = String::from_utf8_lossy(&buffer)
                        .trim_end_matches(['\n', '\r'])
                        .to_string();
                    let line = OutputLine::new(start.elapsed(), text);
                    if sender.send((stream, line)).is_err() {
                        break;
                    }
                }
            }
        }
    });
}

/// Per-call execution options.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Kill the command after this long.
    pub timeout: Option<Duration>,
    /// When set, output is forwarded to the debug log under this label while
    /// the command runs.
    pub label: Option<String>,
}

impl RunOptions {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            label: None,
        }
    }

    pub fn labelled(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// The process boundary: runs external commands on behalf of the executors.
pub trait CommandExecutor: Send + Sync {
    fn run(&self, invocation: &Invocation, options: &RunOptions) -> Result<RunOutput>;
}

/// Runs commands on the host with [`Runner`].
#[derive(Debug, Clone)]
pub struct SystemExecutor {
    callback_interval: Duration,
}

impl SystemExecutor {
    pub fn new(callback_interval: Duration) -> Self {
        Self { callback_interval }
    }
}

impl Default for SystemExecutor {
    fn default() -> Self {
        Self::new(defaults::CALLBACK_INTERVAL)
    }
}

impl CommandExecutor for SystemExecutor {
    fn run(&self, invocation: &Invocation, options: &RunOptions) -> Result<RunOutput> {
        let runner = Runner::new()
            .with_timeout(options.timeout)
            .with_callback_interval(self.callback_interval);

        match &options.label {
            Some(label) => {
                let mut forward = |stdout: &[OutputLine], stderr: &[OutputLine]| {
                    for line in stdout.iter().chain(stderr) {
                        debug!("[{}] {}", label, line);
                    }
                };
                runner.run(invocation, Some(&mut forward))
            }
            None => runner.run(invocation, None),
        }
    }
}
