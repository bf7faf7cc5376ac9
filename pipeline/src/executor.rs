//! External command execution.
//!
//! Checkout, dependency installation, and packaging all shell out. They go
//! through the [`CommandExecutor`] trait so tests can substitute a fake, and
//! the system implementation enforces a timeout so a hung tool cannot stall
//! the whole matrix.

use camino::{Utf8Path, Utf8PathBuf};
use log::debug;
use std::fmt;
use std::process::{Command, Output, Stdio};
use std::time::Duration;
use thiserror::Error;
use wait_timeout::ChildExt;

/// Default per-command timeout, matching the hosted CI's job time limit.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(360 * 60);

/// Errors raised while running an external command.
#[derive(Debug, Error)]
pub enum ExecError {
    /// The process could not be spawned or its output collected.
    #[error("failed to run {command}: {source}")]
    Spawn {
        /// The rendered command line.
        command: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The process exceeded its time limit and was killed.
    #[error("{command} timed out after {seconds} seconds")]
    TimedOut {
        /// The rendered command line.
        command: String,
        /// The limit that was exceeded.
        seconds: u64,
    },
}

/// A command to run: program, arguments, working directory, environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program name or path.
    pub program: String,
    /// Arguments, in order.
    pub args: Vec<String>,
    /// Working directory; the current directory when `None`.
    pub cwd: Option<Utf8PathBuf>,
    /// Extra environment variables.
    pub env: Vec<(String, String)>,
}

impl CommandSpec {
    /// Create a command for `program` with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
        }
    }

    /// Append arguments.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set the working directory.
    #[must_use]
    pub fn current_dir(mut self, dir: &Utf8Path) -> Self {
        self.cwd = Some(dir.to_owned());
        self
    }

    /// Add an environment variable.
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Abstraction for running external commands.
pub trait CommandExecutor: Send + Sync {
    /// Runs a command and returns its captured output.
    ///
    /// A non-zero exit status is not an error at this level; callers inspect
    /// `output.status` and map failures to their own step.
    ///
    /// # Errors
    ///
    /// Returns [`ExecError`] if the process cannot be started or times out.
    fn run(&self, spec: &CommandSpec) -> Result<Output, ExecError>;
}

/// Executes commands on the host system with a timeout.
///
/// # Examples
///
/// ```no_run
/// use msquic_pipeline::executor::{CommandExecutor, CommandSpec, SystemCommandExecutor};
///
/// let executor = SystemCommandExecutor::default();
/// let output = executor.run(&CommandSpec::new("git").args(["--version"]))?;
/// assert!(output.status.success());
/// # Ok::<(), msquic_pipeline::executor::ExecError>(())
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SystemCommandExecutor {
    timeout: Duration,
}

impl SystemCommandExecutor {
    /// Create an executor with the given per-command timeout.
    #[must_use]
    pub const fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Return the per-command timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for SystemCommandExecutor {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TIMEOUT)
    }
}

impl CommandExecutor for SystemCommandExecutor {
    fn run(&self, spec: &CommandSpec) -> Result<Output, ExecError> {
        debug!("+ {spec}");
        let spawn_error = |source| ExecError::Spawn {
            command: spec.to_string(),
            source,
        };

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir.as_std_path());
        }
        for (key, value) in &spec.env {
            cmd.env(key, value);
        }

        let mut child = cmd.spawn().map_err(spawn_error)?;

        // Drain the pipes on helper threads so a chatty tool cannot fill a
        // pipe buffer and block before it exits.
        let stdout_reader = child.stdout.take().map(|pipe| {
            std::thread::spawn(move || std::io::read_to_string(pipe).unwrap_or_default())
        });
        let stderr_reader = child.stderr.take().map(|pipe| {
            std::thread::spawn(move || std::io::read_to_string(pipe).unwrap_or_default())
        });

        match child.wait_timeout(self.timeout).map_err(spawn_error)? {
            Some(status) => Ok(Output {
                status,
                stdout: join_reader(stdout_reader),
                stderr: join_reader(stderr_reader),
            }),
            None => {
                let _ = child.kill();
                let _ = child.wait();
                Err(ExecError::TimedOut {
                    command: spec.to_string(),
                    seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}

fn join_reader(reader: Option<std::thread::JoinHandle<String>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
        .into_bytes()
}

/// Return the trimmed stderr of a failed command, falling back to stdout.
#[must_use]
pub fn failure_message(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        let stdout = String::from_utf8_lossy(&output.stdout);
        let stdout = stdout.trim();
        if stdout.is_empty() {
            format!("exited with {}", output.status)
        } else {
            stdout.to_owned()
        }
    } else {
        stderr.to_owned()
    }
}
