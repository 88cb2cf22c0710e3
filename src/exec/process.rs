// src/exec/process.rs

//! A spawned child process together with its two output drainers.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};

use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::display::LogSink;
use crate::errors::{Result, SupervisorError};
use crate::exec::drain::spawn_drainer;
use crate::exec::signal::request_terminate;
use crate::types::{Classification, StreamSource, ToolKind};

/// What to launch: program, ordered arguments, optional working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub cwd: Option<PathBuf>,
    /// Used for the remediation hint when `program` cannot be found.
    pub tool: ToolKind,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let program = program.into();
        let tool = ToolKind::guess(&program.to_string_lossy());
        Self {
            program,
            args: Vec::new(),
            cwd: None,
            tool,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn tool(mut self, tool: ToolKind) -> Self {
        self.tool = tool;
        self
    }

    pub fn program_name(&self) -> String {
        self.program.to_string_lossy().into_owned()
    }

    /// The full invocation as a list of strings (lossy for non-UTF-8 parts).
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program_name())
            .chain(self.args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect()
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.argv().join(" "))
    }
}

/// A child process under supervision.
///
/// stdout and stderr are piped and drained concurrently from the moment of
/// spawn; stdout lines are classified normal and stderr lines error. The
/// child is killed if this value is dropped while it is still running.
#[derive(Debug)]
pub struct ManagedProcess {
    pid: Option<u32>,
    started_at: Instant,
    child: Child,
    drainers: Vec<JoinHandle<usize>>,
}

impl ManagedProcess {
    /// Spawn `spec` and start both drainers.
    ///
    /// A program that cannot be found is reported as
    /// [`SupervisorError::ToolNotFound`].
    pub fn spawn(spec: &CommandSpec, sink: &LogSink) -> Result<Self> {
        if let Some(dir) = spec.cwd.as_deref() {
            ensure_dir(dir)?;
        }

        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = spec.cwd.as_deref() {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => SupervisorError::ToolNotFound {
                tool: spec.tool,
                program: spec.program_name(),
            },
            _ => SupervisorError::IoError(e),
        })?;

        let pid = child.id();
        let mut drainers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            drainers.push(spawn_drainer(
                stdout,
                StreamSource::Stdout,
                Classification::Normal,
                sink.clone(),
            ));
        }
        if let Some(stderr) = child.stderr.take() {
            drainers.push(spawn_drainer(
                stderr,
                StreamSource::Stderr,
                Classification::Error,
                sink.clone(),
            ));
        }

        info!(pid, program = %spec.program.display(), "spawned process");

        Ok(Self {
            pid,
            started_at: Instant::now(),
            child,
            drainers,
        })
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Wait for the process to exit. Cancel-safe.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Ask the process to exit (SIGTERM on Unix).
    pub fn terminate(&mut self) -> io::Result<()> {
        debug!(pid = self.pid, "requesting graceful termination");
        request_terminate(&mut self.child)
    }

    /// Kill the process and wait for it to be reaped.
    pub async fn kill(&mut self) -> io::Result<()> {
        debug!(pid = self.pid, "killing process");
        self.child.kill().await
    }

    /// Join the drainers, waiting at most `grace` for both streams to reach
    /// end-of-stream. Drainers still running when it elapses are aborted.
    /// Returns `true` if every drainer finished on its own.
    pub async fn finish_draining(&mut self, grace: Duration) -> bool {
        let handles = std::mem::take(&mut self.drainers);
        let deadline = tokio::time::Instant::now() + grace;
        let mut flushed = true;

        for mut handle in handles {
            let joined = match tokio::time::timeout_at(deadline, &mut handle).await {
                Ok(joined) => joined,
                Err(_) => {
                    handle.abort();
                    flushed = false;
                    continue;
                }
            };

            if let Err(e) = joined {
                warn!(pid = self.pid, error = %e, "drainer task failed");
            }
        }

        if !flushed {
            debug!(pid = self.pid, "drainers did not flush within the grace period");
        }
        flushed
    }
}

fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(SupervisorError::InvalidInput(format!(
            "working directory {} does not exist",
            dir.display()
        )))
    }
}
