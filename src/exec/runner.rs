// src/exec/runner.rs

//! One-shot command runner.

use std::time::Duration;

use tracing::{info, warn};

use crate::config::duration::format_duration;
use crate::config::LimitsSection;
use crate::display::LogSink;
use crate::errors::{Result, SupervisorError};
use crate::exec::process::{CommandSpec, ManagedProcess};
use crate::types::TaskOutcome;

/// A bounded command plus the messages reported on success or failure.
#[derive(Debug, Clone)]
pub struct OneShot {
    pub spec: CommandSpec,
    pub timeout: Duration,
    pub success_message: String,
    pub failure_message: String,
}

impl OneShot {
    pub fn new(spec: CommandSpec, timeout: Duration) -> Self {
        Self {
            spec,
            timeout,
            success_message: "command finished successfully".to_string(),
            failure_message: "command failed".to_string(),
        }
    }

    pub fn messages(mut self, success: impl Into<String>, failure: impl Into<String>) -> Self {
        self.success_message = success.into();
        self.failure_message = failure.into();
        self
    }
}

/// Runs one-shot commands to completion or timeout.
///
/// Output is forwarded to the display as it is produced. Every failure is
/// turned into error lines plus a failed [`TaskOutcome`]; nothing is
/// propagated to the caller.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    sink: LogSink,
    drain_grace: Duration,
    terminate_grace: Duration,
}

impl CommandRunner {
    pub fn new(sink: LogSink, limits: &LimitsSection) -> Self {
        Self {
            sink,
            drain_grace: limits.drain_grace,
            terminate_grace: limits.terminate_grace,
        }
    }

    pub async fn run(&self, job: &OneShot) -> TaskOutcome {
        self.sink.info(format!("Running: {}", job.spec));

        match self.execute(job).await {
            Ok(code) => {
                self.sink.info(job.success_message.as_str());
                TaskOutcome::success(code)
            }
            Err(err) => {
                let exit_code = match &err {
                    SupervisorError::NonZeroExit { code } => *code,
                    _ => None,
                };
                self.report_failure(job, &err);
                TaskOutcome::failed(err.kind(), exit_code)
            }
        }
    }

    async fn execute(&self, job: &OneShot) -> Result<i32> {
        let mut process = ManagedProcess::spawn(&job.spec, &self.sink)?;
        let pid = process.pid();

        let deadline = tokio::time::Instant::now() + job.timeout;

        let status = match tokio::time::timeout_at(deadline, process.wait()).await {
            Ok(status) => status?,
            Err(_elapsed) => {
                warn!(pid, timeout = ?job.timeout, "command timed out; terminating");
                self.stop_after_timeout(&mut process).await;
                process.finish_draining(self.drain_grace).await;
                return Err(SupervisorError::Timeout { after: job.timeout });
            }
        };

        // The streams can outlive the process when it leaves a background
        // child holding them. Reading stays within the time limit, with at
        // least the drain grace for a process that exits right at the limit.
        let budget = deadline
            .saturating_duration_since(tokio::time::Instant::now())
            .max(self.drain_grace);
        if !process.finish_draining(budget).await {
            warn!(pid, "output streams still open after the command exited; abandoning them");
            self.sink.info(
                "The command exited but left its output open (a background process may still be running); output after this point is not shown.",
            );
        }

        info!(
            pid,
            exit_code = status.code(),
            success = status.success(),
            elapsed = ?process.uptime(),
            "command exited"
        );

        match status.code() {
            Some(0) => Ok(0),
            code => Err(SupervisorError::NonZeroExit { code }),
        }
    }

    /// Terminate gracefully, then kill if the process outlives the grace period.
    async fn stop_after_timeout(&self, process: &mut ManagedProcess) {
        if let Err(e) = process.terminate() {
            warn!(pid = process.pid(), error = %e, "failed to request termination");
        }

        match tokio::time::timeout(self.terminate_grace, process.wait()).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => warn!(pid = process.pid(), error = %e, "failed waiting for terminated command"),
            Err(_) => {
                warn!(pid = process.pid(), "command ignored termination; killing it");
                if let Err(e) = process.kill().await {
                    warn!(pid = process.pid(), error = %e, "failed to kill command");
                }
            }
        }
    }

    fn report_failure(&self, job: &OneShot, err: &SupervisorError) {
        match err {
            SupervisorError::Timeout { after } => {
                self.sink.error(format!(
                    "the command exceeded its time limit of {}; process terminated.",
                    format_duration(*after)
                ));
            }
            SupervisorError::NonZeroExit { .. } => {
                self.sink.error(err.to_string());
                self.sink.error(job.failure_message.as_str());
            }
            SupervisorError::ToolNotFound { .. } | SupervisorError::InvalidInput(_) => {
                self.sink.error(err.to_string());
            }
            other => {
                self.sink.error(format!("unexpected failure: {other}"));
            }
        }

        if let Some(hint) = err.hint() {
            self.sink.error(hint);
        }
    }
}
