// src/types.rs

//! Core value types shared across the crate.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// How a log line should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Normal,
    Error,
}

/// Where a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamSource {
    Stdout,
    Stderr,
    /// Messages produced by procvisor itself (progress, outcomes, hints).
    Supervisor,
}

/// One line of output forwarded to the display.
///
/// Lines from the same stream arrive in the order they were produced; no
/// ordering is promised between stdout and stderr.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogLine {
    pub text: String,
    pub class: Classification,
    pub source: StreamSource,
}

impl LogLine {
    pub fn new(text: impl Into<String>, class: Classification, source: StreamSource) -> Self {
        Self {
            text: text.into(),
            class,
            source,
        }
    }

    pub fn is_error(&self) -> bool {
        self.class == Classification::Error
    }
}

/// Which external tool a command invokes.
///
/// Only used to pick a remediation hint when the program cannot be found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    BuildTool,
    Runtime,
    Other,
}

impl ToolKind {
    /// Best-effort classification from a program name.
    pub fn guess(program: &str) -> Self {
        let name = program
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(program)
            .to_lowercase();
        match name.as_str() {
            "mvn" | "mvn.cmd" | "mvnw" | "mvnw.cmd" => ToolKind::BuildTool,
            "java" | "java.exe" => ToolKind::Runtime,
            _ => ToolKind::Other,
        }
    }
}

impl fmt::Display for ToolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolKind::BuildTool => f.write_str("build tool"),
            ToolKind::Runtime => f.write_str("runtime"),
            ToolKind::Other => f.write_str("program"),
        }
    }
}

/// Failure taxonomy reported for one-shot tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    ToolNotFound,
    NonZeroExit,
    Timeout,
    ArtifactMissing,
    OutputReadFailure,
    InvalidInput,
    UnexpectedFault,
}

/// Result of a one-shot command. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOutcome {
    pub success: bool,
    /// Absent if the process never started or was killed by a signal.
    pub exit_code: Option<i32>,
    pub failure: Option<FailureKind>,
}

impl TaskOutcome {
    pub fn success(exit_code: i32) -> Self {
        Self {
            success: true,
            exit_code: Some(exit_code),
            failure: None,
        }
    }

    pub fn failed(kind: FailureKind, exit_code: Option<i32>) -> Self {
        Self {
            success: false,
            exit_code,
            failure: Some(kind),
        }
    }

    /// Keep the exit code of a successful command but mark the task as failed
    /// (used when a follow-up step such as reading the result file fails).
    pub fn with_failure(self, kind: FailureKind) -> Self {
        Self {
            success: false,
            exit_code: self.exit_code,
            failure: Some(kind),
        }
    }
}

/// What to do with a running service when the front end is asked to quit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShutdownPolicy {
    /// Ask for confirmation before stopping the service and exiting.
    Ask,
    /// Stop the service without asking.
    Stop,
}

impl Default for ShutdownPolicy {
    fn default() -> Self {
        ShutdownPolicy::Ask
    }
}

impl FromStr for ShutdownPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "ask" => Ok(ShutdownPolicy::Ask),
            "stop" => Ok(ShutdownPolicy::Stop),
            other => Err(format!(
                "invalid on_exit policy: {other} (expected \"ask\" or \"stop\")"
            )),
        }
    }
}
