// src/errors.rs

//! Crate-wide error type and helpers.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::{FailureKind, ToolKind};

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("{tool} '{program}' was not found")]
    ToolNotFound { tool: ToolKind, program: String },

    #[error("command failed with exit code {}", display_code(.code))]
    NonZeroExit { code: Option<i32> },

    #[error("command exceeded its time limit of {}s", .after.as_secs_f64())]
    Timeout { after: Duration },

    #[error("launchable artifact not found at {}", .path.display())]
    ArtifactMissing { path: PathBuf },

    #[error("could not read output file {}: {source}", .path.display())]
    OutputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{0}")]
    InvalidInput(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "<terminated by signal>".to_string(),
    }
}

impl SupervisorError {
    /// Map onto the failure taxonomy reported in a `TaskOutcome`.
    pub fn kind(&self) -> FailureKind {
        match self {
            SupervisorError::ToolNotFound { .. } => FailureKind::ToolNotFound,
            SupervisorError::NonZeroExit { .. } => FailureKind::NonZeroExit,
            SupervisorError::Timeout { .. } => FailureKind::Timeout,
            SupervisorError::ArtifactMissing { .. } => FailureKind::ArtifactMissing,
            SupervisorError::OutputRead { .. } => FailureKind::OutputReadFailure,
            SupervisorError::InvalidInput(_) | SupervisorError::ConfigError(_) => {
                FailureKind::InvalidInput
            }
            SupervisorError::IoError(_)
            | SupervisorError::TomlError(_)
            | SupervisorError::Other(_) => FailureKind::UnexpectedFault,
        }
    }

    /// Remediation hint shown next to the error, if there is one.
    pub fn hint(&self) -> Option<String> {
        match self {
            SupervisorError::ToolNotFound { tool, program } => Some(match tool {
                ToolKind::BuildTool => format!(
                    "make sure the build tool '{program}' is installed and reachable through PATH \
                     (or set the configured home environment variable to its installation root)"
                ),
                ToolKind::Runtime => format!(
                    "make sure the runtime '{program}' (JRE/JDK) is installed and reachable through PATH"
                ),
                ToolKind::Other => format!("is '{program}' installed and on your PATH?"),
            }),
            SupervisorError::ArtifactMissing { .. } => {
                Some("has the project been built?".to_string())
            }
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, SupervisorError>;
