// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`process`] spawns a child with both output streams drained.
//! - [`drain`] forwards one output stream to the display, line by line.
//! - [`runner`] runs bounded one-shot commands and reports their outcome.
//! - [`service`] owns the single long-running service process.
//! - [`signal`] sends the platform's graceful termination request.
//! - [`tool`] locates external programs on PATH or under an install root.

pub mod drain;
pub mod process;
pub mod runner;
pub mod service;
pub mod signal;
pub mod tool;

pub use drain::{drain_stream, spawn_drainer};
pub use process::{CommandSpec, ManagedProcess};
pub use runner::{CommandRunner, OneShot};
pub use service::{
    ServiceSpec, ServiceState, ServiceSupervisor, ServiceTimings, StartOutcome, StopOutcome,
};
pub use tool::{resolve_program, resolve_program_with};
