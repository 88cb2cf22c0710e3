// src/exec/service.rs

//! Supervisor for the single long-running service process.
//!
//! State machine:
//!
//! ```text
//!   Idle/Error --start--> Starting --spawned--> Running --stop--> Stopping --> Idle
//!                            |                     |
//!                            +--spawn failed--> Error
//!                                                  +--process exited--> Idle
//! ```
//!
//! Once spawned, the process is owned by a monitor task that lives as long
//! as the process does. The monitor drains output, notices when the process
//! exits on its own and performs the terminate-then-kill sequence when a
//! stop is requested. Callers only see the published state and pid.

use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::duration::format_duration;
use crate::display::LogSink;
use crate::errors::{Result, SupervisorError};
use crate::exec::process::{CommandSpec, ManagedProcess};
use crate::fs::FileSystem;

/// Published lifecycle state of the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceState {
    Idle,
    Starting,
    Running { pid: u32 },
    Stopping { pid: u32 },
    /// The last start attempt failed before a process existed.
    Error(String),
}

impl ServiceState {
    /// `true` while a service process exists (running or being stopped).
    pub fn is_active(&self) -> bool {
        matches!(self, ServiceState::Running { .. } | ServiceState::Stopping { .. })
    }

    pub fn pid(&self) -> Option<u32> {
        match self {
            ServiceState::Running { pid } | ServiceState::Stopping { pid } => Some(*pid),
            _ => None,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceState::Idle => f.write_str("stopped"),
            ServiceState::Starting => f.write_str("starting"),
            ServiceState::Running { pid } => write!(f, "running (pid {pid})"),
            ServiceState::Stopping { pid } => write!(f, "stopping (pid {pid})"),
            ServiceState::Error(msg) => write!(f, "error: {msg}"),
        }
    }
}

/// The service command and the artifact it launches.
#[derive(Debug, Clone)]
pub struct ServiceSpec {
    pub command: CommandSpec,
    /// Must exist before a spawn is attempted.
    pub artifact: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started { pid: u32 },
    AlreadyRunning { pid: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// There was no service to stop.
    NotRunning,
    /// The process exited within the grace period after the terminate request.
    Graceful { exit_code: Option<i32> },
    /// The grace period elapsed and the process was killed.
    Forced,
    /// The process exited on its own while the stop was being requested.
    Exited { exit_code: Option<i32> },
}

/// Timing knobs for the service.
#[derive(Debug, Clone, Copy)]
pub struct ServiceTimings {
    /// Between the terminate request and the forced kill.
    pub grace: Duration,
    /// How long drainers may flush once the process is gone.
    pub drain_grace: Duration,
}

struct StopRequest {
    reply: oneshot::Sender<StopOutcome>,
}

#[derive(Debug)]
struct Slot {
    state: ServiceState,
    control: Option<mpsc::Sender<StopRequest>>,
    started_at: Option<Instant>,
    last_exit_code: Option<i32>,
}

impl fmt::Debug for StopRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopRequest").finish_non_exhaustive()
    }
}

/// State shared between the supervisor handle and the monitor task.
#[derive(Debug)]
struct Shared {
    slot: Mutex<Slot>,
    state_tx: watch::Sender<ServiceState>,
    sink: LogSink,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish a state change. Called with the slot locked so that
    /// observers never see transitions out of order.
    fn publish(&self, slot: &mut Slot, state: ServiceState) {
        debug!(%state, "service state change");
        slot.state = state.clone();
        self.state_tx.send_replace(state.clone());
        self.sink.service(state);
    }

    fn mark_idle(&self, exit_code: Option<i32>) {
        let mut slot = self.lock();
        slot.control = None;
        slot.started_at = None;
        slot.last_exit_code = exit_code;
        self.publish(&mut slot, ServiceState::Idle);
    }
}

/// Owns the service process. At most one is alive at any time.
#[derive(Debug)]
pub struct ServiceSupervisor {
    spec: ServiceSpec,
    timings: ServiceTimings,
    fs: Arc<dyn FileSystem>,
    shared: Arc<Shared>,
}

impl ServiceSupervisor {
    pub fn new(
        spec: ServiceSpec,
        timings: ServiceTimings,
        fs: Arc<dyn FileSystem>,
        sink: LogSink,
    ) -> Self {
        let (state_tx, _) = watch::channel(ServiceState::Idle);
        let shared = Shared {
            slot: Mutex::new(Slot {
                state: ServiceState::Idle,
                control: None,
                started_at: None,
                last_exit_code: None,
            }),
            state_tx,
            sink,
        };

        Self {
            spec,
            timings,
            fs,
            shared: Arc::new(shared),
        }
    }

    pub fn state(&self) -> ServiceState {
        self.shared.lock().state.clone()
    }

    pub fn pid(&self) -> Option<u32> {
        self.shared.lock().state.pid()
    }

    pub fn is_running(&self) -> bool {
        self.shared.lock().state.is_active()
    }

    /// How long the current process has been up.
    pub fn uptime(&self) -> Option<Duration> {
        self.shared.lock().started_at.map(|t| t.elapsed())
    }

    /// Exit code of the most recent process, if it exited normally.
    pub fn last_exit_code(&self) -> Option<i32> {
        self.shared.lock().last_exit_code
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ServiceState> {
        self.shared.state_tx.subscribe()
    }

    /// Start the service unless it is already running.
    ///
    /// Must be called from within a Tokio runtime: the monitor task is
    /// spawned here and outlives this call.
    pub fn start(&self) -> Result<StartOutcome> {
        let sink = &self.shared.sink;
        let mut slot = self.shared.lock();

        if let Some(pid) = slot.state.pid() {
            sink.info(format!("The service is already running (pid {pid})."));
            return Ok(StartOutcome::AlreadyRunning { pid });
        }

        self.shared.publish(&mut slot, ServiceState::Starting);
        sink.info("--- Starting the service in the background ---");

        if !self.fs.is_file(&self.spec.artifact) {
            let err = SupervisorError::ArtifactMissing {
                path: self.spec.artifact.clone(),
            };
            self.fail(&mut slot, &err);
            return Err(err);
        }

        let process = match ManagedProcess::spawn(&self.spec.command, sink) {
            Ok(process) => process,
            Err(err) => {
                self.fail(&mut slot, &err);
                return Err(err);
            }
        };

        let Some(pid) = process.pid() else {
            let err = SupervisorError::Other(anyhow::anyhow!(
                "service exited before its pid could be read"
            ));
            self.fail(&mut slot, &err);
            return Err(err);
        };

        let (control_tx, control_rx) = mpsc::channel(1);
        slot.control = Some(control_tx);
        slot.started_at = Some(process.started_at());
        slot.last_exit_code = None;
        self.shared.publish(&mut slot, ServiceState::Running { pid });
        sink.info(format!("Service started with pid {pid}."));
        info!(pid, command = %self.spec.command, "service started");

        tokio::spawn(monitor(
            process,
            control_rx,
            Arc::clone(&self.shared),
            self.timings,
        ));

        Ok(StartOutcome::Started { pid })
    }

    /// Stop the service: terminate, wait up to the grace period, then kill.
    ///
    /// A no-op when nothing is running. When this returns, the state is no
    /// longer `Running` or `Stopping`.
    pub async fn stop(&self) -> StopOutcome {
        let sink = &self.shared.sink;

        let control = {
            let mut slot = self.shared.lock();
            match slot.state {
                ServiceState::Running { pid } => {
                    self.shared.publish(&mut slot, ServiceState::Stopping { pid });
                    sink.info(format!("--- Requesting termination of the service (pid {pid}) ---"));
                    slot.control.clone()
                }
                ServiceState::Stopping { pid } => {
                    sink.info(format!("The service (pid {pid}) is already being stopped."));
                    return StopOutcome::NotRunning;
                }
                _ => {
                    sink.info("The service is not running.");
                    return StopOutcome::NotRunning;
                }
            }
        };

        let Some(control) = control else {
            return self.already_exited();
        };

        let (reply_tx, reply_rx) = oneshot::channel();
        if control.send(StopRequest { reply: reply_tx }).await.is_err() {
            return self.already_exited();
        }

        match reply_rx.await {
            Ok(outcome) => outcome,
            Err(_) => self.already_exited(),
        }
    }

    fn already_exited(&self) -> StopOutcome {
        let exit_code = self.last_exit_code();
        debug!(?exit_code, "service exited before the stop request was handled");
        self.shared.sink.info("The service had already exited.");
        StopOutcome::Exited { exit_code }
    }

    fn fail(&self, slot: &mut Slot, err: &SupervisorError) {
        warn!(error = %err, "service failed to start");
        self.shared.sink.error(format!("Failed to start the service: {err}"));
        if let Some(hint) = err.hint() {
            self.shared.sink.error(hint);
        }
        self.shared
            .publish(slot, ServiceState::Error(err.to_string()));
    }
}

impl Drop for ServiceSupervisor {
    /// Closing the control channel tells the monitor to kill the service.
    fn drop(&mut self) {
        if self.shared.lock().control.take().is_some() {
            debug!("service supervisor dropped while the service is running");
        }
    }
}

/// Owns the process for its whole lifetime.
async fn monitor(
    mut process: ManagedProcess,
    mut control_rx: mpsc::Receiver<StopRequest>,
    shared: Arc<Shared>,
    timings: ServiceTimings,
) {
    let pid = process.pid();

    tokio::select! {
        status = process.wait() => {
            process.finish_draining(timings.drain_grace).await;
            let exit_code = report_exit(&shared.sink, status);
            info!(pid, ?exit_code, "service exited on its own");
            shared.mark_idle(exit_code);
        }

        request = control_rx.recv() => {
            match request {
                Some(request) => {
                    let outcome = shutdown(&mut process, timings.grace, &shared.sink).await;
                    process.finish_draining(timings.drain_grace).await;
                    info!(pid, ?outcome, "service stopped");
                    let exit_code = match outcome {
                        StopOutcome::Graceful { exit_code } => exit_code,
                        _ => None,
                    };
                    shared.mark_idle(exit_code);
                    let _ = request.reply.send(outcome);
                }
                None => {
                    warn!(pid, "service supervisor dropped; killing service");
                    if let Err(e) = process.kill().await {
                        warn!(pid, error = %e, "failed to kill orphaned service");
                    }
                    process.finish_draining(timings.drain_grace).await;
                    shared.mark_idle(None);
                }
            }
        }
    }
}

async fn shutdown(process: &mut ManagedProcess, grace: Duration, sink: &LogSink) -> StopOutcome {
    if let Err(e) = process.terminate() {
        warn!(pid = process.pid(), error = %e, "failed to send terminate request");
        sink.error(format!("Failed to request termination: {e}"));
    }

    match tokio::time::timeout(grace, process.wait()).await {
        Ok(Ok(status)) => {
            sink.info("Service stopped successfully.");
            StopOutcome::Graceful {
                exit_code: status.code(),
            }
        }
        Ok(Err(e)) => {
            sink.error(format!("Failed waiting for the service to exit: {e}. Killing it."));
            force(process, sink).await
        }
        Err(_) => {
            sink.error(format!(
                "The service did not stop within {}. Killing it.",
                format_duration(grace)
            ));
            force(process, sink).await
        }
    }
}

/// Kill and wait without a further timeout.
async fn force(process: &mut ManagedProcess, sink: &LogSink) -> StopOutcome {
    if let Err(e) = process.kill().await {
        warn!(pid = process.pid(), error = %e, "failed to kill service");
        sink.error(format!("Failed to kill the service: {e}"));
    }
    StopOutcome::Forced
}

fn report_exit(sink: &LogSink, status: std::io::Result<ExitStatus>) -> Option<i32> {
    match status {
        Ok(status) => {
            let code = status.code();
            let text = match code {
                Some(code) => format!("The service exited with code {code}."),
                None => "The service was terminated by a signal.".to_string(),
            };
            if status.success() {
                sink.info(text);
            } else {
                sink.error(text);
            }
            code
        }
        Err(e) => {
            sink.error(format!("Failed waiting for the service: {e}"));
            None
        }
    }
}
