// src/scheduler.rs

//! Single-task gate for foreground one-shot tasks.
//!
//! At most one task is in flight. Submitting disables the task controls
//! before the task is spawned, and they are re-enabled exactly once when
//! the task finishes, fails, returns an error, panics or is cancelled. A
//! submission while another task is running is refused rather than queued.

use std::any::Any;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{debug, error, info, warn};

use crate::display::LogSink;
use crate::types::TaskOutcome;

/// Returned by [`TaskGate::submit`] while another task holds the gate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("task '{running}' is still running")]
pub struct GateBusy {
    pub running: String,
}

/// How a submitted task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskReport {
    /// The task body returned an outcome (which may itself be a failure).
    Completed(TaskOutcome),
    /// The task body returned an error or panicked.
    Faulted(String),
    /// The task was cancelled before it finished.
    Cancelled,
}

impl TaskReport {
    pub fn succeeded(&self) -> bool {
        matches!(self, TaskReport::Completed(outcome) if outcome.success)
    }
}

/// Handle to a submitted task.
#[derive(Debug)]
pub struct TaskTicket {
    handle: JoinHandle<TaskReport>,
}

impl TaskTicket {
    /// Wait for the task and its bookkeeping to finish.
    ///
    /// By the time this returns the controls have been re-enabled.
    pub async fn wait(self) -> TaskReport {
        match self.handle.await {
            Ok(report) => report,
            Err(e) => TaskReport::Faulted(e.to_string()),
        }
    }
}

/// The task holding the gate.
#[derive(Debug)]
struct InFlight {
    name: String,
    /// Aborts the task body; the bookkeeping task still runs to release.
    body: Option<AbortHandle>,
}

#[derive(Debug, Clone)]
pub struct TaskGate {
    busy: Arc<Mutex<Option<InFlight>>>,
    /// `true` while no task holds the gate.
    idle: Arc<watch::Sender<bool>>,
    sink: LogSink,
}

impl TaskGate {
    pub fn new(sink: LogSink) -> Self {
        let (idle, _) = watch::channel(true);
        Self {
            busy: Arc::new(Mutex::new(None)),
            idle: Arc::new(idle),
            sink,
        }
    }

    /// Name of the task currently holding the gate.
    pub fn running(&self) -> Option<String> {
        lock(&self.busy).as_ref().map(|t| t.name.clone())
    }

    pub fn is_busy(&self) -> bool {
        lock(&self.busy).is_some()
    }

    /// Cancel the running task, if any, and wait until the gate is free.
    ///
    /// Cancelling drops the task body, which kills any process it spawned.
    /// Returns the name of the cancelled task.
    pub async fn cancel(&self) -> Option<String> {
        let cancelled = lock(&self.busy).as_ref().map(|t| {
            if let Some(body) = &t.body {
                body.abort();
            }
            t.name.clone()
        });

        if let Some(name) = &cancelled {
            warn!(task = %name, "cancelling task");
            self.sink.info(format!("Cancelling task '{name}'."));
        }

        let mut idle = self.idle.subscribe();
        if idle.wait_for(|idle| *idle).await.is_err() {
            debug!("task gate channel closed while cancelling");
        }
        cancelled
    }

    /// Run `task` on its own Tokio task if the gate is free.
    pub fn submit<F>(&self, name: impl Into<String>, task: F) -> Result<TaskTicket, GateBusy>
    where
        F: Future<Output = anyhow::Result<TaskOutcome>> + Send + 'static,
    {
        let name = name.into();

        // Held until the body's abort handle is recorded, so that a cancel
        // never sees a task it cannot abort.
        let mut busy = lock(&self.busy);
        if let Some(running) = busy.as_ref() {
            debug!(task = %name, running = %running.name, "task refused; gate busy");
            return Err(GateBusy {
                running: running.name.clone(),
            });
        }
        *busy = Some(InFlight {
            name: name.clone(),
            body: None,
        });
        self.idle.send_replace(false);

        self.sink.info(format!("--- Starting task: {name} ---"));
        self.sink.controls(false);
        info!(task = %name, "task started");

        // A panic in the body surfaces as a JoinError on this task instead
        // of unwinding through the gate.
        let body = tokio::spawn(task);
        if let Some(in_flight) = busy.as_mut() {
            in_flight.body = Some(body.abort_handle());
        }
        drop(busy);

        let release = Release {
            busy: Arc::clone(&self.busy),
            idle: Arc::clone(&self.idle),
            sink: self.sink.clone(),
        };
        let sink = self.sink.clone();
        let task_name = name;

        let handle = tokio::spawn(async move {
            let _release = release;

            match body.await {
                Ok(Ok(outcome)) => {
                    info!(task = %task_name, success = outcome.success, "task finished");
                    TaskReport::Completed(outcome)
                }
                Ok(Err(e)) => {
                    error!(task = %task_name, error = %e, "task failed with an unexpected fault");
                    sink.error(format!("Unexpected fault in task '{task_name}': {e:#}"));
                    TaskReport::Faulted(format!("{e:#}"))
                }
                Err(join_err) if join_err.is_cancelled() => {
                    info!(task = %task_name, "task cancelled");
                    sink.info(format!("Task '{task_name}' was cancelled."));
                    TaskReport::Cancelled
                }
                Err(join_err) => {
                    let msg = if join_err.is_panic() {
                        panic_message(join_err.into_panic())
                    } else {
                        join_err.to_string()
                    };
                    error!(task = %task_name, error = %msg, "task panicked");
                    sink.error(format!("Unexpected fault in task '{task_name}': {msg}"));
                    TaskReport::Faulted(msg)
                }
            }
        });

        Ok(TaskTicket { handle })
    }
}

/// Frees the gate and re-enables the controls when dropped.
struct Release {
    busy: Arc<Mutex<Option<InFlight>>>,
    idle: Arc<watch::Sender<bool>>,
    sink: LogSink,
}

impl Drop for Release {
    fn drop(&mut self) {
        let mut busy = lock(&self.busy);
        busy.take();
        self.idle.send_replace(true);
        drop(busy);
        self.sink.controls(true);
    }
}

fn lock(busy: &Mutex<Option<InFlight>>) -> MutexGuard<'_, Option<InFlight>> {
    busy.lock().unwrap_or_else(PoisonError::into_inner)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "task panicked".to_string()
    }
}
