// src/app.rs

//! The owning context object.
//!
//! Built once at startup and shared by reference with the front ends. It
//! holds the service supervisor, the task gate and everything the actions
//! need; no state lives in globals.

use std::sync::Arc;

use tracing::{debug, info};

use crate::actions::{Actions, TaskAction, service_spec};
use crate::config::ConfigFile;
use crate::display::LogSink;
use crate::exec::{
    CommandRunner, ServiceState, ServiceSupervisor, ServiceTimings, StartOutcome, StopOutcome,
};
use crate::fs::FileSystem;
use crate::scheduler::{GateBusy, TaskGate, TaskTicket};

#[derive(Debug)]
pub struct App {
    config: Arc<ConfigFile>,
    sink: LogSink,
    actions: Actions,
    gate: TaskGate,
    service: ServiceSupervisor,
}

impl App {
    pub fn new(config: ConfigFile, sink: LogSink, fs: Arc<dyn FileSystem>) -> Self {
        let config = Arc::new(config);
        let runner = CommandRunner::new(sink.clone(), &config.limits);
        let actions = Actions::new(
            Arc::clone(&config),
            runner,
            Arc::clone(&fs),
            sink.clone(),
        );
        let service = ServiceSupervisor::new(
            service_spec(&config),
            ServiceTimings {
                grace: config.service.grace,
                drain_grace: config.limits.drain_grace,
            },
            fs,
            sink.clone(),
        );

        Self {
            gate: TaskGate::new(sink.clone()),
            config,
            sink,
            actions,
            service,
        }
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn sink(&self) -> &LogSink {
        &self.sink
    }

    pub fn actions(&self) -> &Actions {
        &self.actions
    }

    pub fn gate(&self) -> &TaskGate {
        &self.gate
    }

    pub fn service(&self) -> &ServiceSupervisor {
        &self.service
    }

    /// Submit a foreground task through the gate.
    pub fn submit(&self, action: TaskAction) -> Result<TaskTicket, GateBusy> {
        let actions = self.actions.clone();
        let name = action.name();
        self.gate.submit(name, async move { actions.run(action).await })
    }

    /// Start the service. Failures are already on the display; they are
    /// only surfaced here as `None`.
    pub fn start_service(&self) -> Option<StartOutcome> {
        self.service.start().ok()
    }

    pub async fn stop_service(&self) -> StopOutcome {
        self.service.stop().await
    }

    pub fn service_state(&self) -> ServiceState {
        self.service.state()
    }

    /// Cancel the running task and stop the service. Called before the
    /// process exits, so that no child outlives it.
    ///
    /// Also waits out a stop that another caller already requested.
    pub async fn shutdown(&self) {
        if let Some(task) = self.gate.cancel().await {
            info!(%task, "cancelled task before exit");
        }

        if !self.service.is_running() {
            return;
        }

        info!("stopping service before exit");
        self.service.stop().await;

        let mut state = self.service.subscribe();
        if state.wait_for(|s| !s.is_active()).await.is_err() {
            debug!("service state channel closed during shutdown");
        }
    }
}
