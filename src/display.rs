// src/display.rs

//! The user-facing log.
//!
//! Workers never touch the display directly. They hold a cloneable
//! [`LogSink`] and post [`DisplayEvent`]s over a channel; a single task
//! running [`run_display`] owns the output and renders events in arrival
//! order.

use std::io::Write;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::exec::ServiceState;
use crate::types::{Classification, LogLine, StreamSource};

/// Events posted to the display-owning task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayEvent {
    /// A classified line of output.
    Line(LogLine),
    /// Task-triggering controls were enabled or disabled.
    Controls { enabled: bool },
    /// The service changed state.
    Service(ServiceState),
}

/// Sending half of the display channel.
///
/// Sends never block, so drainers keep reading their pipes even when the
/// display falls behind. A closed display is not an error for the sender;
/// the event is dropped.
#[derive(Debug, Clone)]
pub struct LogSink {
    tx: mpsc::UnboundedSender<DisplayEvent>,
}

impl LogSink {
    pub fn new(tx: mpsc::UnboundedSender<DisplayEvent>) -> Self {
        Self { tx }
    }

    /// Create a sink together with the receiver the display task consumes.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DisplayEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }

    pub fn send(&self, event: DisplayEvent) {
        if self.tx.send(event).is_err() {
            debug!("display closed; dropping event");
        }
    }

    pub fn line(&self, line: LogLine) {
        self.send(DisplayEvent::Line(line));
    }

    /// Informational message from procvisor itself.
    pub fn info(&self, text: impl Into<String>) {
        self.line(LogLine::new(
            text,
            Classification::Normal,
            StreamSource::Supervisor,
        ));
    }

    /// Error message from procvisor itself.
    pub fn error(&self, text: impl Into<String>) {
        self.line(LogLine::new(
            text,
            Classification::Error,
            StreamSource::Supervisor,
        ));
    }

    /// Forward multi-line text (e.g. a result file) one line at a time.
    pub fn block(&self, text: &str, class: Classification) {
        for line in text.lines() {
            self.line(LogLine::new(
                line.trim_end_matches('\r'),
                class,
                StreamSource::Supervisor,
            ));
        }
    }

    pub fn controls(&self, enabled: bool) {
        self.send(DisplayEvent::Controls { enabled });
    }

    pub fn service(&self, state: ServiceState) {
        self.send(DisplayEvent::Service(state));
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// What the display rendered before its channel closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplayStats {
    pub lines: usize,
    pub error_lines: usize,
    pub last_service_state: Option<ServiceState>,
    pub controls_enabled: bool,
}

/// Display loop: render events until every `LogSink` has been dropped.
///
/// Normal lines go to `out`, error lines to `err` prefixed with `error: `.
pub async fn run_display<O, E>(
    mut rx: mpsc::UnboundedReceiver<DisplayEvent>,
    mut out: O,
    mut err: E,
) -> DisplayStats
where
    O: Write,
    E: Write,
{
    let mut stats = DisplayStats {
        controls_enabled: true,
        ..DisplayStats::default()
    };

    while let Some(event) = rx.recv().await {
        let written = match event {
            DisplayEvent::Line(line) => {
                stats.lines += 1;
                if line.is_error() {
                    stats.error_lines += 1;
                    writeln!(err, "error: {}", line.text).and_then(|_| err.flush())
                } else {
                    writeln!(out, "{}", line.text).and_then(|_| out.flush())
                }
            }
            DisplayEvent::Controls { enabled } => {
                debug!(enabled, "controls toggled");
                stats.controls_enabled = enabled;
                Ok(())
            }
            DisplayEvent::Service(state) => {
                let res = writeln!(out, "[service: {state}]").and_then(|_| out.flush());
                stats.last_service_state = Some(state);
                res
            }
        };

        if let Err(e) = written {
            warn!(error = %e, "failed to write to display output");
        }
    }

    debug!(lines = stats.lines, "display loop finished (channel closed)");
    stats
}
