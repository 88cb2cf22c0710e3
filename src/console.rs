// src/console.rs

//! Line-oriented interactive front end.
//!
//! One command per input line. Foreground tasks run through the task gate
//! and the console keeps reading while they run; the display task renders
//! their output as it arrives.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

use crate::actions::TaskAction;
use crate::app::App;
use crate::config::duration::format_duration;
use crate::types::ShutdownPolicy;

const HELP: &str = "\
commands:
  build                      build the project
  process [PATH]             build the context file from a project tree
  analyze [PATH]             run the analyzer against a target file
  specialist ROLE [PATH]     run a specialist (see `roles`)
  start                      start the service
  stop                       stop the service
  status                     show service and task status
  roles                      list specialist roles
  help                       show this help
  quit                       exit (stops the service)";

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Task(TaskAction),
    Start,
    Stop,
    Status,
    Roles,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err("empty command".to_string());
        };
        let rest: Vec<&str> = words.collect();
        let path = |rest: &[&str]| (!rest.is_empty()).then(|| rest.join(" "));

        let cmd = match (head.to_lowercase().as_str(), rest.as_slice()) {
            ("build", []) => ConsoleCommand::Task(TaskAction::Build),
            ("process", rest) => ConsoleCommand::Task(TaskAction::Process {
                project: path(rest),
            }),
            ("analyze", rest) => ConsoleCommand::Task(TaskAction::Analyze {
                target: path(rest),
            }),
            ("specialist", [role, rest @ ..]) => ConsoleCommand::Task(TaskAction::Specialist {
                role: role.to_string(),
                target: path(rest),
            }),
            ("specialist", []) => return Err("usage: specialist ROLE [PATH]".to_string()),
            ("start", []) => ConsoleCommand::Start,
            ("stop", []) => ConsoleCommand::Stop,
            ("status", []) => ConsoleCommand::Status,
            ("roles", []) => ConsoleCommand::Roles,
            ("help" | "?", []) => ConsoleCommand::Help,
            ("quit" | "exit", []) => ConsoleCommand::Quit,
            ("build" | "start" | "stop" | "status" | "roles" | "help" | "?" | "quit" | "exit", _) => {
                return Err(format!("`{head}` takes no arguments"));
            }
            (other, _) => {
                return Err(format!(
                    "unrecognised command: {other} (type `help` for a list)"
                ));
            }
        };
        Ok(cmd)
    }
}

/// Read commands from `input` until `quit` or end-of-input.
///
/// The service is always stopped before this returns.
pub async fn run_console<R>(app: Arc<App>, input: R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let sink = app.sink().clone();
    let mut lines = input.lines();
    sink.info("procvisor console. Type `help` for commands.");

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let cmd = match line.parse::<ConsoleCommand>() {
            Ok(cmd) => cmd,
            Err(msg) => {
                sink.error(msg);
                continue;
            }
        };
        debug!(?cmd, "console command");

        match cmd {
            ConsoleCommand::Task(action) => {
                if let Err(busy) = app.submit(action) {
                    sink.error(format!("Controls are disabled: {busy}."));
                }
            }
            ConsoleCommand::Start => {
                app.start_service();
            }
            ConsoleCommand::Stop => {
                // Stopping can take the whole grace period; keep reading.
                let app = Arc::clone(&app);
                tokio::spawn(async move {
                    app.stop_service().await;
                });
            }
            ConsoleCommand::Status => status(&app),
            ConsoleCommand::Roles => roles(&app),
            ConsoleCommand::Help => sink.block(HELP, crate::types::Classification::Normal),
            ConsoleCommand::Quit => {
                if !app.service().is_running() {
                    break;
                }
                match app.config().service.on_exit {
                    ShutdownPolicy::Stop => break,
                    ShutdownPolicy::Ask => {
                        sink.info("The service is running. Stop it and exit? [y/N]");
                        let answer = lines.next_line().await?;
                        match answer.as_deref().map(str::trim) {
                            // End-of-input while asking counts as consent.
                            None => break,
                            Some(a) if a.eq_ignore_ascii_case("y") || a.eq_ignore_ascii_case("yes") => {
                                break;
                            }
                            Some(_) => sink.info("Quit cancelled."),
                        }
                    }
                }
            }
        }
    }

    app.shutdown().await;
    sink.info("Bye.");
    Ok(())
}

fn status(app: &App) {
    let sink = app.sink();
    let state = app.service_state();
    let uptime = app
        .service()
        .uptime()
        .map(|d| format!(", up {}", format_duration(truncate_to_secs(d))))
        .unwrap_or_default();
    sink.info(format!("Service: {state}{uptime}"));

    match app.gate().running() {
        Some(task) => sink.info(format!("Task: {task} (controls disabled)")),
        None => sink.info("Task: none (controls enabled)"),
    }
}

fn roles(app: &App) {
    let sink = app.sink();
    for (key, section) in &app.config().specialist {
        sink.info(format!("{key:<10} {} -> {}", section.label, section.target));
    }
}

fn truncate_to_secs(d: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_secs(d.as_secs())
}
