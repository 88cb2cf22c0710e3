// src/lib.rs

pub mod actions;
pub mod app;
pub mod cli;
pub mod config;
pub mod console;
pub mod display;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod paths;
pub mod scheduler;
pub mod types;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::io::BufReader;
use tracing::{debug, info, warn};

use crate::actions::{TaskAction, command_for, service_spec};
use crate::app::App;
use crate::cli::{CliArgs, Command};
use crate::config::ConfigFile;
use crate::config::duration::format_duration;
use crate::config::loader::load_or_default;
use crate::display::{LogSink, run_display};
use crate::fs::RealFileSystem;

/// How long the display may keep flushing once the app is gone.
const DISPLAY_FLUSH: Duration = Duration::from_secs(1);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the display task
/// - the app context (service supervisor, task gate, actions)
/// - the selected front end
/// - Ctrl-C handling
///
/// Returns `Ok(false)` when a one-shot task failed or the service could
/// not be started.
pub async fn run(args: CliArgs) -> Result<bool> {
    let cfg = load_or_default(args.config.as_deref())?;
    let command = args.command();

    if args.dry_run {
        print_dry_run(&cfg, &command);
        return Ok(true);
    }

    if command == Command::Roles {
        print_roles(&cfg);
        return Ok(true);
    }

    let (sink, rx) = LogSink::channel();
    let display = tokio::spawn(run_display(rx, std::io::stdout(), std::io::stderr()));

    let app = Arc::new(App::new(cfg, sink, Arc::new(RealFileSystem)));
    info!(?command, "procvisor starting");

    let ok = match command.task() {
        Some(action) => run_task(&app, action).await,
        None if command == Command::Serve => serve(&app).await,
        None => {
            interactive(&app).await?;
            true
        }
    };

    // Dropping the app drops the last sinks, which ends the display loop.
    drop(app);
    match tokio::time::timeout(DISPLAY_FLUSH, display).await {
        Ok(Ok(stats)) => debug!(
            lines = stats.lines,
            errors = stats.error_lines,
            "display finished"
        ),
        Ok(Err(e)) => warn!(error = %e, "display task failed"),
        Err(_) => debug!("display did not finish within {}", format_duration(DISPLAY_FLUSH)),
    }

    Ok(ok)
}

/// Interactive console on stdin; Ctrl-C stops the service and exits.
async fn interactive(app: &Arc<App>) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());

    tokio::select! {
        res = console::run_console(Arc::clone(app), stdin) => res,
        _ = tokio::signal::ctrl_c() => {
            app.sink().info("Interrupted.");
            app.shutdown().await;
            Ok(())
        }
    }
}

/// Start the service and keep it running until Ctrl-C or until it exits.
async fn serve(app: &App) -> bool {
    if app.start_service().is_none() {
        return false;
    }

    let mut state = app.service().subscribe();
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                warn!(error = %e, "failed to listen for Ctrl+C");
            }
            app.sink().info("Interrupted; stopping the service.");
        }
        _ = state.wait_for(|s| !s.is_active()) => {
            debug!("service exited on its own");
        }
    }

    app.shutdown().await;
    true
}

/// Run one task through the gate and wait for it.
async fn run_task(app: &App, action: TaskAction) -> bool {
    match app.submit(action) {
        Ok(ticket) => ticket.wait().await.succeeded(),
        Err(busy) => {
            app.sink().error(format!("Controls are disabled: {busy}."));
            false
        }
    }
}

fn print_roles(cfg: &ConfigFile) {
    for (key, section) in &cfg.specialist {
        println!("{key:<10} {:<20} {}", section.label, section.target);
    }
}

/// Simple dry-run output: print the resolved commands.
fn print_dry_run(cfg: &ConfigFile, command: &Command) {
    println!("procvisor dry-run");
    println!(
        "  limits: command_timeout = {}, drain_grace = {}, terminate_grace = {}",
        format_duration(cfg.limits.command_timeout),
        format_duration(cfg.limits.drain_grace),
        format_duration(cfg.limits.terminate_grace)
    );
    println!(
        "  service: grace = {}, on_exit = {:?}",
        format_duration(cfg.service.grace),
        cfg.service.on_exit
    );
    println!(
        "  result: suffix = {:?}, extensions = {:?}",
        cfg.result.suffix, cfg.result.extensions
    );
    println!();

    let show = |label: &str, spec: crate::errors::Result<crate::exec::CommandSpec>| match spec {
        Ok(spec) => println!("  {label}: {spec}"),
        Err(e) => println!("  {label}: <{e}>"),
    };

    if let Some(action) = command.task() {
        show(&action.name(), command_for(cfg, &action));
    } else if *command == Command::Serve {
        show("serve", Ok(service_spec(cfg).command));
    } else {
        println!("commands:");
        let mut actions = vec![
            TaskAction::Build,
            TaskAction::Process { project: None },
            TaskAction::Analyze { target: None },
        ];
        actions.extend(cfg.specialist.keys().map(|role| TaskAction::Specialist {
            role: role.clone(),
            target: None,
        }));
        for action in &actions {
            show(&action.name(), command_for(cfg, action));
        }
        show("serve", Ok(service_spec(cfg).command));
    }

    debug!("dry-run complete (no execution)");
}
