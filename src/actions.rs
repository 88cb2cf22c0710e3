// src/actions.rs

//! The foreground tasks: build the project, build the shared context file,
//! run the analyzer and run a specialist.
//!
//! Command construction is pure and kept separate from execution so the
//! invocations can be printed (`--dry-run`) and tested without spawning.

use std::ffi::OsString;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;

use crate::config::{ConfigFile, SpecialistSection};
use crate::display::LogSink;
use crate::errors::{Result, SupervisorError};
use crate::exec::{CommandRunner, CommandSpec, OneShot, ServiceSpec, resolve_program};
use crate::fs::FileSystem;
use crate::types::{Classification, FailureKind, TaskOutcome, ToolKind};

/// A foreground task the user can trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskAction {
    Build,
    /// Build the context file from a project tree (`None`: configured path).
    Process { project: Option<String> },
    /// Run the general analyzer against a target (`None`: configured target).
    Analyze { target: Option<String> },
    /// Run a specialist role against a target (`None`: the role's target).
    Specialist { role: String, target: Option<String> },
}

impl TaskAction {
    pub fn name(&self) -> String {
        match self {
            TaskAction::Build => "build".to_string(),
            TaskAction::Process { .. } => "process".to_string(),
            TaskAction::Analyze { .. } => "analyze".to_string(),
            TaskAction::Specialist { role, .. } => format!("specialist:{}", role.to_lowercase()),
        }
    }
}

/// `<build program> <args...>`, resolved through PATH or the home variable.
pub fn build_command(cfg: &ConfigFile) -> CommandSpec {
    let program = resolve_program(&cfg.build.program, cfg.build.home_env.as_deref());
    CommandSpec::new(program)
        .args(&cfg.build.args)
        .tool(ToolKind::BuildTool)
}

/// `<runtime> -cp <artifact> <processor> <project> <context>`.
pub fn processor_command(cfg: &ConfigFile, project: &str) -> Result<CommandSpec> {
    let project = non_empty(project, "the project path cannot be empty")?;
    Ok(classpath_command(cfg, &cfg.processor.entry_point)
        .arg(project)
        .arg(&cfg.runtime.context_file))
}

/// `<runtime> -cp <artifact> <entry point> <context> <target>`.
///
/// Shared by the analyzer and every specialist.
pub fn analyzer_command(cfg: &ConfigFile, entry_point: &str, target: &str) -> Result<CommandSpec> {
    let target = non_empty(target, "the output path cannot be empty")?;
    Ok(classpath_command(cfg, entry_point)
        .arg(&cfg.runtime.context_file)
        .arg(target))
}

/// `<runtime> -jar <artifact>`.
pub fn service_spec(cfg: &ConfigFile) -> ServiceSpec {
    let command = CommandSpec::new(&cfg.runtime.program)
        .arg("-jar")
        .arg(&cfg.runtime.artifact)
        .tool(ToolKind::Runtime);
    ServiceSpec {
        command,
        artifact: cfg.runtime.artifact.clone(),
    }
}

fn classpath_command(cfg: &ConfigFile, entry_point: &str) -> CommandSpec {
    CommandSpec::new(&cfg.runtime.program)
        .args([
            OsString::from("-cp"),
            cfg.runtime.artifact.clone().into_os_string(),
            OsString::from(entry_point),
        ])
        .tool(ToolKind::Runtime)
}

fn non_empty<'a>(value: &'a str, msg: &str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(SupervisorError::InvalidInput(msg.to_string()))
    } else {
        Ok(trimmed)
    }
}

/// The command an action would run, without running it.
pub fn command_for(cfg: &ConfigFile, action: &TaskAction) -> Result<CommandSpec> {
    match action {
        TaskAction::Build => Ok(build_command(cfg)),
        TaskAction::Process { project } => {
            let project = project.as_deref().unwrap_or(&cfg.processor.project_path);
            processor_command(cfg, project)
        }
        TaskAction::Analyze { target } => {
            let target = target.as_deref().unwrap_or(&cfg.analyzer.target);
            analyzer_command(cfg, &cfg.analyzer.entry_point, target)
        }
        TaskAction::Specialist { role, target } => {
            let (_, section) = find_role(cfg, role)?;
            let target = target.as_deref().unwrap_or(&section.target);
            analyzer_command(cfg, &section.entry_point, target)
        }
    }
}

/// Look up a specialist role, listing the known roles when it is missing.
pub fn find_role<'a>(cfg: &'a ConfigFile, role: &str) -> Result<(&'a str, &'a SpecialistSection)> {
    cfg.specialist(role).ok_or_else(|| {
        let known: Vec<&str> = cfg.specialist.keys().map(String::as_str).collect();
        SupervisorError::InvalidInput(format!(
            "unknown specialist role '{role}' (known roles: {})",
            known.join(", ")
        ))
    })
}

/// Last segment of a fully qualified entry point (`a.b.Tool` -> `Tool`).
fn short_name(entry_point: &str) -> &str {
    entry_point.rsplit('.').next().unwrap_or(entry_point)
}

/// Executes [`TaskAction`]s.
#[derive(Debug, Clone)]
pub struct Actions {
    config: Arc<ConfigFile>,
    runner: CommandRunner,
    fs: Arc<dyn FileSystem>,
    sink: LogSink,
}

impl Actions {
    pub fn new(
        config: Arc<ConfigFile>,
        runner: CommandRunner,
        fs: Arc<dyn FileSystem>,
        sink: LogSink,
    ) -> Self {
        Self {
            config,
            runner,
            fs,
            sink,
        }
    }

    /// Run an action to completion.
    ///
    /// Every expected failure becomes error lines plus a failed outcome; an
    /// `Err` is reserved for faults the task gate should report.
    pub async fn run(&self, action: TaskAction) -> anyhow::Result<TaskOutcome> {
        debug!(task = %action.name(), "running action");
        let outcome = match &action {
            TaskAction::Build => self.build().await,
            TaskAction::Process { project } => self.process(project.as_deref()).await,
            TaskAction::Analyze { target } => self.analyze(target.as_deref()).await,
            TaskAction::Specialist { role, target } => {
                self.specialist(role, target.as_deref()).await
            }
        };
        Ok(outcome)
    }

    async fn build(&self) -> TaskOutcome {
        let job = OneShot::new(build_command(&self.config), self.config.limits.command_timeout)
            .messages(
                "Project built successfully.",
                "The project build failed.",
            );
        self.runner.run(&job).await
    }

    async fn process(&self, project: Option<&str>) -> TaskOutcome {
        let cfg = &*self.config;
        let project = project.unwrap_or(&cfg.processor.project_path);
        let spec = match processor_command(cfg, project) {
            Ok(spec) => spec,
            Err(err) => return self.rejected(err),
        };

        let tool = short_name(&cfg.processor.entry_point);
        let context = cfg.runtime.context_file.display();
        let job = OneShot::new(spec, cfg.limits.command_timeout).messages(
            format!("{tool} finished. Context created at: {context}"),
            format!("Error running {tool}."),
        );

        let outcome = self.runner.run(&job).await;
        if outcome.success {
            self.sink.info(format!(
                "The file {context} was created or overwritten with the project context."
            ));
        }
        outcome
    }

    async fn analyze(&self, target: Option<&str>) -> TaskOutcome {
        let cfg = &*self.config;
        let target = target.unwrap_or(&cfg.analyzer.target);
        let spec = match analyzer_command(cfg, &cfg.analyzer.entry_point, target) {
            Ok(spec) => spec,
            Err(err) => return self.rejected(err),
        };

        let tool = short_name(&cfg.analyzer.entry_point);
        let job = OneShot::new(spec, cfg.limits.command_timeout).messages(
            format!("{tool} finished. Result saved to: {}", target.trim()),
            format!("Error running {tool}."),
        );

        let outcome = self.runner.run(&job).await;
        if !outcome.success {
            return outcome;
        }

        let path = cfg.result_rule().result_path(Path::new(target.trim()));
        self.show_result(
            &path,
            format!("--- Contents of the output file ({}) ---", path.display()),
            "--- End of contents ---",
            outcome,
        )
    }

    async fn specialist(&self, role: &str, target: Option<&str>) -> TaskOutcome {
        let cfg = &*self.config;
        let (_, section) = match find_role(cfg, role) {
            Ok(found) => found,
            Err(err) => return self.rejected(err),
        };

        let target = target.unwrap_or(&section.target);
        let label = &section.label;
        let spec = match analyzer_command(cfg, &section.entry_point, target) {
            Ok(spec) => spec,
            Err(_) => {
                return self.rejected(SupervisorError::InvalidInput(format!(
                    "the file path for {label} cannot be empty"
                )));
            }
        };

        let job = OneShot::new(spec, cfg.limits.command_timeout).messages(
            format!("{label} finished. Learning guide generated."),
            format!("Error running {label}."),
        );

        let outcome = self.runner.run(&job).await;
        if !outcome.success {
            return outcome;
        }

        let path = cfg.result_rule().result_path(Path::new(target.trim()));
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        self.show_result(
            &path,
            format!("--- {label} guide ({file_name}) ---"),
            "--- End of guide ---",
            outcome,
        )
    }

    /// Display the result file the tool produced.
    ///
    /// A missing or unreadable file turns a successful run into an
    /// output-read failure.
    fn show_result(
        &self,
        path: &Path,
        header: String,
        footer: &str,
        outcome: TaskOutcome,
    ) -> TaskOutcome {
        match self.fs.read_to_string(path) {
            Ok(content) => {
                self.sink.info(header);
                self.sink.block(&content, Classification::Normal);
                self.sink.info(footer);
                outcome
            }
            Err(source) => {
                let err = SupervisorError::OutputRead {
                    path: path.to_path_buf(),
                    source,
                };
                self.sink.error(err.to_string());
                outcome.with_failure(err.kind())
            }
        }
    }

    fn rejected(&self, err: SupervisorError) -> TaskOutcome {
        self.sink.error(err.to_string());
        TaskOutcome::failed(FailureKind::InvalidInput, None)
    }
}
