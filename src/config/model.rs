// src/config/model.rs

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::paths::ResultPathRule;
use crate::types::ShutdownPolicy;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [runtime]
/// program = "java"
/// artifact = "./launcher-app/target/ourcrud-java-all-1.0-SNAPSHOT.jar"
/// context_file = "./contexto.txt"
///
/// [build]
/// program = "mvn"
/// home_env = "MAVEN_HOME"
///
/// [specialist.dba]
/// label = "Ingeniero DBA"
/// entry_point = "com.myproject.core.AIAnalyzerDB"
/// target = "./ia_consultas/guide_dba.md"
/// ```
///
/// All sections are optional; the defaults reproduce the stock project layout.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub runtime: RuntimeSection,

    #[serde(default)]
    pub build: BuildSection,

    #[serde(default)]
    pub limits: LimitsSection,

    #[serde(default)]
    pub service: ServiceSection,

    #[serde(default)]
    pub result: ResultSection,

    #[serde(default)]
    pub processor: ProcessorSection,

    #[serde(default)]
    pub analyzer: AnalyzerSection,

    /// Specialist roles from `[specialist.<key>]`.
    ///
    /// When the file declares none, the six stock roles are used.
    #[serde(default = "default_specialists")]
    pub specialist: BTreeMap<String, SpecialistSection>,
}

impl Default for RawConfigFile {
    fn default() -> Self {
        Self {
            runtime: RuntimeSection::default(),
            build: BuildSection::default(),
            limits: LimitsSection::default(),
            service: ServiceSection::default(),
            result: ResultSection::default(),
            processor: ProcessorSection::default(),
            analyzer: AnalyzerSection::default(),
            specialist: default_specialists(),
        }
    }
}

/// Validated configuration.
///
/// Produced from a [`RawConfigFile`] through `TryFrom`, which runs the
/// checks in `validate.rs`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub runtime: RuntimeSection,
    pub build: BuildSection,
    pub limits: LimitsSection,
    pub service: ServiceSection,
    pub result: ResultSection,
    pub processor: ProcessorSection,
    pub analyzer: AnalyzerSection,
    pub specialist: BTreeMap<String, SpecialistSection>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            runtime: raw.runtime,
            build: raw.build,
            limits: raw.limits,
            service: raw.service,
            result: raw.result,
            processor: raw.processor,
            analyzer: raw.analyzer,
            specialist: raw.specialist,
        }
    }

    /// Built-in defaults (no config file).
    pub fn defaults() -> Self {
        Self::new_unchecked(RawConfigFile::default())
    }

    pub fn result_rule(&self) -> ResultPathRule {
        ResultPathRule::new(&self.result.suffix, self.result.extensions.clone())
    }

    /// Look up a specialist by key, case-insensitively.
    pub fn specialist(&self, key: &str) -> Option<(&str, &SpecialistSection)> {
        let wanted = key.trim().to_lowercase();
        self.specialist
            .iter()
            .find(|(k, _)| k.to_lowercase() == wanted)
            .map(|(k, v)| (k.as_str(), v))
    }
}

/// `[runtime]`: the program used for analysis commands and the service.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuntimeSection {
    #[serde(default = "default_runtime_program")]
    pub program: String,

    /// Prebuilt archive passed as `-cp` / `-jar`.
    #[serde(default = "default_artifact")]
    pub artifact: PathBuf,

    /// Shared context file produced by the processor and read by analyzers.
    #[serde(default = "default_context_file")]
    pub context_file: PathBuf,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            program: default_runtime_program(),
            artifact: default_artifact(),
            context_file: default_context_file(),
        }
    }
}

fn default_runtime_program() -> String {
    "java".to_string()
}

fn default_artifact() -> PathBuf {
    ["launcher-app", "target", "ourcrud-java-all-1.0-SNAPSHOT.jar"]
        .iter()
        .fold(PathBuf::from("."), |acc, part| acc.join(part))
}

fn default_context_file() -> PathBuf {
    PathBuf::from(".").join("contexto.txt")
}

/// `[build]`: the build tool invocation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    #[serde(default = "default_build_program")]
    pub program: String,

    /// Environment variable naming the tool's installation root; consulted
    /// only when `program` does not resolve on PATH.
    #[serde(default = "default_home_env")]
    pub home_env: Option<String>,

    #[serde(default = "default_build_args")]
    pub args: Vec<String>,
}

impl Default for BuildSection {
    fn default() -> Self {
        Self {
            program: default_build_program(),
            home_env: default_home_env(),
            args: default_build_args(),
        }
    }
}

fn default_build_program() -> String {
    "mvn".to_string()
}

fn default_home_env() -> Option<String> {
    Some("MAVEN_HOME".to_string())
}

fn default_build_args() -> Vec<String> {
    vec!["clean".to_string(), "install".to_string()]
}

/// `[limits]`: timing for one-shot commands.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LimitsSection {
    /// Wall-clock budget for a one-shot command.
    #[serde(default = "default_command_timeout", deserialize_with = "super::duration::deserialize")]
    pub command_timeout: Duration,

    /// How long drainers may keep flushing after a timeout or forced kill.
    #[serde(default = "default_drain_grace", deserialize_with = "super::duration::deserialize")]
    pub drain_grace: Duration,

    /// After a timeout, how long to wait for the terminated command before
    /// killing it.
    #[serde(default = "default_terminate_grace", deserialize_with = "super::duration::deserialize")]
    pub terminate_grace: Duration,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            command_timeout: default_command_timeout(),
            drain_grace: default_drain_grace(),
            terminate_grace: default_terminate_grace(),
        }
    }
}

fn default_command_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_drain_grace() -> Duration {
    Duration::from_secs(1)
}

fn default_terminate_grace() -> Duration {
    Duration::from_secs(5)
}

/// `[service]`: the long-running process started with `-jar`.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceSection {
    /// Grace period between the terminate request and a forced kill.
    #[serde(default = "default_service_grace", deserialize_with = "super::duration::deserialize")]
    pub grace: Duration,

    #[serde(default)]
    pub on_exit: ShutdownPolicy,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            grace: default_service_grace(),
            on_exit: ShutdownPolicy::default(),
        }
    }
}

fn default_service_grace() -> Duration {
    Duration::from_secs(10)
}

/// `[result]`: where the external tools write their results.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResultSection {
    #[serde(default = "default_result_suffix")]
    pub suffix: String,

    /// Extensions (without the dot) whose results land in a suffixed file.
    #[serde(default = "default_result_extensions")]
    pub extensions: Vec<String>,
}

impl Default for ResultSection {
    fn default() -> Self {
        Self {
            suffix: default_result_suffix(),
            extensions: default_result_extensions(),
        }
    }
}

fn default_result_suffix() -> String {
    "-corregido".to_string()
}

fn default_result_extensions() -> Vec<String> {
    vec!["java".to_string()]
}

/// `[processor]`: builds the shared context file from a project tree.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessorSection {
    #[serde(default = "default_processor_entry")]
    pub entry_point: String,

    #[serde(default = "default_project_path")]
    pub project_path: String,
}

impl Default for ProcessorSection {
    fn default() -> Self {
        Self {
            entry_point: default_processor_entry(),
            project_path: default_project_path(),
        }
    }
}

fn default_processor_entry() -> String {
    "com.myproject.core.FileProcessor".to_string()
}

fn default_project_path() -> String {
    "./gemini-tools-core".to_string()
}

/// `[analyzer]`: the general-purpose analyzer.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnalyzerSection {
    #[serde(default = "default_analyzer_entry")]
    pub entry_point: String,

    #[serde(default = "default_analyzer_target")]
    pub target: String,
}

impl Default for AnalyzerSection {
    fn default() -> Self {
        Self {
            entry_point: default_analyzer_entry(),
            target: default_analyzer_target(),
        }
    }
}

fn default_analyzer_entry() -> String {
    "com.myproject.core.AIAnalyzer".to_string()
}

fn default_analyzer_target() -> String {
    "./bbdd.txt".to_string()
}

/// `[specialist.<key>]`: a role-specific guide generator.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SpecialistSection {
    /// Human-readable role name used in log messages.
    pub label: String,
    pub entry_point: String,
    pub target: String,
}

fn default_specialists() -> BTreeMap<String, SpecialistSection> {
    const ROLES: [(&str, &str, &str, &str); 6] = [
        ("dba", "Ingeniero DBA", "AIAnalyzerDB", "guide_dba.md"),
        ("qa", "Ingeniero QA", "AIAnalyzerQA", "guide_qa.md"),
        ("backend", "Backend (Spring)", "AIAnalyzerBackend", "guide_backend.md"),
        ("frontend", "Frontend (UI/UX)", "AIAnalyzerFrontend", "guide_frontend.md"),
        ("devops", "DevOps (CI/CD)", "AIAnalyzerDevOps", "guide_devops.md"),
        ("generic", "Genérico (SOLID)", "AIAnalyzerGeneric", "guide_solid.md"),
    ];

    ROLES
        .iter()
        .map(|(key, label, class, file)| {
            (
                key.to_string(),
                SpecialistSection {
                    label: label.to_string(),
                    entry_point: format!("com.myproject.core.{class}"),
                    target: format!("./ia_consultas/{file}"),
                },
            )
        })
        .collect()
}
