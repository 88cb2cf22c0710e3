#![allow(dead_code)]

use std::path::PathBuf;
use std::time::Duration;

use procvisor::config::{ConfigFile, RawConfigFile, SpecialistSection};
use procvisor::types::ShutdownPolicy;

/// Builder for `ConfigFile` to simplify test setup.
///
/// Starts from the built-in defaults with short limits so that tests which
/// hit a timeout or a grace period finish quickly.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        let mut config = RawConfigFile::default();
        config.limits.command_timeout = Duration::from_secs(10);
        config.limits.drain_grace = Duration::from_millis(500);
        config.limits.terminate_grace = Duration::from_secs(1);
        config.service.grace = Duration::from_secs(2);
        Self { config }
    }

    pub fn runtime_program(mut self, program: &str) -> Self {
        self.config.runtime.program = program.to_string();
        self
    }

    pub fn artifact(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.runtime.artifact = path.into();
        self
    }

    pub fn context_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.runtime.context_file = path.into();
        self
    }

    pub fn build_program(mut self, program: &str, args: &[&str]) -> Self {
        self.config.build.program = program.to_string();
        self.config.build.args = args.iter().map(|a| a.to_string()).collect();
        self.config.build.home_env = None;
        self
    }

    pub fn command_timeout(mut self, d: Duration) -> Self {
        self.config.limits.command_timeout = d;
        self
    }

    pub fn service_grace(mut self, d: Duration) -> Self {
        self.config.service.grace = d;
        self
    }

    pub fn on_exit(mut self, policy: ShutdownPolicy) -> Self {
        self.config.service.on_exit = policy;
        self
    }

    pub fn processor(mut self, entry_point: &str, project_path: &str) -> Self {
        self.config.processor.entry_point = entry_point.to_string();
        self.config.processor.project_path = project_path.to_string();
        self
    }

    pub fn analyzer(mut self, entry_point: &str, target: &str) -> Self {
        self.config.analyzer.entry_point = entry_point.to_string();
        self.config.analyzer.target = target.to_string();
        self
    }

    pub fn result_rule(mut self, suffix: &str, extensions: &[&str]) -> Self {
        self.config.result.suffix = suffix.to_string();
        self.config.result.extensions = extensions.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn specialist(mut self, key: &str, label: &str, entry_point: &str, target: &str) -> Self {
        self.config.specialist.insert(
            key.to_string(),
            SpecialistSection {
                label: label.to_string(),
                entry_point: entry_point.to_string(),
                target: target.to_string(),
            },
        );
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
