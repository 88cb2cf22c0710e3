// src/config/validate.rs

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{Result, SupervisorError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SupervisorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_programs(cfg)?;
    validate_limits(cfg)?;
    validate_result_rule(cfg)?;
    validate_entry_points(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> SupervisorError {
    SupervisorError::ConfigError(msg.into())
}

fn validate_programs(cfg: &RawConfigFile) -> Result<()> {
    if cfg.runtime.program.trim().is_empty() {
        return Err(config_error("[runtime].program must not be empty"));
    }
    if cfg.runtime.artifact.as_os_str().is_empty() {
        return Err(config_error("[runtime].artifact must not be empty"));
    }
    if cfg.runtime.context_file.as_os_str().is_empty() {
        return Err(config_error("[runtime].context_file must not be empty"));
    }
    if cfg.build.program.trim().is_empty() {
        return Err(config_error("[build].program must not be empty"));
    }
    Ok(())
}

fn validate_limits(cfg: &RawConfigFile) -> Result<()> {
    if cfg.limits.command_timeout.is_zero() {
        return Err(config_error("[limits].command_timeout must be greater than zero"));
    }
    if cfg.service.grace.is_zero() {
        return Err(config_error("[service].grace must be greater than zero"));
    }
    Ok(())
}

fn validate_result_rule(cfg: &RawConfigFile) -> Result<()> {
    if cfg.result.suffix.is_empty() {
        return Err(config_error("[result].suffix must not be empty"));
    }
    for ext in cfg.result.extensions.iter() {
        let ext = ext.trim_start_matches('.');
        if ext.is_empty() {
            return Err(config_error("[result].extensions must not contain empty entries"));
        }
    }
    Ok(())
}

fn validate_entry_points(cfg: &RawConfigFile) -> Result<()> {
    if cfg.processor.entry_point.trim().is_empty() {
        return Err(config_error("[processor].entry_point must not be empty"));
    }
    if cfg.analyzer.entry_point.trim().is_empty() {
        return Err(config_error("[analyzer].entry_point must not be empty"));
    }
    for (key, role) in cfg.specialist.iter() {
        if role.label.trim().is_empty() {
            return Err(config_error(format!(
                "specialist '{}' must have a non-empty label",
                key
            )));
        }
        if role.entry_point.trim().is_empty() {
            return Err(config_error(format!(
                "specialist '{}' must have a non-empty entry_point",
                key
            )));
        }
    }
    Ok(())
}
