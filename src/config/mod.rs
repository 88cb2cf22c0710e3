// src/config/mod.rs

//! Configuration loading and validation for procvisor.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Parse compact duration strings (`duration.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate basic invariants (`validate.rs`).

pub mod duration;
pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_or_default};
pub use model::{
    AnalyzerSection, BuildSection, ConfigFile, LimitsSection, ProcessorSection, RawConfigFile,
    ResultSection, RuntimeSection, ServiceSection, SpecialistSection,
};
