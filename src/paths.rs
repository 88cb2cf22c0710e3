// src/paths.rs

//! Result-file naming convention of the external analyzers.
//!
//! For some target extensions the analyzer does not overwrite the target but
//! writes next to it, with a suffix inserted before the extension
//! (`Main.java` -> `Main-corregido.java`). A bare dotfile named after the
//! extension has no stem to split, so the suffix is appended to the whole
//! name (`.java` -> `.java-corregido`). Every other target is overwritten in
//! place.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// Map a target path to the file the external tool actually writes.
///
/// `suffixed` decides, from the target's extension (without the dot), whether
/// the suffix convention applies. Pure path computation; no IO.
pub fn expected_result_path(
    target: &Path,
    suffix: &str,
    suffixed: impl Fn(&str) -> bool,
) -> PathBuf {
    let (Some(stem), Some(ext)) = (target.file_stem(), target.extension()) else {
        return dotfile_result_path(target, suffix, suffixed);
    };

    if !suffixed(&ext.to_string_lossy()) {
        return target.to_path_buf();
    }

    let mut name = OsString::from(stem);
    name.push(suffix);
    name.push(".");
    name.push(ext);
    target.with_file_name(name)
}

/// `.java` style names: `Path` sees a stem and no extension.
fn dotfile_result_path(target: &Path, suffix: &str, suffixed: impl Fn(&str) -> bool) -> PathBuf {
    let Some(name) = target.file_name() else {
        return target.to_path_buf();
    };
    let name_str = name.to_string_lossy();
    match name_str.strip_prefix('.') {
        Some(ext) if !ext.is_empty() && suffixed(ext) => {
            let mut name = name.to_os_string();
            name.push(suffix);
            target.with_file_name(name)
        }
        _ => target.to_path_buf(),
    }
}

/// Suffix + extension set, as configured under `[result]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultPathRule {
    suffix: String,
    extensions: Vec<String>,
}

impl ResultPathRule {
    pub fn new(suffix: impl Into<String>, extensions: Vec<String>) -> Self {
        let extensions = extensions
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        Self {
            suffix: suffix.into(),
            extensions,
        }
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Case-insensitive extension match.
    pub fn applies_to(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.extensions.iter().any(|e| *e == ext)
    }

    pub fn result_path(&self, target: &Path) -> PathBuf {
        expected_result_path(target, &self.suffix, |ext| self.applies_to(ext))
    }
}

impl Default for ResultPathRule {
    fn default() -> Self {
        Self::new("-corregido", vec!["java".to_string()])
    }
}
