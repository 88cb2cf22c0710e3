// src/exec/tool.rs

//! Locating external programs.

use std::path::{Path, PathBuf};

use tracing::debug;

/// Resolve `program` for spawning.
///
/// 1. `program` on PATH (via `which`).
/// 2. `<$home_env>/bin/<program>` if `home_env` names an installation root.
/// 3. The bare name; spawning it then reports the tool as missing.
pub fn resolve_program(program: &str, home_env: Option<&str>) -> PathBuf {
    let home = home_env
        .filter(|name| !name.is_empty())
        .and_then(std::env::var_os)
        .map(PathBuf::from);
    resolve_program_with(program, home.as_deref())
}

/// [`resolve_program`] with the installation root already looked up.
pub fn resolve_program_with(program: &str, home: Option<&Path>) -> PathBuf {
    if let Ok(found) = which::which(program) {
        debug!(program, path = %found.display(), "resolved program on PATH");
        return found;
    }

    if let Some(home) = home {
        let bin = home.join("bin");
        for candidate in candidate_names(program) {
            let path = bin.join(&candidate);
            if path.is_file() {
                debug!(program, path = %path.display(), "resolved program from installation root");
                return path;
            }
        }
        debug!(program, home = %home.display(), "program not found under installation root");
    }

    PathBuf::from(program)
}

/// File names to try under `<root>/bin`, most specific first.
fn candidate_names(program: &str) -> Vec<String> {
    let mut names = Vec::with_capacity(3);
    if cfg!(windows) && Path::new(program).extension().is_none() {
        names.push(format!("{program}.cmd"));
        names.push(format!("{program}.exe"));
    }
    names.push(program.to_string());
    names
}
