use std::fs;
use std::path::PathBuf;

use procvisor::exec::{resolve_program, resolve_program_with};
use procvisor::types::ToolKind;
use tempfile::tempdir;

const MISSING: &str = "procvisor-test-tool-that-does-not-exist";

#[test]
fn unresolvable_program_is_returned_bare() {
    assert_eq!(resolve_program_with(MISSING, None), PathBuf::from(MISSING));
    assert_eq!(resolve_program(MISSING, None), PathBuf::from(MISSING));
    assert_eq!(resolve_program(MISSING, Some("")), PathBuf::from(MISSING));
}

#[test]
fn installation_root_is_used_as_a_fallback() {
    let root = tempdir().expect("tempdir");
    fs::create_dir(root.path().join("bin")).expect("bin dir");
    let tool = root.path().join("bin").join(MISSING);
    fs::write(&tool, "").expect("tool file");

    assert_eq!(resolve_program_with(MISSING, Some(root.path())), tool);
}

#[test]
fn installation_root_without_the_tool_falls_back_to_the_bare_name() {
    let root = tempdir().expect("tempdir");
    fs::create_dir(root.path().join("bin")).expect("bin dir");

    assert_eq!(
        resolve_program_with(MISSING, Some(root.path())),
        PathBuf::from(MISSING)
    );
}

#[cfg(unix)]
#[test]
fn programs_on_path_win_over_the_installation_root() {
    let root = tempdir().expect("tempdir");
    fs::create_dir(root.path().join("bin")).expect("bin dir");
    fs::write(root.path().join("bin").join("sh"), "").expect("decoy");

    let resolved = resolve_program_with("sh", Some(root.path()));
    assert!(resolved.is_absolute());
    assert!(!resolved.starts_with(root.path()));
}

#[test]
fn tool_kind_is_guessed_from_the_program_name() {
    assert_eq!(ToolKind::guess("mvn"), ToolKind::BuildTool);
    assert_eq!(ToolKind::guess("/opt/maven/bin/mvn.cmd"), ToolKind::BuildTool);
    assert_eq!(ToolKind::guess("./mvnw"), ToolKind::BuildTool);
    assert_eq!(ToolKind::guess("java"), ToolKind::Runtime);
    assert_eq!(ToolKind::guess("C:\\jdk\\bin\\JAVA.EXE"), ToolKind::Runtime);
    assert_eq!(ToolKind::guess("python"), ToolKind::Other);
}
