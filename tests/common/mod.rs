#![allow(dead_code)]

pub use procvisor_test_utils::builders::ConfigFileBuilder;
pub use procvisor_test_utils::capture::EventCapture;
pub use procvisor_test_utils::{init_tracing, with_timeout, with_timeout_of};

use std::path::{Path, PathBuf};

/// Write an executable shell script into `dir`.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("write script");
    let mut perms = std::fs::metadata(&path).expect("script metadata").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod script");
    path
}

/// A stand-in for the runtime: `<script> -cp ARTIFACT ENTRY ARG1 ARG2`.
///
/// - `-jar ARTIFACT` runs as the service until terminated.
/// - `*FileProcessor` writes the context file (ARG2) from the project (ARG1).
/// - `*Fail*` writes to stderr and exits 3.
/// - `*Silent*` succeeds without writing a result.
/// - anything else writes two result lines to the result file for ARG2,
///   using the `-corregido` suffix for `.java` targets.
#[cfg(unix)]
pub fn fake_runtime(dir: &Path) -> PathBuf {
    write_script(
        dir,
        "fake-runtime",
        r#"if [ "$1" = "-jar" ]; then
  echo "service listening"
  exec sleep 30
fi
entry="$3"
case "$entry" in
  *FileProcessor)
    echo "scanning $4"
    echo "context of $4" > "$5"
    exit 0
    ;;
  *Fail*)
    echo "analysis failed" >&2
    exit 3
    ;;
  *Silent*)
    exit 0
    ;;
esac
target="$5"
case "$target" in
  *.java) out="${target%.java}-corregido.java" ;;
  *) out="$target" ;;
esac
echo "analyzing with $entry"
printf 'result line 1\nresult line 2\n' > "$out""#,
    )
}

/// `true` while `pid` names a live process. Zombies count as gone.
#[cfg(unix)]
pub fn process_alive(pid: u32) -> bool {
    if !Path::new("/proc/self").exists() {
        let pid = nix::unistd::Pid::from_raw(pid as i32);
        return nix::sys::signal::kill(pid, None).is_ok();
    }
    match std::fs::read_to_string(format!("/proc/{pid}/stat")) {
        // state is the first field after the parenthesised command name
        Ok(stat) => !stat
            .rsplit(')')
            .next()
            .is_some_and(|rest| rest.trim_start().starts_with('Z')),
        Err(_) => false,
    }
}

/// Poll until `pid` is gone or `limit` elapses.
#[cfg(unix)]
pub async fn wait_until_gone(pid: u32, limit: std::time::Duration) -> bool {
    let deadline = std::time::Instant::now() + limit;
    while std::time::Instant::now() < deadline {
        if !process_alive(pid) {
            return true;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    !process_alive(pid)
}
