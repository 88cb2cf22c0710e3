use procvisor::actions::TaskAction;
use procvisor::console::ConsoleCommand;

mod common;

#[test]
fn task_commands_parse_with_optional_paths() {
    assert_eq!("build".parse(), Ok(ConsoleCommand::Task(TaskAction::Build)));
    assert_eq!(
        "process".parse(),
        Ok(ConsoleCommand::Task(TaskAction::Process { project: None }))
    );
    assert_eq!(
        "process ./my project".parse(),
        Ok(ConsoleCommand::Task(TaskAction::Process {
            project: Some("./my project".to_string())
        }))
    );
    assert_eq!(
        "ANALYZE out/Main.java".parse(),
        Ok(ConsoleCommand::Task(TaskAction::Analyze {
            target: Some("out/Main.java".to_string())
        }))
    );
    assert_eq!(
        "specialist dba".parse(),
        Ok(ConsoleCommand::Task(TaskAction::Specialist {
            role: "dba".to_string(),
            target: None
        }))
    );
    assert_eq!(
        "specialist qa ./guide.md".parse(),
        Ok(ConsoleCommand::Task(TaskAction::Specialist {
            role: "qa".to_string(),
            target: Some("./guide.md".to_string())
        }))
    );
}

#[test]
fn control_commands_parse() {
    assert_eq!("start".parse(), Ok(ConsoleCommand::Start));
    assert_eq!("  stop  ".parse(), Ok(ConsoleCommand::Stop));
    assert_eq!("status".parse(), Ok(ConsoleCommand::Status));
    assert_eq!("roles".parse(), Ok(ConsoleCommand::Roles));
    assert_eq!("?".parse(), Ok(ConsoleCommand::Help));
    assert_eq!("exit".parse(), Ok(ConsoleCommand::Quit));
}

#[test]
fn malformed_commands_are_rejected() {
    assert!("".parse::<ConsoleCommand>().is_err());
    assert!("specialist".parse::<ConsoleCommand>().is_err());
    assert!("build now".parse::<ConsoleCommand>().is_err());
    assert!("deploy".parse::<ConsoleCommand>().is_err());
}

#[cfg(unix)]
mod session {
    use std::sync::Arc;
    use std::time::Duration;

    use procvisor::app::App;
    use procvisor::console::run_console;
    use procvisor::exec::ServiceState;
    use procvisor::fs::RealFileSystem;
    use procvisor::types::ShutdownPolicy;
    use tokio::io::AsyncWriteExt;

    use super::common::{
        ConfigFileBuilder, EventCapture, fake_runtime, init_tracing, wait_until_gone,
        with_timeout_of,
    };

    fn app(dir: &std::path::Path, policy: ShutdownPolicy) -> (Arc<App>, EventCapture) {
        let runtime = fake_runtime(dir);
        std::fs::write(dir.join("app.jar"), "jar").expect("artifact");
        let cfg = ConfigFileBuilder::new()
            .runtime_program(&runtime.to_string_lossy())
            .artifact(dir.join("app.jar"))
            .on_exit(policy)
            .build();
        let (sink, capture) = EventCapture::new();
        (Arc::new(App::new(cfg, sink, Arc::new(RealFileSystem))), capture)
    }

    async fn session(app: &Arc<App>, input: &'static str) {
        with_timeout_of(
            Duration::from_secs(10),
            run_console(Arc::clone(app), input.as_bytes()),
        )
        .await
        .expect("console session");
    }

    #[tokio::test]
    async fn quit_with_stop_policy_stops_the_service() {
        init_tracing();
        let dir = tempfile::tempdir().expect("tempdir");
        let (app, mut capture) = app(dir.path(), ShutdownPolicy::Stop);

        session(&app, "start\nquit\nstatus\n").await;

        assert_eq!(app.service_state(), ServiceState::Idle);
        assert!(capture.contains("Service started with pid"));
        assert!(capture.contains("Service stopped successfully."));
        // Nothing after `quit` is read.
        assert!(!capture.contains("Service: "));
    }

    #[tokio::test]
    async fn quit_with_ask_policy_can_be_cancelled() {
        init_tracing();
        let dir = tempfile::tempdir().expect("tempdir");
        let (app, mut capture) = app(dir.path(), ShutdownPolicy::Ask);

        session(&app, "start\nquit\nn\nstatus\nquit\ny\n").await;

        assert!(capture.contains("Stop it and exit? [y/N]"));
        assert!(capture.contains("Quit cancelled."));
        assert!(capture.contains("Service: running (pid"));
        assert_eq!(app.service_state(), ServiceState::Idle);
    }

    #[tokio::test]
    async fn end_of_input_stops_the_service() {
        init_tracing();
        let dir = tempfile::tempdir().expect("tempdir");
        let (app, _capture) = app(dir.path(), ShutdownPolicy::Ask);

        session(&app, "start\n").await;

        assert_eq!(app.service_state(), ServiceState::Idle);
    }

    #[tokio::test]
    async fn unknown_commands_are_reported_and_reading_continues() {
        init_tracing();
        let dir = tempfile::tempdir().expect("tempdir");
        let (app, mut capture) = app(dir.path(), ShutdownPolicy::Stop);

        session(&app, "deploy\nroles\nquit\n").await;

        assert!(
            capture
                .supervisor_errors()
                .iter()
                .any(|e| e.contains("unrecognised command: deploy"))
        );
        assert!(capture.contains("Ingeniero DBA"));
    }

    #[tokio::test]
    async fn end_of_input_during_a_task_kills_its_process() {
        init_tracing();
        let dir = tempfile::tempdir().expect("tempdir");
        let pid_file = dir.path().join("build.pid");
        let script = format!("echo $$ > '{}'; exec sleep 30", pid_file.display());
        let cfg = ConfigFileBuilder::new()
            .build_program("sh", &["-c", &script])
            .build();
        let (sink, mut capture) = EventCapture::new();
        let app = Arc::new(App::new(cfg, sink, Arc::new(RealFileSystem)));

        let (mut input, console_side) = tokio::io::duplex(64);
        let console = tokio::spawn(run_console(
            Arc::clone(&app),
            tokio::io::BufReader::new(console_side),
        ));
        input.write_all(b"build\n").await.expect("write command");

        let pid = with_timeout_of(Duration::from_secs(5), async {
            loop {
                if let Some(pid) = std::fs::read_to_string(&pid_file)
                    .ok()
                    .and_then(|s| s.trim().parse::<u32>().ok())
                {
                    return pid;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await;

        drop(input);
        with_timeout_of(Duration::from_secs(5), console)
            .await
            .expect("console task")
            .expect("console session");

        assert!(!app.gate().is_busy());
        assert!(
            wait_until_gone(pid, Duration::from_secs(3)).await,
            "build process {pid} outlived the console"
        );
        assert!(capture.contains("Task 'build' was cancelled."));
    }
}
