#![cfg(unix)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use procvisor::display::LogSink;
use procvisor::errors::SupervisorError;
use procvisor::exec::{
    CommandSpec, ServiceSpec, ServiceState, ServiceSupervisor, ServiceTimings, StartOutcome,
    StopOutcome,
};
use procvisor::fs::mock::MockFileSystem;

mod common;
use common::{EventCapture, init_tracing, process_alive, wait_until_gone, with_timeout};

const ARTIFACT: &str = "/srv/app/service.jar";

fn supervisor(script: &str, fs: &MockFileSystem, sink: LogSink) -> ServiceSupervisor {
    let spec = ServiceSpec {
        command: CommandSpec::new("sh").arg("-c").arg(script),
        artifact: PathBuf::from(ARTIFACT),
    };
    let timings = ServiceTimings {
        grace: Duration::from_secs(1),
        drain_grace: Duration::from_millis(300),
    };
    ServiceSupervisor::new(spec, timings, Arc::new(fs.clone()), sink)
}

fn with_artifact() -> MockFileSystem {
    let fs = MockFileSystem::new();
    fs.add_file(ARTIFACT, "jar");
    fs
}

async fn wait_until_idle(sup: &ServiceSupervisor) {
    let mut state = sup.subscribe();
    with_timeout(state.wait_for(|s| *s == ServiceState::Idle))
        .await
        .expect("state channel closed");
}

#[tokio::test]
async fn start_publishes_pid_and_streams_output() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let sup = supervisor("echo service-up; exec sleep 30", &with_artifact(), sink);

    let outcome = sup.start().expect("start");
    let StartOutcome::Started { pid } = outcome else {
        panic!("expected Started, got {outcome:?}");
    };

    assert_eq!(sup.state(), ServiceState::Running { pid });
    assert_eq!(sup.pid(), Some(pid));
    assert!(capture.wait_for_text("service-up", Duration::from_secs(5)).await);

    with_timeout(sup.stop()).await;
    assert_eq!(sup.state(), ServiceState::Idle);
}

#[tokio::test]
async fn starting_twice_spawns_one_process() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let sup = supervisor("exec sleep 30", &with_artifact(), sink);

    let first = sup.start().expect("first start");
    let second = sup.start().expect("second start");

    let StartOutcome::Started { pid } = first else {
        panic!("expected Started, got {first:?}");
    };
    assert_eq!(second, StartOutcome::AlreadyRunning { pid });
    assert_eq!(sup.pid(), Some(pid));
    assert!(capture.contains("already running"));
    assert!(capture.supervisor_errors().is_empty());

    with_timeout(sup.stop()).await;
}

#[tokio::test]
async fn stop_when_idle_is_a_no_op_twice() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let sup = supervisor("exec sleep 30", &with_artifact(), sink);

    assert_eq!(sup.stop().await, StopOutcome::NotRunning);
    assert_eq!(sup.stop().await, StopOutcome::NotRunning);
    assert_eq!(sup.state(), ServiceState::Idle);
    assert!(capture.supervisor_errors().is_empty());
}

#[tokio::test]
async fn graceful_stop_then_second_stop_is_a_no_op() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let sup = supervisor("exec sleep 30", &with_artifact(), sink);
    sup.start().expect("start");

    let started = Instant::now();
    let outcome = with_timeout(sup.stop()).await;

    assert!(matches!(outcome, StopOutcome::Graceful { .. }), "got {outcome:?}");
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(sup.state(), ServiceState::Idle);
    assert!(capture.contains("stopped successfully"));

    assert_eq!(with_timeout(sup.stop()).await, StopOutcome::NotRunning);
}

#[tokio::test]
async fn service_ignoring_terminate_is_killed_after_grace() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let sup = supervisor(
        "trap '' TERM; echo ready; while true; do sleep 1; done",
        &with_artifact(),
        sink,
    );
    sup.start().expect("start");
    // The trap must be installed before the terminate request arrives.
    assert!(capture.wait_for_text("ready", Duration::from_secs(5)).await);

    let started = Instant::now();
    let outcome = with_timeout(sup.stop()).await;

    assert_eq!(outcome, StopOutcome::Forced);
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert_eq!(sup.state(), ServiceState::Idle);
    assert!(
        capture
            .supervisor_errors()
            .iter()
            .any(|e| e.contains("did not stop within 1s"))
    );
}

#[tokio::test]
async fn missing_artifact_fails_fast_without_spawning() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let fs = MockFileSystem::new();
    let sup = supervisor("exec sleep 30", &fs, sink);

    let err = sup.start().expect_err("artifact is missing");

    assert!(matches!(err, SupervisorError::ArtifactMissing { .. }));
    assert!(matches!(sup.state(), ServiceState::Error(_)));
    assert_eq!(sup.pid(), None);
    assert!(
        capture
            .supervisor_errors()
            .iter()
            .any(|e| e.contains("has the project been built?"))
    );
}

#[tokio::test]
async fn start_is_allowed_again_after_an_error() {
    init_tracing();
    let (sink, _capture) = EventCapture::new();
    let fs = MockFileSystem::new();
    let sup = supervisor("exec sleep 30", &fs, sink);

    assert!(sup.start().is_err());
    fs.add_file(ARTIFACT, "jar");

    let outcome = sup.start().expect("start after error");
    assert!(matches!(outcome, StartOutcome::Started { .. }));

    with_timeout(sup.stop()).await;
}

#[tokio::test]
async fn unexpected_exit_returns_to_idle_with_its_code() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let sup = supervisor("echo crashing; exit 3", &with_artifact(), sink);

    sup.start().expect("start");
    wait_until_idle(&sup).await;

    assert_eq!(sup.last_exit_code(), Some(3));
    assert!(
        capture
            .supervisor_errors()
            .iter()
            .any(|e| e.contains("exited with code 3"))
    );
    assert!(capture.contains("crashing"));

    // A later stop finds nothing to stop.
    assert_eq!(with_timeout(sup.stop()).await, StopOutcome::NotRunning);
}

#[tokio::test]
async fn state_changes_are_published_to_the_display() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let sup = supervisor("exec sleep 30", &with_artifact(), sink);

    sup.start().expect("start");
    with_timeout(sup.stop()).await;

    let states: Vec<ServiceState> = capture
        .events()
        .into_iter()
        .filter_map(|e| match e {
            procvisor::display::DisplayEvent::Service(state) => Some(state),
            _ => None,
        })
        .collect();

    assert_eq!(states.first(), Some(&ServiceState::Starting));
    assert!(matches!(states.get(1), Some(ServiceState::Running { .. })));
    assert!(matches!(states.get(2), Some(ServiceState::Stopping { .. })));
    assert_eq!(states.last(), Some(&ServiceState::Idle));
}

#[tokio::test]
async fn dropping_the_supervisor_kills_the_service() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let sup = supervisor("exec sleep 30", &with_artifact(), sink);

    let StartOutcome::Started { pid } = sup.start().expect("start") else {
        panic!("expected a fresh start");
    };
    assert!(process_alive(pid));

    drop(sup);

    assert!(
        wait_until_gone(pid, Duration::from_secs(3)).await,
        "service pid {pid} outlived its supervisor"
    );
    // drain grace, then the monitor publishes Idle
    tokio::time::sleep(Duration::from_millis(600)).await;
    let last_state = capture.events().into_iter().rev().find_map(|e| match e {
        procvisor::display::DisplayEvent::Service(state) => Some(state),
        _ => None,
    });
    assert_eq!(last_state, Some(ServiceState::Idle));
}
