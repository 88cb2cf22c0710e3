use std::time::Duration;

use procvisor::display::DisplayEvent;
use procvisor::scheduler::{TaskGate, TaskReport};
use procvisor::types::{FailureKind, TaskOutcome};
use tokio::sync::oneshot;

mod common;
use common::{EventCapture, init_tracing, with_timeout};

#[tokio::test]
async fn controls_are_disabled_before_the_task_runs_and_enabled_once_after() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let gate = TaskGate::new(sink.clone());

    let ticket = gate
        .submit("build", async move {
            sink.info("task output");
            anyhow::Ok(TaskOutcome::success(0))
        })
        .expect("gate is free");

    let report = with_timeout(ticket.wait()).await;
    assert_eq!(report, TaskReport::Completed(TaskOutcome::success(0)));
    assert!(report.succeeded());

    let events = capture.events();
    let disabled = events
        .iter()
        .position(|e| *e == DisplayEvent::Controls { enabled: false })
        .expect("controls disabled");
    let output = events
        .iter()
        .position(|e| matches!(e, DisplayEvent::Line(l) if l.text == "task output"))
        .expect("task output");
    assert!(disabled < output);
    assert_eq!(capture.controls(), vec![false, true]);
    assert!(capture.texts()[0].contains("Starting task: build"));
}

#[tokio::test]
async fn a_second_task_is_refused_while_one_is_in_flight() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let gate = TaskGate::new(sink);
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let ticket = gate
        .submit("slow", async move {
            let _ = release_rx.await;
            anyhow::Ok(TaskOutcome::success(0))
        })
        .expect("gate is free");

    assert!(gate.is_busy());
    assert_eq!(gate.running().as_deref(), Some("slow"));

    let busy = gate
        .submit("other", async { anyhow::Ok(TaskOutcome::success(0)) })
        .expect_err("gate is busy");
    assert_eq!(busy.running, "slow");

    release_tx.send(()).expect("task waiting");
    with_timeout(ticket.wait()).await;

    assert!(!gate.is_busy());
    assert_eq!(capture.controls(), vec![false, true]);

    // Free again once the first task is done.
    let again = gate
        .submit("other", async { anyhow::Ok(TaskOutcome::success(0)) })
        .expect("gate is free again");
    with_timeout(again.wait()).await;
}

#[tokio::test]
async fn failed_outcome_is_reported_as_completed() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let gate = TaskGate::new(sink);
    let failed = TaskOutcome::failed(FailureKind::NonZeroExit, Some(2));

    let ticket = gate
        .submit("analyze", async move { anyhow::Ok(failed) })
        .expect("gate is free");
    let report = with_timeout(ticket.wait()).await;

    assert_eq!(report, TaskReport::Completed(failed));
    assert!(!report.succeeded());
    assert_eq!(capture.controls(), vec![false, true]);
}

#[tokio::test]
async fn an_error_is_caught_and_logged_as_an_unexpected_fault() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let gate = TaskGate::new(sink);

    let ticket = gate
        .submit("process", async { Err::<TaskOutcome, _>(anyhow::anyhow!("disk on fire")) })
        .expect("gate is free");
    let report = with_timeout(ticket.wait()).await;

    assert!(matches!(report, TaskReport::Faulted(ref msg) if msg.contains("disk on fire")));
    assert!(
        capture
            .supervisor_errors()
            .iter()
            .any(|e| e.contains("Unexpected fault in task 'process'") && e.contains("disk on fire"))
    );
    assert_eq!(capture.controls(), vec![false, true]);
    assert!(!gate.is_busy());
}

#[tokio::test]
async fn a_panic_is_caught_and_the_gate_recovers() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let gate = TaskGate::new(sink);

    let ticket = gate
        .submit("specialist:qa", async {
            if true {
                panic!("worker blew up");
            }
            anyhow::Ok(TaskOutcome::success(0))
        })
        .expect("gate is free");
    let report = with_timeout(ticket.wait()).await;

    assert!(matches!(report, TaskReport::Faulted(ref msg) if msg.contains("worker blew up")));
    assert!(capture.contains("worker blew up"));
    assert_eq!(capture.controls(), vec![false, true]);

    let next = gate
        .submit("build", async { anyhow::Ok(TaskOutcome::success(0)) })
        .expect("gate is free after a panic");
    assert!(with_timeout(next.wait()).await.succeeded());
}

#[tokio::test]
async fn display_keeps_receiving_while_a_task_runs() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let gate = TaskGate::new(sink.clone());
    let (release_tx, release_rx) = oneshot::channel::<()>();

    let ticket = gate
        .submit("slow", async move {
            sink.info("progress 1");
            let _ = release_rx.await;
            anyhow::Ok(TaskOutcome::success(0))
        })
        .expect("gate is free");

    assert!(capture.wait_for_text("progress 1", Duration::from_secs(2)).await);
    assert_eq!(capture.controls(), vec![false]);

    release_tx.send(()).expect("task waiting");
    with_timeout(ticket.wait()).await;
    assert_eq!(capture.controls(), vec![false, true]);
}

#[tokio::test]
async fn cancel_drops_the_running_task_and_frees_the_gate() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let gate = TaskGate::new(sink);
    let (started_tx, started_rx) = oneshot::channel::<()>();
    let (dropped_tx, dropped_rx) = oneshot::channel::<()>();

    struct Guard(Option<oneshot::Sender<()>>);
    impl Drop for Guard {
        fn drop(&mut self) {
            if let Some(tx) = self.0.take() {
                let _ = tx.send(());
            }
        }
    }

    let ticket = gate
        .submit("process", async move {
            let _guard = Guard(Some(dropped_tx));
            let _ = started_tx.send(());
            tokio::time::sleep(Duration::from_secs(30)).await;
            anyhow::Ok(TaskOutcome::success(0))
        })
        .expect("gate is free");
    with_timeout(started_rx).await.expect("task body started");

    let cancelled = with_timeout(gate.cancel()).await;

    assert_eq!(cancelled.as_deref(), Some("process"));
    assert!(!gate.is_busy());
    with_timeout(dropped_rx).await.expect("task body was dropped");
    assert_eq!(with_timeout(ticket.wait()).await, TaskReport::Cancelled);
    assert_eq!(capture.controls(), vec![false, true]);
    assert!(capture.contains("Task 'process' was cancelled."));
}

#[tokio::test]
async fn cancel_with_nothing_running_returns_immediately() {
    init_tracing();
    let (sink, mut capture) = EventCapture::new();
    let gate = TaskGate::new(sink);

    assert_eq!(with_timeout(gate.cancel()).await, None);
    assert!(capture.controls().is_empty());
}
