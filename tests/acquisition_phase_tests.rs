mod common;

use common::*;
use evidence_acquisition::events::{PhaseEvent, ProgressSink};
use evidence_acquisition::orchestration::Phase;
use evidence_acquisition::state_machine::{AcquisitionState, TaskState, TaskStatus};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(10);

fn drain(rx: &mut broadcast::Receiver<PhaseEvent>) -> Vec<PhaseEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn capture_tasks() -> Vec<ScriptedTask> {
    vec![
        ScriptedTask::infinite("CAPTURE", "TaskCapture"),
        ScriptedTask::infinite_with(
            "RECORDER",
            "TaskRecorder",
            Script::StartAfter {
                delay: Duration::from_millis(200),
            },
        ),
        ScriptedTask::new(
            "LOOKUP",
            "TaskLookup",
            Script::Succeed {
                delay: Duration::from_millis(50),
            },
        ),
    ]
}

#[tokio::test]
async fn test_start_phase_waits_for_every_task() {
    let dir = tempfile::tempdir().unwrap();
    let trace = CallTrace::new();
    let sinks = TestSinks::new();
    let acquisition = scripted_acquisition(
        capture_tasks(),
        &["CAPTURE", "RECORDER"],
        &["CAPTURE", "RECORDER", "LOOKUP"],
        dir.path(),
        &trace,
        &sinks,
    );
    let mut phases = acquisition.subscribe_phase_events();

    assert_eq!(acquisition.load_tasks().unwrap(), 3);
    let started = Instant::now();
    timeout(WAIT, acquisition.run_start_tasks()).await.unwrap().unwrap();

    assert!(started.elapsed() >= Duration::from_millis(200));
    let handler = acquisition.handler();
    for name in ["TaskCapture", "TaskRecorder"] {
        assert!(handler.get_task(name).unwrap().has_confirmed(TaskState::Started));
    }
    assert_eq!(handler.get_task("TaskLookup").unwrap().state(), TaskState::Initialized);
    assert!(acquisition.is_phase_complete(Phase::Start));
    assert!(!acquisition.is_phase_complete(Phase::Stop));
    assert_eq!(drain(&mut phases), vec![PhaseEvent::StartTasksFinished]);
    assert_eq!(acquisition.state(), AcquisitionState::Started);

    acquisition.unload_tasks().await;
}

#[tokio::test]
async fn test_stop_phase_stops_loops_and_runs_finite_tasks() {
    let dir = tempfile::tempdir().unwrap();
    let trace = CallTrace::new();
    let sinks = TestSinks::new();
    let acquisition = scripted_acquisition(
        capture_tasks(),
        &["CAPTURE", "RECORDER"],
        &["CAPTURE", "RECORDER", "LOOKUP"],
        dir.path(),
        &trace,
        &sinks,
    );
    let mut phases = acquisition.subscribe_phase_events();

    acquisition.load_tasks().unwrap();
    timeout(WAIT, acquisition.run_start_tasks()).await.unwrap().unwrap();
    timeout(WAIT, acquisition.run_stop_tasks()).await.unwrap().unwrap();

    let handler = acquisition.handler();
    for task in handler.get_tasks() {
        assert_eq!(task.state(), TaskState::Completed, "{}", task.name());
        assert_eq!(task.status(), TaskStatus::Success, "{}", task.name());
    }
    assert!(trace.calls().contains(&"end:LOOKUP".to_string()));
    assert_eq!(
        drain(&mut phases),
        vec![PhaseEvent::StartTasksFinished, PhaseEvent::StopTasksFinished]
    );
    assert_eq!(sinks.progress.value(), 100.0);

    acquisition.unload_tasks().await;
    assert!(acquisition.handler().is_empty());
}

#[tokio::test]
async fn test_failed_task_still_completes_the_phase() {
    let dir = tempfile::tempdir().unwrap();
    let trace = CallTrace::new();
    let sinks = TestSinks::new();
    let acquisition = scripted_acquisition(
        vec![
            ScriptedTask::infinite("CAPTURE", "TaskCapture"),
            ScriptedTask::new(
                "PROBE",
                "TaskProbe",
                Script::Fail {
                    delay: Duration::from_millis(20),
                    details: "host unreachable".into(),
                },
            ),
            ScriptedTask::new(
                "EARLY",
                "TaskEarly",
                Script::FailBeforeStart {
                    details: "missing tool".into(),
                },
            ),
        ],
        &["CAPTURE", "EARLY"],
        &["CAPTURE", "PROBE"],
        dir.path(),
        &trace,
        &sinks,
    );

    acquisition.load_tasks().unwrap();
    timeout(WAIT, acquisition.run_start_tasks()).await.unwrap().unwrap();
    let early = acquisition.handler().get_task("TaskEarly").unwrap();
    assert_eq!((early.state(), early.status()), (TaskState::Completed, TaskStatus::Failure));

    timeout(WAIT, acquisition.run_stop_tasks()).await.unwrap().unwrap();
    let probe = acquisition.handler().get_task("TaskProbe").unwrap();
    assert_eq!(probe.status(), TaskStatus::Failure);
    assert_eq!(probe.details(), "host unreachable");
    assert!(acquisition.is_phase_complete(Phase::Stop));

    acquisition.unload_tasks().await;
}

#[tokio::test]
async fn test_phase_without_resolvable_tasks_completes_at_once() {
    let dir = tempfile::tempdir().unwrap();
    let trace = CallTrace::new();
    let sinks = TestSinks::new();
    let acquisition = scripted_acquisition(
        vec![ScriptedTask::infinite("CAPTURE", "TaskCapture")],
        &["NOT_INSTALLED"],
        &[],
        dir.path(),
        &trace,
        &sinks,
    );
    let mut phases = acquisition.subscribe_phase_events();

    assert_eq!(acquisition.load_tasks().unwrap(), 0);
    assert_eq!(acquisition.calculate_increment(), 0.0);
    timeout(WAIT, acquisition.run_start_tasks()).await.unwrap().unwrap();
    timeout(WAIT, acquisition.run_stop_tasks()).await.unwrap().unwrap();

    assert_eq!(
        drain(&mut phases),
        vec![PhaseEvent::StartTasksFinished, PhaseEvent::StopTasksFinished]
    );
    assert!(trace.calls().is_empty());
}

#[tokio::test]
async fn test_unknown_names_are_ignored_by_fan_in() {
    let dir = tempfile::tempdir().unwrap();
    let trace = CallTrace::new();
    let sinks = TestSinks::new();
    let acquisition = scripted_acquisition(
        vec![ScriptedTask::infinite("CAPTURE", "TaskCapture")],
        &["CAPTURE", "NOT_INSTALLED"],
        &["CAPTURE"],
        dir.path(),
        &trace,
        &sinks,
    );

    acquisition.load_tasks().unwrap();
    timeout(WAIT, acquisition.run_start_tasks()).await.unwrap().unwrap();
    assert!(acquisition.is_phase_complete(Phase::Start));
    acquisition.unload_tasks().await;
}

#[tokio::test]
async fn test_completion_is_signalled_once_per_phase() {
    let dir = tempfile::tempdir().unwrap();
    let trace = CallTrace::new();
    let sinks = TestSinks::new();
    let acquisition = scripted_acquisition(
        vec![ScriptedTask::infinite("CAPTURE", "TaskCapture")],
        &["CAPTURE"],
        &["CAPTURE"],
        dir.path(),
        &trace,
        &sinks,
    );
    let mut phases = acquisition.subscribe_phase_events();

    acquisition.load_tasks().unwrap();
    timeout(WAIT, acquisition.run_start_tasks()).await.unwrap().unwrap();

    // late confirmations after the latch fired are absorbed
    let late = evidence_acquisition::events::TaskLifecycleEvent::Started {
        task: "TaskCapture".into(),
        details: None,
    };
    assert!(acquisition.handle_task_event(Phase::Start, &late));
    assert!(acquisition.handle_task_event(Phase::Start, &late));
    assert_eq!(drain(&mut phases), vec![PhaseEvent::StartTasksFinished]);

    acquisition.unload_tasks().await;
}

#[tokio::test]
async fn test_phases_run_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let trace = CallTrace::new();
    let sinks = TestSinks::new();
    let acquisition = scripted_acquisition(
        vec![ScriptedTask::infinite("CAPTURE", "TaskCapture")],
        &["CAPTURE"],
        &["CAPTURE"],
        dir.path(),
        &trace,
        &sinks,
    );

    acquisition.load_tasks().unwrap();
    assert!(acquisition.run_stop_tasks().await.is_err());
    assert!(acquisition.start_post_acquisition().await.is_err());
    assert_eq!(acquisition.state(), AcquisitionState::Unstarted);

    timeout(WAIT, acquisition.run_start_tasks()).await.unwrap().unwrap();
    assert!(acquisition.run_start_tasks().await.is_err());
    acquisition.unload_tasks().await;
}

#[tokio::test]
async fn test_reload_rewinds_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let trace = CallTrace::new();
    let sinks = TestSinks::new();
    let acquisition = scripted_acquisition(
        vec![ScriptedTask::infinite("CAPTURE", "TaskCapture")],
        &["CAPTURE"],
        &["CAPTURE"],
        dir.path(),
        &trace,
        &sinks,
    );

    acquisition.load_tasks().unwrap();
    timeout(WAIT, acquisition.run_start_tasks()).await.unwrap().unwrap();
    assert_eq!(acquisition.handler().len(), 1);

    // the live task from the first run is discarded, not duplicated
    assert_eq!(acquisition.load_tasks().unwrap(), 1);
    assert_eq!(acquisition.handler().len(), 1);
    assert_eq!(acquisition.state(), AcquisitionState::Unstarted);
    assert!(!acquisition.is_phase_complete(Phase::Start));
    assert_eq!(
        acquisition.handler().get_task("TaskCapture").unwrap().state(),
        TaskState::Initialized
    );

    acquisition.unload_tasks().await;
    acquisition.unload_tasks().await;
}

#[tokio::test]
async fn test_phase_messages_use_the_time_source() {
    let dir = tempfile::tempdir().unwrap();
    let trace = CallTrace::new();
    let sinks = TestSinks::new();
    let acquisition = scripted_acquisition(vec![], &[], &[], dir.path(), &trace, &sinks);

    let time = acquisition.log_start_message().await;
    assert!(!time.is_empty());
    assert_eq!(sinks.status.current(), "Acquisition started");
}

#[tokio::test]
async fn test_disabled_task_is_excluded_without_blocking_the_phase() {
    use evidence_acquisition::orchestration::Acquisition;
    use evidence_acquisition::registry::TaskManager;
    use std::sync::Arc;

    let dir = tempfile::tempdir().unwrap();
    let sinks = TestSinks::new();
    let mut config = test_config();
    config.packet_capture.enabled = false;
    let manager = Arc::new(TaskManager::with_builtin_tasks(test_dependencies(config)));
    let acquisition = Acquisition::new(manager, web_options(dir.path()), sinks.task_sinks())
        .with_start_tasks(["PACKETCAPTURE"])
        .with_stop_tasks(["PACKETCAPTURE"]);
    let mut phases = acquisition.subscribe_phase_events();

    acquisition.load_tasks().unwrap();
    assert!(acquisition.manager().get_task("PACKETCAPTURE").is_none());

    timeout(WAIT, acquisition.run_start_tasks()).await.unwrap().unwrap();
    timeout(WAIT, acquisition.run_stop_tasks()).await.unwrap().unwrap();
    assert_eq!(
        drain(&mut phases),
        vec![PhaseEvent::StartTasksFinished, PhaseEvent::StopTasksFinished]
    );

    acquisition.unload_tasks().await;
}

#[tokio::test]
async fn test_unvalidated_zero_channel_capacity_still_runs() {
    use evidence_acquisition::orchestration::Acquisition;
    use evidence_acquisition::registry::TaskManager;
    use std::sync::Arc;

    let dir = tempfile::tempdir().unwrap();
    let sinks = TestSinks::new();
    let mut config = test_config();
    config.execution.event_channel_capacity = 0;
    let manager = Arc::new(TaskManager::with_builtin_tasks(test_dependencies(config)));
    let acquisition = Acquisition::new(manager, web_options(dir.path()), sinks.task_sinks());
    let mut phases = acquisition.subscribe_phase_events();

    acquisition.load_tasks().unwrap();
    timeout(WAIT, acquisition.run_start_tasks()).await.unwrap().unwrap();
    assert_eq!(drain(&mut phases), vec![PhaseEvent::StartTasksFinished]);

    acquisition.unload_tasks().await;
}
