//! # Acquisition Orchestrator
//!
//! Top-level driver of one acquisition run:
//!
//! ```text
//! load_tasks -> run_start_tasks -> run_stop_tasks -> start_post_acquisition -> unload_tasks
//! ```
//!
//! Phase order is enforced by [`AcquisitionStateMachine`]. Each phase resolves
//! its task names against the run's [`TaskHandler`], starts (or stops) the live
//! tasks and waits on the lifecycle bus until every resolved task has confirmed
//! the phase target. Completion of a phase is published exactly once per run,
//! guarded by a [`PhaseLatch`]. A phase with no resolvable task completes at
//! once.

use super::latch::PhaseLatch;
use super::post_acquisition::{PostAcquisition, PostAcquisitionReport};
use crate::constants::{tasks, PROGRESS_MAX};
use crate::error::Result;
use crate::events::{EventPublisher, PhaseEvent, TaskLifecycleEvent};
use crate::logging::{
    close_acquisition_log, log_error, log_phase_operation, redirect_to_acquisition_directory,
};
use crate::options::AcquisitionOptions;
use crate::registry::TaskManager;
use crate::state_machine::{AcquisitionEvent, AcquisitionState, AcquisitionStateMachine, TaskState};
use crate::task::{Task, TaskHandler, TaskSinks};
use crate::time_source::formatted_now;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};

/// The two fan-in phases of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Start,
    Stop,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }

    /// State every task of the phase must confirm
    pub fn target_state(&self) -> TaskState {
        match self {
            Self::Start => TaskState::Started,
            Self::Stop => TaskState::Completed,
        }
    }

    fn completion_event(&self) -> PhaseEvent {
        match self {
            Self::Start => PhaseEvent::StartTasksFinished,
            Self::Stop => PhaseEvent::StopTasksFinished,
        }
    }
}

pub struct Acquisition {
    options: Arc<AcquisitionOptions>,
    start_tasks: Vec<String>,
    stop_tasks: Vec<String>,
    post_tasks: Vec<String>,
    manager: Arc<TaskManager>,
    sinks: TaskSinks,
    events: EventPublisher<PhaseEvent>,
    machine: Mutex<AcquisitionStateMachine>,
    start_latch: PhaseLatch,
    stop_latch: PhaseLatch,
    post_acquisition: PostAcquisition,
}

impl std::fmt::Debug for Acquisition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquisition")
            .field("state", &self.state())
            .field("start_tasks", &self.start_tasks)
            .field("stop_tasks", &self.stop_tasks)
            .finish()
    }
}

impl Acquisition {
    pub fn new(manager: Arc<TaskManager>, options: AcquisitionOptions, sinks: TaskSinks) -> Self {
        let events = EventPublisher::new(manager.dependencies().config.execution.event_channel_capacity);
        Self {
            options: Arc::new(options),
            start_tasks: Vec::new(),
            stop_tasks: Vec::new(),
            post_tasks: tasks::POST_ACQUISITION.iter().map(|s| s.to_string()).collect(),
            manager,
            sinks,
            post_acquisition: PostAcquisition::new(events.clone()),
            events,
            machine: Mutex::new(AcquisitionStateMachine::new()),
            start_latch: PhaseLatch::new(),
            stop_latch: PhaseLatch::new(),
        }
    }

    pub fn with_start_tasks<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.start_tasks = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_stop_tasks<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.stop_tasks = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn options(&self) -> Arc<AcquisitionOptions> {
        Arc::clone(&self.options)
    }

    pub fn state(&self) -> AcquisitionState {
        self.machine.lock().current_state()
    }

    pub fn start_tasks(&self) -> &[String] {
        &self.start_tasks
    }

    pub fn stop_tasks(&self) -> &[String] {
        &self.stop_tasks
    }

    pub fn post_tasks(&self) -> &[String] {
        &self.post_tasks
    }

    pub fn manager(&self) -> &Arc<TaskManager> {
        &self.manager
    }

    pub fn handler(&self) -> &Arc<TaskHandler> {
        self.manager.handler()
    }

    pub fn subscribe_phase_events(&self) -> broadcast::Receiver<PhaseEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_task_events(&self) -> broadcast::Receiver<TaskLifecycleEvent> {
        self.handler().subscribe()
    }

    /// Point logging at the acquisition directory and instantiate the union of
    /// start, stop and post tasks. Leftovers from a previous run are discarded
    /// and the phase machine is rewound.
    pub fn load_tasks(&self) -> Result<usize> {
        redirect_to_acquisition_directory(&self.options.acquisition_directory)?;

        if !self.manager.is_loaded() {
            self.manager.load_all_task_modules()?;
        }

        let leftovers = self.manager.clear_tasks();
        if !leftovers.is_empty() {
            warn!(count = leftovers.len(), "Discarding tasks left over from a previous run");
            leftovers.iter().for_each(|task| task.abort());
        }

        let mut requested: Vec<String> = Vec::new();
        for name in self
            .start_tasks
            .iter()
            .chain(&self.stop_tasks)
            .chain(&self.post_tasks)
        {
            if !requested.contains(name) {
                requested.push(name.clone());
            }
        }

        let loaded = self.manager.init_tasks(&requested, &self.sinks).len();

        self.machine.lock().transition(AcquisitionEvent::Reset)?;
        self.start_latch.reset();
        self.stop_latch.reset();
        self.post_acquisition.reset();

        log_phase_operation("load", loaded, "ready", None);
        Ok(loaded)
    }

    /// Dispose of every live task and release the acquisition log.
    ///
    /// Idempotent; a second call finds nothing to dispose of.
    pub async fn unload_tasks(&self) {
        let tasks = self.manager.clear_tasks();
        let timeout = Duration::from_secs(self.manager.dependencies().config.execution.teardown_timeout_secs);
        join_all(tasks.iter().map(|task| task.shutdown(timeout))).await;
        if !tasks.is_empty() {
            log_phase_operation("unload", tasks.len(), "disposed", None);
        }
        close_acquisition_log();
    }

    /// Start every start task and wait until all of them confirm `STARTED`
    pub async fn run_start_tasks(&self) -> Result<()> {
        self.machine.lock().transition(AcquisitionEvent::RunStartTasks)?;
        self.run_phase(Phase::Start).await;
        Ok(())
    }

    /// Stop infinite-loop tasks, start the others, and wait until all are `COMPLETED`
    pub async fn run_stop_tasks(&self) -> Result<()> {
        self.machine.lock().transition(AcquisitionEvent::RunStopTasks)?;
        self.run_phase(Phase::Stop).await;
        Ok(())
    }

    /// Run the post-acquisition chain, then fill the progress meter
    pub async fn start_post_acquisition(&self) -> Result<PostAcquisitionReport> {
        self.machine.lock().transition(AcquisitionEvent::StartPostAcquisition)?;
        let increment = self.calculate_increment();
        let report = self
            .post_acquisition
            .run(
                self.handler(),
                self.manager.class_names(),
                increment,
                self.options(),
            )
            .await;
        self.set_completed_progress();
        Ok(report)
    }

    /// `100 / registered task count`, or 0 when no task is registered
    pub fn calculate_increment(&self) -> f64 {
        match self.handler().len() {
            0 => 0.0,
            count => PROGRESS_MAX / count as f64,
        }
    }

    pub fn set_completed_progress(&self) {
        self.sinks.progress.set(PROGRESS_MAX);
    }

    /// Apply one lifecycle event to `phase`; returns true once the phase is complete
    pub fn handle_task_event(&self, phase: Phase, event: &TaskLifecycleEvent) -> bool {
        match event {
            TaskLifecycleEvent::Started { .. } | TaskLifecycleEvent::Finished { .. } => {
                self.check_phase(phase)
            }
            TaskLifecycleEvent::SubTaskUpdated { .. } => self.latch(phase).is_fired(),
        }
    }

    pub fn is_phase_complete(&self, phase: Phase) -> bool {
        self.latch(phase).is_fired()
    }

    pub async fn log_start_message(&self) -> String {
        self.log_phase_time("start", "ACQUISITION_STARTED").await
    }

    pub async fn log_stop_message(&self) -> String {
        self.log_phase_time("stop", "ACQUISITION_STOPPED").await
    }

    pub async fn log_end_message(&self) -> String {
        self.log_phase_time("end", "ACQUISITION_FINISHED").await
    }

    async fn log_phase_time(&self, moment: &str, message_key: &str) -> String {
        let deps = self.manager.dependencies();
        let time = formatted_now(deps.time_source.as_ref()).await;
        let line = deps
            .translations
            .format("NTP_ACQUISITION_TIME", &[&moment, &time]);
        info!(time_source = %deps.time_source.describe(), "{}", line);
        self.sinks.status.set_text(&deps.translations.get(message_key));
        time
    }

    fn latch(&self, phase: Phase) -> &PhaseLatch {
        match phase {
            Phase::Start => &self.start_latch,
            Phase::Stop => &self.stop_latch,
        }
    }

    fn phase_names(&self, phase: Phase) -> Vec<String> {
        let names = match phase {
            Phase::Start => &self.start_tasks,
            Phase::Stop => &self.stop_tasks,
        };
        self.manager.class_names().resolve_all(names)
    }

    fn check_phase(&self, phase: Phase) -> bool {
        if self.latch(phase).is_fired() {
            return true;
        }
        if self
            .handler()
            .have_tasks_reached(&self.phase_names(phase), phase.target_state())
        {
            self.complete_phase(phase, None);
            return true;
        }
        false
    }

    fn complete_phase(&self, phase: Phase, details: Option<&str>) {
        if self.latch(phase).fire() {
            let count = self.handler().resolve(&self.phase_names(phase)).len();
            log_phase_operation(phase.as_str(), count, "finished", details);
            self.events.publish(phase.completion_event());
        }
    }

    async fn run_phase(&self, phase: Phase) {
        let tasks = self.handler().resolve(&self.phase_names(phase));
        if tasks.is_empty() {
            info!(phase = phase.as_str(), "No tasks to run - phase complete");
            self.complete_phase(phase, Some("no tasks"));
            return;
        }

        // subscribe before the first start so no confirmation is missed
        let mut events = self.handler().subscribe();
        let increment = self.calculate_increment();
        log_phase_operation(phase.as_str(), tasks.len(), "started", None);

        for task in &tasks {
            task.set_options(self.options());
            task.set_increment(increment);
            self.launch(phase, task);
        }

        loop {
            if self.check_phase(phase) {
                break;
            }
            match events.recv().await {
                Ok(event) => {
                    if self.handle_task_event(phase, &event) {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Lifecycle receiver lagged - re-checking phase");
                }
                Err(RecvError::Closed) => {
                    warn!(phase = phase.as_str(), "Lifecycle bus closed before phase completion");
                    break;
                }
            }
        }
    }

    fn launch(&self, phase: Phase, task: &Arc<Task>) {
        let result = match phase {
            Phase::Start => task.start(),
            Phase::Stop if task.is_infinite_loop() => task.stop(),
            Phase::Stop => task.start(),
        };

        if let Err(e) = result {
            log_error(task.name(), phase.as_str(), &e.to_string(), None);
            // a task that cannot launch must still converge
            if task.state() == TaskState::Initialized {
                if let Err(e) = task.stop_task("") {
                    warn!(task = %task.name(), error = %e, "Unable to close task after failed launch");
                }
            }
        }
    }
}

impl Drop for Acquisition {
    fn drop(&mut self) {
        for task in self.manager.clear_tasks() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AcquisitionConfig;
    use crate::events::{ProgressMeter, ProgressSink, StatusLine};
    use crate::options::AcquisitionType;
    use crate::registry::TaskDependencies;
    use crate::time_source::SystemTimeSource;

    fn acquisition(dir: &std::path::Path) -> Acquisition {
        let mut config = AcquisitionConfig::default();
        config.execution.worker_grace_period_ms = 10;
        let deps = TaskDependencies::new(config).with_time_source(Arc::new(SystemTimeSource));
        let manager = Arc::new(TaskManager::with_builtin_tasks(deps));
        Acquisition::new(
            manager,
            AcquisitionOptions::new(dir, AcquisitionType::Web),
            TaskSinks::new(Arc::new(ProgressMeter::new()), Arc::new(StatusLine::new())),
        )
    }

    #[tokio::test]
    async fn test_zero_start_tasks_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let acq = acquisition(dir.path());
        acq.load_tasks().unwrap();
        let mut rx = acq.subscribe_phase_events();

        acq.run_start_tasks().await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), PhaseEvent::StartTasksFinished);
        assert!(acq.is_phase_complete(Phase::Start));
        assert_eq!(acq.state(), AcquisitionState::Started);
        acq.unload_tasks().await;
    }

    #[tokio::test]
    async fn test_phase_order_is_enforced() {
        let dir = tempfile::tempdir().unwrap();
        let acq = acquisition(dir.path());
        acq.load_tasks().unwrap();

        assert!(acq.run_stop_tasks().await.is_err());
        assert!(acq.start_post_acquisition().await.is_err());
        acq.unload_tasks().await;
    }

    #[tokio::test]
    async fn test_increment_covers_registered_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let acq = acquisition(dir.path());
        assert_eq!(acq.calculate_increment(), 0.0);

        // PEC is disabled by default, so five post tasks are registered
        let loaded = acq.load_tasks().unwrap();
        assert_eq!(loaded, 5);
        assert!((acq.calculate_increment() * loaded as f64 - 100.0).abs() < 1e-9);

        acq.unload_tasks().await;
        assert_eq!(acq.calculate_increment(), 0.0);
        // second unload is a no-op
        acq.unload_tasks().await;
    }

    #[tokio::test]
    async fn test_log_messages_return_formatted_time() {
        let dir = tempfile::tempdir().unwrap();
        let acq = acquisition(dir.path());
        let time = acq.log_start_message().await;
        assert_eq!(time.len(), "2024-01-01 00:00:00".len());
        acq.set_completed_progress();
        assert_eq!(acq.sinks.progress.value(), 100.0);
    }
}
