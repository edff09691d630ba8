//! # Task Lifecycle
//!
//! A [`Task`] wraps one [`TaskWorker`] and turns the worker's signals into
//! lifecycle transitions:
//!
//! - worker started: `STARTED/SUCCESS`, progress advances by `increment`,
//!   `Started` is re-emitted on the run bus
//! - worker finished: `COMPLETED/<status>`, completion message logged,
//!   progress advances by `increment`, `Finished` re-emitted, then after the
//!   grace period the worker is joined
//! - worker error: same as finished with `FAILURE` and the failure details
//!
//! Worker failures never escape this boundary. A stalled worker (no start
//! confirmation, no finish after a stop request, or an operation running past
//! its deadline) is aborted and recorded as a synthetic `FAILURE`, and a worker
//! that panics is recorded the same way. Catching a panic needs the unwinding
//! panic strategy: a binary built with `panic = "abort"` loses the whole run
//! on the first panicking worker.

pub mod handler;
pub mod worker;

pub use handler::TaskHandler;
pub use worker::{TaskWorker, WorkerContext, WorkerEvent, WorkerFailure, WorkerOutcome};

use crate::config::ExecutionConfig;
use crate::error::{AcquisitionError, Result};
use crate::events::{EventPublisher, ProgressSink, StatusSink, TaskLifecycleEvent};
use crate::i18n::Translations;
use crate::logging::{log_error, log_task_operation};
use crate::options::AcquisitionOptions;
use crate::state_machine::{
    StateMachineError, TaskEvent, TaskState, TaskStateMachine, TaskStatus, TaskTransition,
};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Static description of a task kind: identity, label and message keys
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskProfile {
    pub class_name: String,
    pub label_key: String,
    pub is_infinite_loop: bool,
    pub start_message_key: String,
    pub stop_message_key: Option<String>,
    /// Template with one `{}` for the final status
    pub completed_message_key: String,
    pub sub_task_keys: Vec<String>,
}

impl TaskProfile {
    pub fn new(class_name: impl Into<String>, label_key: impl Into<String>) -> Self {
        let label_key = label_key.into();
        Self {
            class_name: class_name.into(),
            start_message_key: format!("{label_key}_STARTED"),
            completed_message_key: format!("{label_key}_COMPLETED"),
            label_key,
            is_infinite_loop: false,
            stop_message_key: None,
            sub_task_keys: Vec::new(),
        }
    }

    pub fn infinite_loop(mut self, stop_message_key: impl Into<String>) -> Self {
        self.is_infinite_loop = true;
        self.stop_message_key = Some(stop_message_key.into());
        self
    }

    pub fn messages(mut self, start_key: impl Into<String>, completed_key: impl Into<String>) -> Self {
        self.start_message_key = start_key.into();
        self.completed_message_key = completed_key.into();
        self
    }

    pub fn sub_tasks<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sub_task_keys = keys.into_iter().map(Into::into).collect();
        self
    }
}

/// Progress record of one step of a composite task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubTaskRecord {
    pub label: String,
    pub state: TaskState,
    pub status: TaskStatus,
}

/// Everything a view needs to render a task
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSnapshot {
    pub name: String,
    pub label: String,
    pub state: TaskState,
    pub status: TaskStatus,
    pub details: String,
    pub is_infinite_loop: bool,
    pub increment: f64,
    pub elapsed_secs: u64,
    pub sub_tasks: Vec<SubTaskRecord>,
}

/// Collaborators a task writes to
#[derive(Clone)]
pub struct TaskSinks {
    pub progress: Arc<dyn ProgressSink>,
    pub status: Arc<dyn StatusSink>,
}

impl TaskSinks {
    pub fn new(progress: Arc<dyn ProgressSink>, status: Arc<dyn StatusSink>) -> Self {
        Self { progress, status }
    }
}

struct TaskRecord {
    machine: TaskStateMachine,
    details: String,
    sub_tasks: Vec<SubTaskRecord>,
    started_at: Option<Instant>,
    ended_at: Option<Instant>,
}

#[derive(Default)]
struct WorkerRuntime {
    stop_tx: Option<watch::Sender<bool>>,
    deadline_tx: Option<watch::Sender<Option<Instant>>>,
    worker: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

/// One startable/stoppable unit of work within an acquisition run
pub struct Task {
    profile: TaskProfile,
    label: String,
    worker: Arc<dyn TaskWorker>,
    translations: Arc<Translations>,
    sinks: TaskSinks,
    lifecycle: EventPublisher<TaskLifecycleEvent>,
    execution: ExecutionConfig,
    record: Mutex<TaskRecord>,
    options: RwLock<Option<Arc<AcquisitionOptions>>>,
    increment: Mutex<f64>,
    runtime: Mutex<WorkerRuntime>,
    state_tx: watch::Sender<TaskState>,
    torn_down_tx: watch::Sender<bool>,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.profile.class_name)
            .field("state", &self.state())
            .field("status", &self.status())
            .finish()
    }
}

impl Task {
    /// Build a task and register it with `handler`
    pub fn new(
        profile: TaskProfile,
        worker: Arc<dyn TaskWorker>,
        translations: Arc<Translations>,
        sinks: TaskSinks,
        execution: ExecutionConfig,
        handler: &TaskHandler,
    ) -> Arc<Self> {
        let label = translations.get(&profile.label_key);
        let sub_tasks = profile
            .sub_task_keys
            .iter()
            .map(|key| SubTaskRecord {
                label: translations.get(key),
                state: TaskState::Initialized,
                status: TaskStatus::Pending,
            })
            .collect();
        let (state_tx, _) = watch::channel(TaskState::Initialized);
        let (torn_down_tx, _) = watch::channel(false);

        let task = Arc::new(Self {
            record: Mutex::new(TaskRecord {
                machine: TaskStateMachine::new(profile.class_name.clone()),
                details: String::new(),
                sub_tasks,
                started_at: None,
                ended_at: None,
            }),
            profile,
            label,
            worker,
            translations,
            sinks,
            lifecycle: handler.lifecycle().clone(),
            execution,
            options: RwLock::new(None),
            increment: Mutex::new(0.0),
            runtime: Mutex::new(WorkerRuntime::default()),
            state_tx,
            torn_down_tx,
        });

        handler.add_task(Arc::clone(&task));
        task
    }

    pub fn name(&self) -> &str {
        &self.profile.class_name
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn profile(&self) -> &TaskProfile {
        &self.profile
    }

    pub fn is_infinite_loop(&self) -> bool {
        self.profile.is_infinite_loop
    }

    pub fn state(&self) -> TaskState {
        self.record.lock().machine.current_state()
    }

    pub fn status(&self) -> TaskStatus {
        self.record.lock().machine.current_status()
    }

    pub fn details(&self) -> String {
        self.record.lock().details.clone()
    }

    pub fn sub_tasks(&self) -> Vec<SubTaskRecord> {
        self.record.lock().sub_tasks.clone()
    }

    pub fn transitions(&self) -> Vec<TaskTransition> {
        self.record.lock().machine.history().to_vec()
    }

    /// True until the task reaches `COMPLETED`
    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// True once the worker acknowledged `target` or the task moved past it.
    ///
    /// `start_task` sets `STARTED/PENDING` before the worker runs; only the
    /// worker's confirmation turns the status away from `PENDING`.
    pub fn has_confirmed(&self, target: TaskState) -> bool {
        let record = self.record.lock();
        let state = record.machine.current_state();
        state > target || (state == target && record.machine.current_status() != TaskStatus::Pending)
    }

    pub fn options(&self) -> Option<Arc<AcquisitionOptions>> {
        self.options.read().clone()
    }

    pub fn set_options(&self, options: Arc<AcquisitionOptions>) {
        *self.options.write() = Some(options);
    }

    pub fn increment(&self) -> f64 {
        *self.increment.lock()
    }

    pub fn set_increment(&self, increment: f64) {
        *self.increment.lock() = increment;
    }

    /// Time since the worker confirmed its start; frozen once the task completes
    pub fn elapsed(&self) -> Duration {
        let record = self.record.lock();
        match (record.started_at, record.ended_at) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    pub fn status_summary(&self) -> String {
        if self.is_active() {
            self.translations.format(
                "TASK_IS_EXECUTING",
                &[&self.label, &self.elapsed().as_secs()],
            )
        } else {
            self.translations.format(
                "TASK_IS_COMPLETED",
                &[&self.label, &self.status().as_str().to_uppercase()],
            )
        }
    }

    pub fn snapshot(&self) -> TaskSnapshot {
        let elapsed_secs = self.elapsed().as_secs();
        let record = self.record.lock();
        TaskSnapshot {
            name: self.profile.class_name.clone(),
            label: self.label.clone(),
            state: record.machine.current_state(),
            status: record.machine.current_status(),
            details: record.details.clone(),
            is_infinite_loop: self.profile.is_infinite_loop,
            increment: self.increment(),
            elapsed_secs,
            sub_tasks: record.sub_tasks.clone(),
        }
    }

    /// True while the worker's tokio task has not been joined
    pub fn is_worker_running(&self) -> bool {
        self.runtime
            .lock()
            .worker
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    /// Start with the profile's start message
    pub fn start(self: &Arc<Self>) -> Result<()> {
        let message = self.translations.get(&self.profile.start_message_key);
        self.start_task(&message)
    }

    /// Stop with the profile's stop message
    pub fn stop(self: &Arc<Self>) -> Result<()> {
        let message = match &self.profile.stop_message_key {
            Some(key) => self.translations.get(key),
            None => String::new(),
        };
        self.stop_task(&message)
    }

    /// Move to `STARTED/PENDING`, publish `message` and launch the worker
    pub fn start_task(self: &Arc<Self>, message: &str) -> Result<()> {
        let options = self.options().ok_or_else(|| {
            AcquisitionError::task(format!("{} started without options", self.name()))
        })?;

        {
            let mut record = self.record.lock();
            record.machine.transition(&TaskEvent::Start)?;
            record.details.clear();
        }
        self.state_tx.send_replace(TaskState::Started);
        self.torn_down_tx.send_replace(false);
        self.sinks.status.set_text(message);
        log_task_operation("start", self.name(), "pending", Some(message));

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let deadline = Instant::now() + self.initial_timeout();
        let (deadline_tx, deadline_rx) = watch::channel(Some(deadline));

        let ctx = WorkerContext::new(
            self.name().to_string(),
            options,
            Arc::clone(&self.translations),
            event_tx.clone(),
            stop_rx,
        );
        let worker = Arc::clone(&self.worker);
        let worker_handle = tokio::spawn(async move {
            let terminal = match worker.run(&ctx).await {
                Ok(outcome) => WorkerEvent::Finished {
                    status: outcome.status,
                    details: outcome.details,
                },
                Err(failure) => WorkerEvent::Error(failure),
            };
            let _ = event_tx.send(terminal);
        });

        let pump = tokio::spawn(Arc::clone(self).pump(event_rx, deadline_rx));

        let mut runtime = self.runtime.lock();
        runtime.stop_tx = Some(stop_tx);
        runtime.deadline_tx = Some(deadline_tx);
        runtime.worker = Some(worker_handle);
        runtime.pump = Some(pump);
        Ok(())
    }

    /// Move to `STOPPED/PENDING`, publish `message` and ask the worker to stop.
    ///
    /// A completed task ignores the request. A task that was never started is
    /// completed at once with `FAILURE`, so stop-phase fan-in cannot wait on it.
    pub fn stop_task(self: &Arc<Self>, message: &str) -> Result<()> {
        let state = self.state();
        match state {
            TaskState::Completed => {
                debug!(task = %self.name(), "Stop requested on completed task - ignoring");
                return Ok(());
            }
            TaskState::Initialized => {
                let details = self.translations.get("TASK_STOP_BEFORE_START");
                self.record_completion(TaskStatus::Failure, details);
                self.torn_down_tx.send_replace(true);
                return Ok(());
            }
            TaskState::Stopped => {
                debug!(task = %self.name(), "Stop already requested");
                return Ok(());
            }
            TaskState::Started => {}
        }

        // the worker may have finished between the state read and the transition
        match self.record.lock().machine.transition(&TaskEvent::Stop) {
            Ok(_) => {}
            Err(StateMachineError::AlreadyTerminal { .. }) => return Ok(()),
            Err(e) => return Err(e.into()),
        }
        self.state_tx.send_replace(TaskState::Stopped);
        self.sinks.status.set_text(message);
        log_task_operation("stop", self.name(), "pending", Some(message));

        let runtime = self.runtime.lock();
        if let Some(deadline_tx) = &runtime.deadline_tx {
            let deadline = Instant::now() + Duration::from_secs(self.execution.stop_timeout_secs);
            deadline_tx.send_replace(Some(deadline));
        }
        if let Some(stop_tx) = &runtime.stop_tx {
            stop_tx.send_replace(true);
        }
        Ok(())
    }

    /// Resolve once the task is `COMPLETED`, returning its final status and details
    pub async fn wait_until_completed(&self) -> (TaskStatus, String) {
        let mut state_rx = self.state_tx.subscribe();
        let _ = state_rx.wait_for(|state| state.is_terminal()).await;
        (self.status(), self.details())
    }

    /// Resolve once the worker has been joined after completion
    pub async fn wait_for_teardown(&self) {
        let mut rx = self.torn_down_tx.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Stop a live worker, wait up to `timeout` for it to finish, then abort what is left
    pub async fn shutdown(self: &Arc<Self>, timeout: Duration) {
        let has_runtime = self.runtime.lock().pump.is_some();
        if has_runtime && self.is_active() {
            if let Err(e) = self.stop_task("") {
                debug!(task = %self.name(), error = %e, "Stop during shutdown rejected");
            }
            if tokio::time::timeout(timeout, self.wait_for_teardown()).await.is_err() {
                warn!(task = %self.name(), "Worker did not stop in time - aborting");
            }
        }
        self.abort();
    }

    /// Abort worker and pump without waiting
    pub fn abort(&self) {
        let mut runtime = self.runtime.lock();
        if let Some(handle) = runtime.worker.take() {
            handle.abort();
        }
        if let Some(handle) = runtime.pump.take() {
            handle.abort();
        }
        runtime.stop_tx = None;
        runtime.deadline_tx = None;
    }

    fn initial_timeout(&self) -> Duration {
        if self.profile.is_infinite_loop {
            Duration::from_secs(self.execution.startup_timeout_secs)
        } else {
            Duration::from_secs(self.execution.operation_timeout_secs)
        }
    }

    async fn pump(
        self: Arc<Self>,
        mut events: mpsc::UnboundedReceiver<WorkerEvent>,
        mut deadline: watch::Receiver<Option<Instant>>,
    ) {
        let mut deadline_open = true;
        loop {
            let current = *deadline.borrow_and_update();
            let expiry = async move {
                match current {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                event = events.recv() => match event {
                    Some(WorkerEvent::Started { details }) => self.on_worker_started(details),
                    Some(WorkerEvent::SubTask { label, state, status }) => {
                        self.on_sub_task(label, state, status)
                    }
                    Some(WorkerEvent::Progress) => self.sinks.progress.advance(self.increment()),
                    Some(WorkerEvent::Message(text)) => {
                        info!(task = %self.name(), "{}", text);
                        self.sinks.status.set_text(&text);
                    }
                    Some(WorkerEvent::Finished { status, details }) => {
                        self.finish(status, details, false).await;
                        break;
                    }
                    Some(WorkerEvent::Error(failure)) => {
                        log_error(self.name(), "worker", &failure.message, Some(&failure.details));
                        self.finish(TaskStatus::Failure, failure.details, false).await;
                        break;
                    }
                    None => {
                        let details = self.translations.format("TASK_WORKER_PANICKED", &[&self.label]);
                        log_error(self.name(), "worker", &details, None);
                        self.finish(TaskStatus::Failure, details, true).await;
                        break;
                    }
                },
                changed = deadline.changed(), if deadline_open => {
                    if changed.is_err() {
                        deadline_open = false;
                    }
                }
                _ = expiry => {
                    let waited = current
                        .map(|_| self.current_timeout().as_secs())
                        .unwrap_or_default();
                    let details = self.translations.format("TASK_TIMEOUT", &[&self.label, &waited]);
                    log_error(self.name(), "timeout", &details, None);
                    self.finish(TaskStatus::Failure, details, true).await;
                    break;
                }
            }
        }
    }

    fn current_timeout(&self) -> Duration {
        match self.state() {
            TaskState::Stopped => Duration::from_secs(self.execution.stop_timeout_secs),
            _ => self.initial_timeout(),
        }
    }

    fn on_worker_started(&self, details: Option<String>) {
        {
            let mut record = self.record.lock();
            if let Err(e) = record.machine.transition(&TaskEvent::WorkerStarted) {
                debug!(task = %self.name(), error = %e, "Ignoring worker start confirmation");
                return;
            }
            record.started_at = Some(Instant::now());
            record.ended_at = None;
            record.details = details.clone().unwrap_or_default();
        }

        // infinite-loop tasks run until stopped; only the startup is bounded
        if self.profile.is_infinite_loop && self.state() == TaskState::Started {
            if let Some(deadline_tx) = &self.runtime.lock().deadline_tx {
                deadline_tx.send_replace(None);
            }
        }

        self.sinks.progress.advance(self.increment());
        log_task_operation("started", self.name(), "success", details.as_deref());
        self.lifecycle.publish(TaskLifecycleEvent::Started {
            task: self.name().to_string(),
            details,
        });
    }

    fn on_sub_task(&self, label: String, state: TaskState, status: TaskStatus) {
        let sub_task = SubTaskRecord {
            label: label.clone(),
            state,
            status,
        };
        {
            let mut record = self.record.lock();
            match record.sub_tasks.iter_mut().find(|s| s.label == label) {
                Some(existing) => *existing = sub_task.clone(),
                None => record.sub_tasks.push(sub_task.clone()),
            }
        }
        self.lifecycle.publish(TaskLifecycleEvent::SubTaskUpdated {
            task: self.name().to_string(),
            sub_task,
        });
    }

    /// Apply the terminal transition, then join the worker after the grace period
    async fn finish(&self, status: TaskStatus, details: String, abort_worker: bool) {
        self.record_completion(status, details);

        tokio::time::sleep(Duration::from_millis(self.execution.worker_grace_period_ms)).await;

        let handle = {
            let mut runtime = self.runtime.lock();
            runtime.stop_tx = None;
            runtime.deadline_tx = None;
            runtime.worker.take()
        };
        if let Some(handle) = handle {
            if abort_worker {
                handle.abort();
            }
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!(task = %self.name(), error = %e, "Worker join failed");
                }
            }
        }
        self.torn_down_tx.send_replace(true);
        debug!(task = %self.name(), "Worker torn down");
    }

    fn record_completion(&self, status: TaskStatus, details: String) {
        let status_name = status.as_str().to_uppercase();
        let message = self
            .translations
            .format(&self.profile.completed_message_key, &[&status_name]);

        {
            let mut record = self.record.lock();
            if let Err(e) = record.machine.transition(&TaskEvent::Finish(status)) {
                warn!(task = %self.name(), error = %e, "Completion rejected");
                return;
            }
            record.ended_at = Some(Instant::now());
            record.details = details.clone();
        }

        info!(task = %self.name(), status = %status, "{}", message);
        self.sinks.status.set_text(&message);
        self.sinks.progress.advance(self.increment());
        log_task_operation("finished", self.name(), status.as_str(), Some(&details));

        self.state_tx.send_replace(TaskState::Completed);
        self.lifecycle.publish(TaskLifecycleEvent::Finished {
            task: self.name().to_string(),
            status,
            details,
        });
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        let runtime = self.runtime.get_mut();
        if let Some(handle) = runtime.worker.take() {
            handle.abort();
        }
        if let Some(handle) = runtime.pump.take() {
            handle.abort();
        }
    }
}
