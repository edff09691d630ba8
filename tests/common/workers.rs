//! Scripted workers for lifecycle and orchestration tests

use async_trait::async_trait;
use evidence_acquisition::state_machine::{TaskState, TaskStatus};
use evidence_acquisition::task::{TaskWorker, WorkerContext, WorkerFailure, WorkerOutcome};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Shared, ordered record of worker activity
#[derive(Debug, Clone, Default)]
pub struct CallTrace {
    calls: Arc<Mutex<Vec<String>>>,
}

impl CallTrace {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: impl Into<String>) {
        self.calls.lock().push(call.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[derive(Debug, Clone)]
pub enum Script {
    /// Confirm start, wait, succeed
    Succeed { delay: Duration },
    /// Confirm start, wait, fail with `details`
    Fail { delay: Duration, details: String },
    /// Fail before confirming the start
    FailBeforeStart { details: String },
    /// Confirm start, then run until stopped
    RunUntilStopped,
    /// Confirm start after `delay`, then run until stopped
    StartAfter { delay: Duration },
    /// Never confirm the start and never return
    Hang,
    Panic,
    /// Confirm start, report the given sub-tasks as succeeded, then succeed
    SubTasks { labels: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct ScriptedWorker {
    pub name: String,
    pub script: Script,
    pub trace: CallTrace,
}

impl ScriptedWorker {
    pub fn new(name: impl Into<String>, script: Script, trace: CallTrace) -> Self {
        Self {
            name: name.into(),
            script,
            trace,
        }
    }

    pub fn shared(name: impl Into<String>, script: Script, trace: CallTrace) -> Arc<dyn TaskWorker> {
        Arc::new(Self::new(name, script, trace))
    }
}

#[async_trait]
impl TaskWorker for ScriptedWorker {
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
        self.trace.record(format!("start:{}", self.name));
        let result = match &self.script {
            Script::Succeed { delay } => {
                ctx.started(None);
                tokio::time::sleep(*delay).await;
                Ok(WorkerOutcome::success_with(format!("{} done", self.name)))
            }
            Script::Fail { delay, details } => {
                ctx.started(None);
                tokio::time::sleep(*delay).await;
                Err(WorkerFailure::new("Scripted", "scripted failure", details.clone()))
            }
            Script::FailBeforeStart { details } => {
                Err(WorkerFailure::new("Scripted", "scripted failure", details.clone()))
            }
            Script::RunUntilStopped => {
                ctx.started(Some(format!("{} running", self.name)));
                ctx.wait_for_stop().await;
                Ok(WorkerOutcome::success())
            }
            Script::StartAfter { delay } => {
                tokio::time::sleep(*delay).await;
                ctx.started(None);
                ctx.wait_for_stop().await;
                Ok(WorkerOutcome::success())
            }
            Script::Hang => std::future::pending().await,
            Script::Panic => panic!("scripted panic in {}", self.name),
            Script::SubTasks { labels } => {
                ctx.started(None);
                for label in labels {
                    ctx.update_sub_task(label.clone(), TaskState::Completed, TaskStatus::Success);
                }
                Ok(WorkerOutcome::success())
            }
        };
        self.trace.record(format!("end:{}", self.name));
        result
    }
}
