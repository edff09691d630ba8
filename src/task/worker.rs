//! # Task Worker Contract
//!
//! A worker is the operation body of a task. It runs on its own tokio task and
//! talks to its owning [`Task`](super::Task) only through [`WorkerEvent`]s sent
//! over the context channel. The terminal event is produced by the task itself
//! from the value `run` returns, so every worker emits exactly one of
//! finished/error.

use crate::i18n::Translations;
use crate::options::AcquisitionOptions;
use crate::state_machine::{TaskState, TaskStatus};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};

/// Structured error payload reported by a failing worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkerFailure {
    /// Dialog title (translated)
    pub title: String,
    /// User-facing message (translated)
    pub message: String,
    /// Technical cause; becomes the task's `details`
    pub details: String,
}

impl WorkerFailure {
    pub fn new(
        title: impl Into<String>,
        message: impl Into<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            details: details.into(),
        }
    }
}

impl fmt::Display for WorkerFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} ({})", self.title, self.message, self.details)
    }
}

impl std::error::Error for WorkerFailure {}

/// Successful result of a worker run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerOutcome {
    pub status: TaskStatus,
    pub details: String,
}

impl WorkerOutcome {
    pub fn success() -> Self {
        Self {
            status: TaskStatus::Success,
            details: String::new(),
        }
    }

    pub fn success_with(details: impl Into<String>) -> Self {
        Self {
            status: TaskStatus::Success,
            details: details.into(),
        }
    }
}

/// Signals a worker sends to its task
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Started { details: Option<String> },
    SubTask { label: String, state: TaskState, status: TaskStatus },
    /// Intermediate progress step worth one increment
    Progress,
    /// Log and show a status message
    Message(String),
    Finished { status: TaskStatus, details: String },
    Error(WorkerFailure),
}

#[async_trait]
pub trait TaskWorker: Send + Sync {
    /// Perform the operation. Call [`WorkerContext::started`] once the operation
    /// is running; infinite-loop workers then wait for
    /// [`WorkerContext::wait_for_stop`] before returning.
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure>;
}

/// Everything a worker may touch while running
pub struct WorkerContext {
    task_name: String,
    options: Arc<AcquisitionOptions>,
    translations: Arc<Translations>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    stop: watch::Receiver<bool>,
}

impl WorkerContext {
    pub(crate) fn new(
        task_name: String,
        options: Arc<AcquisitionOptions>,
        translations: Arc<Translations>,
        events: mpsc::UnboundedSender<WorkerEvent>,
        stop: watch::Receiver<bool>,
    ) -> Self {
        Self {
            task_name,
            options,
            translations,
            events,
            stop,
        }
    }

    pub fn task_name(&self) -> &str {
        &self.task_name
    }

    pub fn options(&self) -> &AcquisitionOptions {
        &self.options
    }

    pub fn shared_options(&self) -> Arc<AcquisitionOptions> {
        Arc::clone(&self.options)
    }

    pub fn translations(&self) -> &Translations {
        &self.translations
    }

    /// Failure payload whose title and message come from translation keys
    pub fn failure(&self, title_key: &str, message_key: &str, details: impl fmt::Display) -> WorkerFailure {
        WorkerFailure::new(
            self.translations.get(title_key),
            self.translations.get(message_key),
            details.to_string(),
        )
    }

    pub fn started(&self, details: Option<String>) {
        self.send(WorkerEvent::Started { details });
    }

    pub fn update_sub_task(&self, label: impl Into<String>, state: TaskState, status: TaskStatus) {
        self.send(WorkerEvent::SubTask {
            label: label.into(),
            state,
            status,
        });
    }

    pub fn advance_progress(&self) {
        self.send(WorkerEvent::Progress);
    }

    pub fn message(&self, text: impl Into<String>) {
        self.send(WorkerEvent::Message(text.into()));
    }

    pub fn stop_requested(&self) -> bool {
        *self.stop.borrow()
    }

    /// Resolve once the task has been asked to stop
    pub async fn wait_for_stop(&self) {
        let mut stop = self.stop.clone();
        // sender dropped means the task is gone: treat as a stop request
        let _ = stop.wait_for(|requested| *requested).await;
    }

    fn send(&self, event: WorkerEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!(task = %self.task_name, "Task no longer listening to worker events");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::AcquisitionType;

    fn context() -> (WorkerContext, mpsc::UnboundedReceiver<WorkerEvent>, watch::Sender<bool>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        let ctx = WorkerContext::new(
            "TaskWhois".into(),
            Arc::new(AcquisitionOptions::new("/tmp/acq", AcquisitionType::Web)),
            Arc::new(Translations::english()),
            tx,
            stop_rx,
        );
        (ctx, rx, stop_tx)
    }

    #[tokio::test]
    async fn test_context_forwards_events() {
        let (ctx, mut rx, _stop) = context();
        ctx.started(Some("listening".into()));
        ctx.advance_progress();

        assert_eq!(
            rx.recv().await.unwrap(),
            WorkerEvent::Started { details: Some("listening".into()) }
        );
        assert_eq!(rx.recv().await.unwrap(), WorkerEvent::Progress);
    }

    #[tokio::test]
    async fn test_wait_for_stop() {
        let (ctx, _rx, stop) = context();
        assert!(!ctx.stop_requested());
        stop.send(true).unwrap();
        ctx.wait_for_stop().await;
        assert!(ctx.stop_requested());
    }

    #[test]
    fn test_failure_uses_translations() {
        let (ctx, _rx, _stop) = context();
        let failure = ctx.failure("WHOIS", "WHOIS_EXECUTION_ERROR", "timeout");
        assert_eq!(failure.title, "WHOIS");
        assert_eq!(failure.message, "WHOIS lookup failed");
        assert_eq!(failure.details, "timeout");
        assert_eq!(failure.to_string(), "WHOIS: WHOIS lookup failed (timeout)");
    }
}
