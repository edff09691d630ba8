use crate::constants::events as event_names;
use crate::orchestration::post_acquisition::StageOutcome;
use crate::state_machine::TaskStatus;
use crate::task::SubTaskRecord;
use serde::Serialize;
use tokio::sync::broadcast;

/// Notification a task re-emits to its listeners after applying a worker signal
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TaskLifecycleEvent {
    Started {
        task: String,
        details: Option<String>,
    },
    SubTaskUpdated {
        task: String,
        sub_task: SubTaskRecord,
    },
    Finished {
        task: String,
        status: TaskStatus,
        details: String,
    },
}

impl TaskLifecycleEvent {
    pub fn task_name(&self) -> &str {
        match self {
            Self::Started { task, .. }
            | Self::SubTaskUpdated { task, .. }
            | Self::Finished { task, .. } => task,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Started { .. } => event_names::TASK_STARTED,
            Self::SubTaskUpdated { .. } => event_names::TASK_SUB_TASK_UPDATED,
            Self::Finished { .. } => event_names::TASK_FINISHED,
        }
    }
}

/// Phase-level notifications emitted by the orchestrator and the post-acquisition chain
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PhaseEvent {
    StartTasksFinished,
    StopTasksFinished,
    PostAcquisitionStageFinished { stage: String, outcome: StageOutcome },
    PostAcquisitionFinished,
}

impl PhaseEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::StartTasksFinished => event_names::START_TASKS_FINISHED,
            Self::StopTasksFinished => event_names::STOP_TASKS_FINISHED,
            Self::PostAcquisitionStageFinished { .. } => event_names::POST_STAGE_FINISHED,
            Self::PostAcquisitionFinished => event_names::POST_ACQUISITION_FINISHED,
        }
    }
}

/// Broadcast publisher for lifecycle events.
///
/// Publishing with no subscribers is not an error: events are emitted whether or
/// not a view is listening.
///
/// ```rust
/// use evidence_acquisition::events::{EventPublisher, PhaseEvent};
///
/// # tokio_test::block_on(async {
/// let publisher: EventPublisher<PhaseEvent> = EventPublisher::new(16);
/// assert_eq!(publisher.publish(PhaseEvent::StartTasksFinished), 0);
///
/// let mut rx = publisher.subscribe();
/// publisher.publish(PhaseEvent::StopTasksFinished);
/// assert_eq!(rx.recv().await.unwrap(), PhaseEvent::StopTasksFinished);
/// # });
/// ```
#[derive(Debug, Clone)]
pub struct EventPublisher<T: Clone> {
    sender: broadcast::Sender<T>,
}

impl<T: Clone> EventPublisher<T> {
    /// Create a new event publisher with the specified channel capacity
    ///
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event, returning how many subscribers received it
    pub fn publish(&self, event: T) -> usize {
        self.sender.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<T> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl<T: Clone> Default for EventPublisher<T> {
    fn default() -> Self {
        Self::new(1000)
    }
}
