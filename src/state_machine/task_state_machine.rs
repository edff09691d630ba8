use super::{
    errors::{invalid_transition, StateMachineError, StateMachineResult},
    events::TaskEvent,
    states::{TaskState, TaskStatus},
};
use chrono::{DateTime, Utc};

/// One applied transition, kept for diagnostics views
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskTransition {
    pub from: TaskState,
    pub to: TaskState,
    pub event: &'static str,
    pub status: TaskStatus,
    pub at: DateTime<Utc>,
}

/// Forward-only lifecycle of a single task.
///
/// The machine owns both `state` and `status`; the task wrapper never writes
/// either field directly.
#[derive(Debug, Clone)]
pub struct TaskStateMachine {
    task_name: String,
    state: TaskState,
    status: TaskStatus,
    history: Vec<TaskTransition>,
}

impl TaskStateMachine {
    pub fn new(task_name: impl Into<String>) -> Self {
        Self {
            task_name: task_name.into(),
            state: TaskState::default(),
            status: TaskStatus::default(),
            history: Vec::new(),
        }
    }

    pub fn current_state(&self) -> TaskState {
        self.state
    }

    pub fn current_status(&self) -> TaskStatus {
        self.status
    }

    pub fn history(&self) -> &[TaskTransition] {
        &self.history
    }

    /// Attempt to transition the task state
    pub fn transition(&mut self, event: &TaskEvent) -> StateMachineResult<TaskState> {
        if self.state.is_terminal() {
            return Err(StateMachineError::AlreadyTerminal {
                task: self.task_name.clone(),
                state: self.state.to_string(),
            });
        }

        let target = self.determine_target_state(event)?;
        let status = match event {
            TaskEvent::Start | TaskEvent::Stop => TaskStatus::Pending,
            TaskEvent::WorkerStarted => TaskStatus::Success,
            TaskEvent::Finish(status) => *status,
            TaskEvent::Fail(_) => TaskStatus::Failure,
        };

        self.history.push(TaskTransition {
            from: self.state,
            to: target,
            event: event.event_type(),
            status,
            at: Utc::now(),
        });
        self.state = target;
        self.status = status;

        Ok(target)
    }

    /// Determine the target state based on current state and event
    fn determine_target_state(&self, event: &TaskEvent) -> StateMachineResult<TaskState> {
        let target = match (self.state, event) {
            (TaskState::Initialized, TaskEvent::Start) => TaskState::Started,

            // A worker may confirm its start after a stop request already landed;
            // the state must not move back.
            (TaskState::Started, TaskEvent::WorkerStarted) => TaskState::Started,
            (TaskState::Stopped, TaskEvent::WorkerStarted) => TaskState::Stopped,

            (TaskState::Started, TaskEvent::Stop) => TaskState::Stopped,

            (_, TaskEvent::Finish(_)) | (_, TaskEvent::Fail(_)) => TaskState::Completed,

            (from_state, event) => return Err(invalid_transition(from_state, event.event_type())),
        };

        Ok(target)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_active(&self) -> bool {
        self.state.is_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_task_lifecycle() {
        let mut sm = TaskStateMachine::new("TaskHash");
        assert_eq!(sm.transition(&TaskEvent::Start).unwrap(), TaskState::Started);
        assert_eq!(sm.current_status(), TaskStatus::Pending);

        sm.transition(&TaskEvent::WorkerStarted).unwrap();
        assert_eq!(sm.current_status(), TaskStatus::Success);

        let state = sm.transition(&TaskEvent::Finish(TaskStatus::Success)).unwrap();
        assert_eq!(state, TaskState::Completed);
        assert!(sm.is_terminal());
        assert_eq!(sm.history().len(), 3);
    }

    #[test]
    fn test_infinite_task_lifecycle() {
        let mut sm = TaskStateMachine::new("TaskPacketCapture");
        sm.transition(&TaskEvent::Start).unwrap();
        sm.transition(&TaskEvent::WorkerStarted).unwrap();
        assert_eq!(sm.transition(&TaskEvent::Stop).unwrap(), TaskState::Stopped);
        assert_eq!(sm.current_status(), TaskStatus::Pending);

        // late confirmation does not move the state backwards
        assert_eq!(sm.transition(&TaskEvent::WorkerStarted).unwrap(), TaskState::Stopped);

        sm.transition(&TaskEvent::Finish(TaskStatus::Success)).unwrap();
        assert_eq!(sm.current_state(), TaskState::Completed);
    }

    #[test]
    fn test_failure_is_terminal() {
        let mut sm = TaskStateMachine::new("TaskWhois");
        sm.transition(&TaskEvent::Start).unwrap();
        sm.transition(&TaskEvent::fail_with_error("connection refused")).unwrap();
        assert_eq!(sm.current_state(), TaskState::Completed);
        assert_eq!(sm.current_status(), TaskStatus::Failure);

        let err = sm.transition(&TaskEvent::Start).unwrap_err();
        assert!(matches!(err, StateMachineError::AlreadyTerminal { .. }));
        let err = sm.transition(&TaskEvent::Finish(TaskStatus::Success)).unwrap_err();
        assert!(matches!(err, StateMachineError::AlreadyTerminal { .. }));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut sm = TaskStateMachine::new("TaskReport");
        assert!(sm.transition(&TaskEvent::Stop).is_err());
        assert!(sm.transition(&TaskEvent::WorkerStarted).is_err());

        sm.transition(&TaskEvent::Start).unwrap();
        assert!(sm.transition(&TaskEvent::Start).is_err());
        assert_eq!(sm.current_state(), TaskState::Started);
    }
}
