use super::states::TaskStatus;
use serde::{Deserialize, Serialize};

/// Events that can trigger task state transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum TaskEvent {
    /// Controller asked the task to start
    Start,
    /// Worker confirmed that its operation is running
    WorkerStarted,
    /// Controller asked an infinite-loop task to stop
    Stop,
    /// Worker finished with the given status
    Finish(TaskStatus),
    /// Worker failed, or a synthetic failure (timeout, panic)
    Fail(String),
}

impl TaskEvent {
    /// Get a string representation of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::WorkerStarted => "worker_started",
            Self::Stop => "stop",
            Self::Finish(_) => "finish",
            Self::Fail(_) => "fail",
        }
    }

    /// Extract error message if this is a failure event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) => Some(msg),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finish(_) | Self::Fail(_))
    }

    /// Create a failure event with the given error message
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }
}

/// Events that drive the run-level acquisition state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionEvent {
    RunStartTasks,
    RunStopTasks,
    StartPostAcquisition,
    Reset,
}

impl AcquisitionEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::RunStartTasks => "run_start_tasks",
            Self::RunStopTasks => "run_stop_tasks",
            Self::StartPostAcquisition => "start_post_acquisition",
            Self::Reset => "reset",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_types() {
        assert_eq!(TaskEvent::Start.event_type(), "start");
        assert_eq!(TaskEvent::Finish(TaskStatus::Success).event_type(), "finish");
        assert_eq!(TaskEvent::fail_with_error("boom").error_message(), Some("boom"));
        assert!(TaskEvent::fail_with_error("boom").is_terminal());
        assert!(!TaskEvent::Stop.is_terminal());
    }

    #[test]
    fn test_event_serde_shape() {
        let json = serde_json::to_value(TaskEvent::Fail("x".into())).unwrap();
        assert_eq!(json["type"], "Fail");
        assert_eq!(json["data"], "x");
    }
}
