use super::{
    errors::{invalid_transition, StateMachineResult},
    events::AcquisitionEvent,
    states::AcquisitionState,
};
use tracing::debug;

/// Run-level phase guard: `Unstarted -> Started -> Stopped -> Finished`.
///
/// `Reset` is accepted from every state and is issued by `load_tasks`.
#[derive(Debug, Default, Clone)]
pub struct AcquisitionStateMachine {
    state: AcquisitionState,
}

impl AcquisitionStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_state(&self) -> AcquisitionState {
        self.state
    }

    pub fn transition(&mut self, event: AcquisitionEvent) -> StateMachineResult<AcquisitionState> {
        let target = match (self.state, event) {
            (_, AcquisitionEvent::Reset) => AcquisitionState::Unstarted,
            (AcquisitionState::Unstarted, AcquisitionEvent::RunStartTasks) => {
                AcquisitionState::Started
            }
            (AcquisitionState::Started, AcquisitionEvent::RunStopTasks) => {
                AcquisitionState::Stopped
            }
            (AcquisitionState::Stopped, AcquisitionEvent::StartPostAcquisition) => {
                AcquisitionState::Finished
            }
            (from_state, event) => return Err(invalid_transition(from_state, event.event_type())),
        };

        debug!(
            from = %self.state,
            to = %target,
            event = event.event_type(),
            "Acquisition state transition"
        );
        self.state = target;
        Ok(target)
    }
}
