// State machines for the task lifecycle and the acquisition run.
//
// Both machines are plain synchronous structs: every transition is applied by the
// single owner of the state (the task pump or the orchestrator) so no locking is
// needed inside them.

pub mod acquisition_state_machine;
pub mod errors;
pub mod events;
pub mod states;
pub mod task_state_machine;

pub use acquisition_state_machine::AcquisitionStateMachine;
pub use errors::{StateMachineError, StateMachineResult};
pub use events::{AcquisitionEvent, TaskEvent};
pub use states::{AcquisitionState, TaskState, TaskStatus};
pub use task_state_machine::{TaskStateMachine, TaskTransition};
