pub mod publisher;
pub mod sinks;

pub use publisher::{EventPublisher, PhaseEvent, TaskLifecycleEvent};
pub use sinks::{ProgressMeter, ProgressSink, StatusLine, StatusSink};
