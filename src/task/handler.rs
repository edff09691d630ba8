//! # Task Handler
//!
//! Run-scoped collection of live tasks. Tasks register themselves on
//! construction; the orchestrator queries the collection for phase fan-in.

use super::Task;
use crate::events::{EventPublisher, TaskLifecycleEvent};
use crate::state_machine::TaskState;
use parking_lot::RwLock;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::debug;

#[derive(Debug, Default)]
pub struct TaskHandler {
    tasks: RwLock<Vec<Arc<Task>>>,
    lifecycle: EventPublisher<TaskLifecycleEvent>,
}

impl TaskHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event_capacity(capacity: usize) -> Self {
        Self {
            tasks: RwLock::new(Vec::new()),
            lifecycle: EventPublisher::new(capacity),
        }
    }

    pub fn add_task(&self, task: Arc<Task>) {
        debug!(task = %task.name(), "Task registered with handler");
        self.tasks.write().push(task);
    }

    /// First task registered under `name`
    pub fn get_task(&self, name: &str) -> Option<Arc<Task>> {
        self.tasks.read().iter().find(|t| t.name() == name).cloned()
    }

    /// All tasks in registration order
    pub fn get_tasks(&self) -> Vec<Arc<Task>> {
        self.tasks.read().clone()
    }

    /// Drop every task reference; returns the removed tasks so callers can shut them down
    pub fn clear_tasks(&self) -> Vec<Arc<Task>> {
        std::mem::take(&mut *self.tasks.write())
    }

    pub fn len(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().is_empty()
    }

    /// Resolve names to tasks in the order given, skipping unknown names
    pub fn resolve(&self, names: &[String]) -> Vec<Arc<Task>> {
        names.iter().filter_map(|name| self.get_task(name)).collect()
    }

    /// True iff at least one name resolves and every resolved task is exactly in `state`.
    ///
    /// Unknown names are ignored. An empty resolution is `false`, never vacuously true.
    pub fn are_task_names_in_the_same_state(&self, names: &[String], state: TaskState) -> bool {
        let states: HashSet<TaskState> = self
            .resolve(names)
            .iter()
            .map(|task| task.state())
            .collect();
        states.len() == 1 && states.contains(&state)
    }

    /// True iff at least one name resolves and every resolved task has confirmed `state`
    /// (see [`Task::has_confirmed`]). Phase fan-in uses this form so a task that
    /// failed before confirming its start still lets the phase converge.
    pub fn have_tasks_reached(&self, names: &[String], state: TaskState) -> bool {
        let tasks = self.resolve(names);
        !tasks.is_empty() && tasks.iter().all(|task| task.has_confirmed(state))
    }

    pub fn lifecycle(&self) -> &EventPublisher<TaskLifecycleEvent> {
        &self.lifecycle
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TaskLifecycleEvent> {
        self.lifecycle.subscribe()
    }
}
