//! # Task Manager
//!
//! Discovery and instantiation of tasks for one acquisition run.
//!
//! Package names are remembered by [`TaskManager::register_task_package`] and
//! scanned lazily by [`TaskManager::load_all_task_modules`], which indexes every
//! enabled definition in discovery order. Definitions disabled by configuration
//! are invisible to [`TaskManager::init_tasks`] for the rest of the run.

use super::class_names::ClassNameTable;
use super::task_registry::{TaskDefinition, TaskDependencies, TaskRegistry};
use crate::error::{AcquisitionError, Result};
use crate::state_machine::TaskState;
use crate::task::{Task, TaskHandler, TaskSinks};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct TaskManager {
    registry: TaskRegistry,
    deps: TaskDependencies,
    handler: Arc<TaskHandler>,
    class_names: Arc<ClassNameTable>,
    packages: RwLock<Vec<String>>,
    discovered: RwLock<Option<Vec<TaskDefinition>>>,
}

impl TaskManager {
    pub fn new(registry: TaskRegistry, deps: TaskDependencies) -> Self {
        let handler = Arc::new(TaskHandler::with_event_capacity(
            deps.config.execution.event_channel_capacity,
        ));
        Self {
            registry,
            deps,
            handler,
            class_names: Arc::new(ClassNameTable::new()),
            packages: RwLock::new(Vec::new()),
            discovered: RwLock::new(None),
        }
    }

    /// Manager over the built-in packages, all of them registered for scanning
    pub fn with_builtin_tasks(deps: TaskDependencies) -> Self {
        let registry = TaskRegistry::with_builtin_packages();
        let manager = Self::new(registry.clone(), deps);
        for name in registry.package_names() {
            manager.register_task_package(name);
        }
        manager
    }

    /// Remember a package to scan; scanning is deferred to [`Self::load_all_task_modules`]
    pub fn register_task_package(&self, name: impl Into<String>) {
        let name = name.into();
        let mut packages = self.packages.write();
        if !packages.contains(&name) {
            debug!(package = %name, "Task package registered");
            packages.push(name);
            // a new package invalidates the previous scan
            *self.discovered.write() = None;
        }
    }

    /// Scan every registered package and index the enabled definitions.
    ///
    /// Returns the number of indexed definitions.
    pub fn load_all_task_modules(&self) -> Result<usize> {
        let mut discovered = Vec::new();
        let config = &self.deps.config;

        for package_name in self.packages.read().iter() {
            let package = self.registry.package(package_name).ok_or_else(|| {
                AcquisitionError::TaskNotFound(format!("task package {package_name}"))
            })?;

            for definition in &package.definitions {
                if !definition.is_enabled(config) {
                    debug!(
                        identifier = %definition.identifier,
                        package = %package_name,
                        "Task disabled by configuration - skipping"
                    );
                    continue;
                }
                if discovered
                    .iter()
                    .any(|d: &TaskDefinition| d.class_name() == definition.class_name())
                {
                    warn!(class_name = %definition.class_name(), "Duplicate task class - keeping first");
                    continue;
                }
                self.class_names
                    .register(definition.identifier.clone(), definition.class_name().to_string());
                discovered.push(definition.clone());
            }
        }

        let count = discovered.len();
        info!(tasks = count, "🔎 TASK DISCOVERY: Task modules loaded");
        *self.discovered.write() = Some(discovered);
        Ok(count)
    }

    pub fn is_loaded(&self) -> bool {
        self.discovered.read().is_some()
    }

    /// Class names of the discovered definitions, in discovery order
    pub fn discovered_class_names(&self) -> Vec<String> {
        self.discovered
            .read()
            .as_ref()
            .map(|defs| defs.iter().map(|d| d.class_name().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn is_discovered(&self, name: &str) -> bool {
        self.discovered
            .read()
            .as_ref()
            .map(|defs| defs.iter().any(|d| d.answers_to(name)))
            .unwrap_or(false)
    }

    /// Instantiate one task per discovered definition named in `task_list`.
    ///
    /// Names may be identifiers or class names. Instantiation follows discovery
    /// order and every new task registers itself with the handler.
    pub fn init_tasks(&self, task_list: &[String], sinks: &TaskSinks) -> Vec<Arc<Task>> {
        let discovered = self.discovered.read();
        let Some(definitions) = discovered.as_ref() else {
            warn!("init_tasks called before load_all_task_modules - nothing to instantiate");
            return Vec::new();
        };

        let tasks: Vec<Arc<Task>> = definitions
            .iter()
            .filter(|definition| task_list.iter().any(|name| definition.answers_to(name)))
            .map(|definition| {
                Task::new(
                    definition.profile.clone(),
                    definition.create_worker(&self.deps),
                    Arc::clone(&self.deps.translations),
                    sinks.clone(),
                    self.deps.config.execution.clone(),
                    &self.handler,
                )
            })
            .collect();

        debug!(
            requested = task_list.len(),
            instantiated = tasks.len(),
            "Tasks instantiated"
        );
        tasks
    }

    pub fn get_tasks(&self) -> Vec<Arc<Task>> {
        self.handler.get_tasks()
    }

    /// Look a live task up by identifier or class name
    pub fn get_task(&self, name: &str) -> Option<Arc<Task>> {
        self.handler.get_task(&self.class_names.resolve(name))
    }

    pub fn clear_tasks(&self) -> Vec<Arc<Task>> {
        self.handler.clear_tasks()
    }

    pub fn are_task_names_in_the_same_state(&self, names: &[String], state: TaskState) -> bool {
        self.handler
            .are_task_names_in_the_same_state(&self.class_names.resolve_all(names), state)
    }

    pub fn have_tasks_reached(&self, names: &[String], state: TaskState) -> bool {
        self.handler
            .have_tasks_reached(&self.class_names.resolve_all(names), state)
    }

    pub fn handler(&self) -> &Arc<TaskHandler> {
        &self.handler
    }

    pub fn class_names(&self) -> &Arc<ClassNameTable> {
        &self.class_names
    }

    pub fn dependencies(&self) -> &TaskDependencies {
        &self.deps
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AcquisitionConfig;
    use crate::events::{ProgressMeter, StatusLine};

    fn sinks() -> TaskSinks {
        TaskSinks::new(Arc::new(ProgressMeter::new()), Arc::new(StatusLine::new()))
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_scanning_is_deferred() {
        let manager = TaskManager::with_builtin_tasks(TaskDependencies::new(AcquisitionConfig::default()));
        assert!(!manager.is_loaded());
        assert!(manager.init_tasks(&names(&["WHOIS"]), &sinks()).is_empty());

        assert_eq!(manager.load_all_task_modules().unwrap(), 14);
        assert!(manager.is_loaded());
    }

    #[test]
    fn test_disabled_tasks_are_not_discovered() {
        let mut config = AcquisitionConfig::default();
        config.packet_capture.enabled = false;
        config.network_tools.whois = false;
        config.pec.enabled = false;

        let manager = TaskManager::with_builtin_tasks(TaskDependencies::new(config));
        assert_eq!(manager.load_all_task_modules().unwrap(), 11);
        assert!(!manager.is_discovered("PACKETCAPTURE"));
        assert!(!manager.is_discovered("TaskWhois"));
        assert!(manager.is_discovered("TaskHeaders"));

        let tasks = manager.init_tasks(&names(&["PACKETCAPTURE", "WHOIS", "HEADERS"]), &sinks());
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].name(), "TaskHeaders");
    }

    #[test]
    fn test_init_follows_discovery_order_and_registers() {
        let manager = TaskManager::with_builtin_tasks(TaskDependencies::new(AcquisitionConfig::default()));
        manager.load_all_task_modules().unwrap();

        let tasks = manager.init_tasks(&names(&["HASH", "TaskWhois", "SCREENRECORDER"]), &sinks());
        let order: Vec<&str> = tasks.iter().map(|t| t.name()).collect();
        assert_eq!(order, vec!["TaskScreenRecorder", "TaskWhois", "TaskHash"]);

        assert_eq!(manager.get_tasks().len(), 3);
        assert!(manager.get_task("HASH").is_some());
        assert!(manager.get_task("TaskHash").is_some());
        assert!(manager.are_task_names_in_the_same_state(&names(&["HASH", "WHOIS"]), TaskState::Initialized));

        assert_eq!(manager.clear_tasks().len(), 3);
        assert!(manager.get_tasks().is_empty());
    }

    #[test]
    fn test_unknown_package_is_an_error() {
        let manager = TaskManager::new(TaskRegistry::new(), TaskDependencies::new(AcquisitionConfig::default()));
        manager.register_task_package("missing");
        assert!(matches!(
            manager.load_all_task_modules(),
            Err(AcquisitionError::TaskNotFound(_))
        ));
    }
}
