//! Managers, sinks and acquisitions wired for tests

use super::workers::{CallTrace, Script, ScriptedWorker};
use evidence_acquisition::config::AcquisitionConfig;
use evidence_acquisition::events::{ProgressMeter, StatusLine};
use evidence_acquisition::options::{AcquisitionOptions, AcquisitionType};
use evidence_acquisition::orchestration::Acquisition;
use evidence_acquisition::registry::{
    TaskDefinition, TaskDependencies, TaskManager, TaskPackage, TaskRegistry,
};
use evidence_acquisition::task::{TaskProfile, TaskSinks};
use evidence_acquisition::time_source::SystemTimeSource;
use std::path::Path;
use std::sync::Arc;

pub const TEST_PACKAGE: &str = "test_tasks";

/// Defaults with a short grace period and tight timeouts
pub fn test_config() -> AcquisitionConfig {
    let mut config = AcquisitionConfig::default();
    config.execution.worker_grace_period_ms = 10;
    config.execution.startup_timeout_secs = 2;
    config.execution.operation_timeout_secs = 5;
    config.execution.stop_timeout_secs = 2;
    config.execution.teardown_timeout_secs = 1;
    config
}

pub fn test_dependencies(config: AcquisitionConfig) -> TaskDependencies {
    evidence_acquisition::logging::init_structured_logging();
    TaskDependencies::new(config).with_time_source(Arc::new(SystemTimeSource))
}

pub struct TestSinks {
    pub progress: Arc<ProgressMeter>,
    pub status: Arc<StatusLine>,
}

impl TestSinks {
    pub fn new() -> Self {
        Self {
            progress: Arc::new(ProgressMeter::new()),
            status: Arc::new(StatusLine::new()),
        }
    }

    pub fn task_sinks(&self) -> TaskSinks {
        TaskSinks::new(self.progress.clone(), self.status.clone())
    }
}

/// One scripted task kind for a test package
pub struct ScriptedTask {
    pub identifier: String,
    pub class_name: String,
    pub script: Script,
    pub infinite_loop: bool,
}

impl ScriptedTask {
    pub fn new(identifier: &str, class_name: &str, script: Script) -> Self {
        Self {
            identifier: identifier.to_string(),
            class_name: class_name.to_string(),
            script,
            infinite_loop: false,
        }
    }

    pub fn infinite(identifier: &str, class_name: &str) -> Self {
        Self::infinite_with(identifier, class_name, Script::RunUntilStopped)
    }

    pub fn infinite_with(identifier: &str, class_name: &str, script: Script) -> Self {
        Self {
            infinite_loop: true,
            ..Self::new(identifier, class_name, script)
        }
    }
}

pub fn scripted_package(tasks: Vec<ScriptedTask>, trace: &CallTrace) -> TaskPackage {
    tasks.into_iter().fold(TaskPackage::new(TEST_PACKAGE), |package, task| {
        let mut profile = TaskProfile::new(task.class_name.clone(), task.identifier.clone());
        if task.infinite_loop {
            profile = profile.infinite_loop(format!("{}_STOPPED", task.identifier));
        }
        let trace = trace.clone();
        let name = task.identifier.clone();
        let script = task.script;
        package.with_task(TaskDefinition::new(task.identifier, profile, move |_| {
            ScriptedWorker::shared(name.clone(), script.clone(), trace.clone())
        }))
    })
}

/// Manager scanning only the scripted package
pub fn scripted_manager(
    tasks: Vec<ScriptedTask>,
    trace: &CallTrace,
    deps: TaskDependencies,
) -> Arc<TaskManager> {
    let mut registry = TaskRegistry::new();
    registry.add_package(scripted_package(tasks, trace));
    let manager = TaskManager::new(registry, deps);
    manager.register_task_package(TEST_PACKAGE);
    Arc::new(manager)
}

pub fn web_options(dir: &Path) -> AcquisitionOptions {
    AcquisitionOptions::new(dir, AcquisitionType::Web).with_url("https://example.org/page")
}

/// Acquisition over scripted tasks with no post-acquisition stages
pub fn scripted_acquisition(
    tasks: Vec<ScriptedTask>,
    start: &[&str],
    stop: &[&str],
    dir: &Path,
    trace: &CallTrace,
    sinks: &TestSinks,
) -> Acquisition {
    let manager = scripted_manager(tasks, trace, test_dependencies(test_config()));
    Acquisition::new(manager, web_options(dir), sinks.task_sinks())
        .with_start_tasks(start.iter().copied())
        .with_stop_tasks(stop.iter().copied())
}
