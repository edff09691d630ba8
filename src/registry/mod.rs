//! # Task Registry Infrastructure
//!
//! - **ClassNameTable**: identifier to type-name aliases
//! - **TaskRegistry**: typed catalog of task definitions grouped by package
//! - **TaskManager**: per-run discovery, configuration filtering and instantiation

pub mod class_names;
pub mod task_manager;
pub mod task_registry;

pub use class_names::ClassNameTable;
pub use task_manager::TaskManager;
pub use task_registry::{
    EnabledCheck, TaskDefinition, TaskDependencies, TaskPackage, TaskRegistry, WorkerFactory,
};
