#![allow(clippy::doc_markdown)] // Allow technical terms like WHOIS, SHA-256 in docs
#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Evidence Acquisition
//!
//! Task orchestration core for forensic evidence acquisition.
//!
//! ## Overview
//!
//! An acquisition captures a web page, a mailbox or a social profile for
//! evidentiary use. Around the capture itself a fixed set of tasks runs: packet
//! capture and screen recording for its whole duration, network probes of the
//! acquired host, and a post-acquisition chain that seals the evidence package
//! (case info, archives, hashes, PDF report, RFC 3161 timestamp, certified mail).
//!
//! ## Architecture
//!
//! Every task wraps a worker running on its own tokio task. Workers talk to
//! their task over an mpsc channel; tasks publish lifecycle events on a
//! broadcast bus owned by the run-scoped [`task::TaskHandler`]. The
//! [`orchestration::Acquisition`] subscribes to that bus and fires each phase
//! completion exactly once, when every task of the phase has reached its
//! target state. Worker failures become `COMPLETED/FAILURE` records and never
//! stop the pipeline.
//!
//! ## Module Organization
//!
//! - [`state_machine`] - Task and acquisition states and transitions
//! - [`task`] - Task lifecycle, worker contract and the fan-in handler
//! - [`registry`] - Task packages, class-name table and the task manager
//! - [`orchestration`] - Acquisition phases and the post-acquisition chain
//! - [`tasks`] - Built-in workers
//! - [`config`] - Configuration controllers
//! - [`events`] - Lifecycle/phase events and progress/status sinks
//! - [`logging`] - Structured logging and the per-acquisition log file
//! - [`error`] - Structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use evidence_acquisition::config::AcquisitionConfig;
//! use evidence_acquisition::events::{ProgressMeter, StatusLine};
//! use evidence_acquisition::options::{AcquisitionOptions, AcquisitionType};
//! use evidence_acquisition::orchestration::Acquisition;
//! use evidence_acquisition::registry::{TaskDependencies, TaskManager};
//! use evidence_acquisition::task::TaskSinks;
//! use std::sync::Arc;
//!
//! # async fn example() -> evidence_acquisition::Result<()> {
//! evidence_acquisition::logging::init_structured_logging();
//! let deps = TaskDependencies::new(AcquisitionConfig::default());
//! let manager = Arc::new(TaskManager::with_builtin_tasks(deps));
//! let options = AcquisitionOptions::new("/evidence/case-42", AcquisitionType::Web)
//!     .with_url("https://example.org");
//! let sinks = TaskSinks::new(Arc::new(ProgressMeter::new()), Arc::new(StatusLine::new()));
//!
//! let acquisition = Acquisition::new(manager, options, sinks)
//!     .with_start_tasks(["PACKETCAPTURE", "SCREENRECORDER"])
//!     .with_stop_tasks(["PACKETCAPTURE", "SCREENRECORDER", "WHOIS", "NSLOOKUP"]);
//!
//! acquisition.load_tasks()?;
//! acquisition.run_start_tasks().await?;
//! // ... capture the evidence ...
//! acquisition.run_stop_tasks().await?;
//! let report = acquisition.start_post_acquisition().await?;
//! println!("post-acquisition failures: {}", report.failures().len());
//! acquisition.unload_tasks().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Testing
//!
//! ```bash
//! cargo test --lib    # Unit tests
//! cargo test          # Unit and integration tests
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod events;
pub mod i18n;
pub mod logging;
pub mod options;
pub mod orchestration;
pub mod registry;
pub mod state_machine;
pub mod task;
pub mod tasks;
pub mod time_source;

pub use config::{AcquisitionConfig, ConfigManager, ExecutionConfig};
pub use error::{AcquisitionError, Result};
pub use events::{PhaseEvent, ProgressMeter, StatusLine, TaskLifecycleEvent};
pub use i18n::Translations;
pub use options::{AcquisitionOptions, AcquisitionType, CaseInfo};
pub use orchestration::{Acquisition, Phase, PostAcquisition, PostAcquisitionReport, StageOutcome};
pub use registry::{ClassNameTable, TaskDependencies, TaskManager, TaskRegistry};
pub use state_machine::{AcquisitionState, TaskState, TaskStatus};
pub use task::{Task, TaskHandler, TaskSinks, TaskWorker, WorkerContext, WorkerFailure, WorkerOutcome};
pub use time_source::{NtpTimeSource, SystemTimeSource, TimeSource};
