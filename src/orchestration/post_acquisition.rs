//! # Post-Acquisition Chain
//!
//! Fixed six-stage finalization sequence:
//!
//! ```text
//! SAVE_CASE_INFO -> ZIP_AND_REMOVE_FOLDER -> HASH -> REPORT -> TIMESTAMP -> PEC_AND_DOWNLOAD_EML
//! ```
//!
//! A stage starts only after the previous one has completed. Options flow down
//! the chain as immutable values: the zip stage receives the options with the
//! content directory resolved, and every later stage inherits the report file
//! name set for the report stage. A stage that is not registered for the run
//! (disabled, or never requested) is skipped. Whatever happens to the
//! individual stages, `PostAcquisitionFinished` is published exactly once.

use super::latch::PhaseLatch;
use crate::constants::{artifacts, tasks};
use crate::events::{EventPublisher, PhaseEvent};
use crate::logging::{log_error, log_phase_operation};
use crate::options::AcquisitionOptions;
use crate::registry::ClassNameTable;
use crate::state_machine::TaskStatus;
use crate::task::TaskHandler;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};

/// How one stage ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StageOutcome {
    Succeeded,
    Failed { details: String },
    Skipped,
}

impl StageOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageRecord {
    pub stage: String,
    pub class_name: String,
    pub outcome: StageOutcome,
}

/// Result of one chain run, stages in execution order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostAcquisitionReport {
    pub stages: Vec<StageRecord>,
    /// Options as left by the last stage
    #[serde(skip)]
    pub options: Option<Arc<AcquisitionOptions>>,
}

impl PostAcquisitionReport {
    pub fn outcome(&self, stage: &str) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|record| record.stage == stage || record.class_name == stage)
            .map(|record| &record.outcome)
    }

    /// True when every stage ran and succeeded
    pub fn all_succeeded(&self) -> bool {
        self.stages
            .iter()
            .all(|record| record.outcome == StageOutcome::Succeeded)
    }

    pub fn failures(&self) -> Vec<&StageRecord> {
        self.stages
            .iter()
            .filter(|record| record.outcome.is_failure())
            .collect()
    }
}

#[derive(Debug)]
pub struct PostAcquisition {
    events: EventPublisher<PhaseEvent>,
    finished: PhaseLatch,
}

impl PostAcquisition {
    pub fn new(events: EventPublisher<PhaseEvent>) -> Self {
        Self {
            events,
            finished: PhaseLatch::new(),
        }
    }

    /// Re-arm the finished latch for a new run
    pub fn reset(&self) {
        self.finished.reset();
    }

    pub fn is_finished(&self) -> bool {
        self.finished.is_fired()
    }

    /// Run all six stages in order; see the module docs for the rules
    pub async fn run(
        &self,
        handler: &TaskHandler,
        class_names: &ClassNameTable,
        increment: f64,
        options: Arc<AcquisitionOptions>,
    ) -> PostAcquisitionReport {
        log_phase_operation("post_acquisition", tasks::POST_ACQUISITION.len(), "started", None);

        let mut report = PostAcquisitionReport::default();
        let mut options = options;

        for stage in tasks::POST_ACQUISITION {
            options = Self::prepare_options(stage, options);
            let class_name = class_names.resolve(stage);
            let outcome = self
                .run_stage(handler, &class_name, increment, Arc::clone(&options))
                .await;

            info!(stage = stage, outcome = ?outcome, "Post-acquisition stage finished");
            self.events.publish(PhaseEvent::PostAcquisitionStageFinished {
                stage: stage.to_string(),
                outcome: outcome.clone(),
            });
            report.stages.push(StageRecord {
                stage: stage.to_string(),
                class_name,
                outcome,
            });
        }

        report.options = Some(options);
        if self.finished.fire() {
            log_phase_operation(
                "post_acquisition",
                report.stages.len(),
                "finished",
                Some(&format!("{} failed", report.failures().len())),
            );
            self.events.publish(PhaseEvent::PostAcquisitionFinished);
        } else {
            debug!("Post-acquisition already finished for this run - not signalling again");
        }
        report
    }

    /// Options handed to `stage`, derived from the options of the previous stage
    fn prepare_options(stage: &str, options: Arc<AcquisitionOptions>) -> Arc<AcquisitionOptions> {
        match stage {
            tasks::ZIP_AND_REMOVE_FOLDER => Arc::new(options.with_content_directory()),
            tasks::REPORT => Arc::new(options.with_pdf_filename(artifacts::REPORT_PDF)),
            _ => options,
        }
    }

    async fn run_stage(
        &self,
        handler: &TaskHandler,
        class_name: &str,
        increment: f64,
        options: Arc<AcquisitionOptions>,
    ) -> StageOutcome {
        let Some(task) = handler.get_task(class_name) else {
            debug!(task = class_name, "Post-acquisition stage not registered - skipping");
            return StageOutcome::Skipped;
        };

        task.set_options(options);
        task.set_increment(increment);
        if let Err(e) = task.start() {
            log_error(class_name, "start", &e.to_string(), None);
            return StageOutcome::Failed {
                details: e.to_string(),
            };
        }

        match task.wait_until_completed().await {
            (TaskStatus::Success, _) => StageOutcome::Succeeded,
            (_, details) => StageOutcome::Failed { details },
        }
    }
}
