//! Persists the case metadata as `caseinfo.json`.

use crate::constants::artifacts;
use crate::task::{TaskWorker, WorkerContext, WorkerFailure, WorkerOutcome};
use async_trait::async_trait;
use tracing::debug;

const TITLE_KEY: &str = "SAVE_CASE_INFO";
const ERROR_KEY: &str = "SAVE_CASE_INFO_EXECUTION_ERROR";

#[derive(Debug, Clone, Default)]
pub struct SaveCaseInfoWorker;

#[async_trait]
impl TaskWorker for SaveCaseInfoWorker {
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
        ctx.started(None);
        let options = ctx.options();

        let json = serde_json::to_vec_pretty(&options.case_info)
            .map_err(|e| ctx.failure(TITLE_KEY, ERROR_KEY, e))?;
        tokio::fs::create_dir_all(&options.acquisition_directory)
            .await
            .map_err(|e| ctx.failure(TITLE_KEY, ERROR_KEY, e))?;

        let path = options.artifact_path(artifacts::CASE_INFO);
        tokio::fs::write(&path, json)
            .await
            .map_err(|e| ctx.failure(TITLE_KEY, ERROR_KEY, format!("{}: {e}", path.display())))?;

        debug!(task = %ctx.task_name(), path = %path.display(), "Case info saved");
        Ok(WorkerOutcome::success_with(path.display().to_string()))
    }
}
