//! # Infinite-Loop Tasks
//!
//! Packet capture and screen recording. Each runs an external recorder that
//! writes straight into the acquisition directory and keeps running until the
//! task is stopped; stopping kills the recorder and waits for it to exit.

use crate::config::{AcquisitionConfig, CaptureConfig};
use crate::constants::{class_names, tasks};
use crate::registry::{TaskDefinition, TaskPackage};
use crate::task::{TaskProfile, TaskWorker, WorkerContext, WorkerFailure, WorkerOutcome};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Runs `config.program` until a stop is requested
#[derive(Debug, Clone)]
pub struct CaptureWorker {
    config: CaptureConfig,
    title_key: &'static str,
    error_key: &'static str,
}

impl CaptureWorker {
    pub fn packet_capture(config: &AcquisitionConfig) -> Self {
        Self {
            config: CaptureConfig::from(&config.packet_capture),
            title_key: "PACKET_CAPTURE",
            error_key: "PACKET_CAPTURE_ERROR",
        }
    }

    pub fn screen_recorder(config: &AcquisitionConfig) -> Self {
        Self {
            config: CaptureConfig::from(&config.screen_recorder),
            title_key: "SCREEN_RECORDER",
            error_key: "SCREEN_RECORDER_ERROR_MSG",
        }
    }

    pub fn with_config(mut self, config: CaptureConfig) -> Self {
        self.config = config;
        self
    }

    fn command_args(&self, output: &str) -> Vec<String> {
        self.config
            .args
            .iter()
            .map(|arg| arg.replace(OUTPUT_PLACEHOLDER, output))
            .collect()
    }
}

#[async_trait]
impl TaskWorker for CaptureWorker {
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
        let directory = &ctx.options().acquisition_directory;
        tokio::fs::create_dir_all(directory)
            .await
            .map_err(|e| ctx.failure(self.title_key, self.error_key, e))?;

        let output = ctx.options().artifact_path(&self.config.filename);
        let output_display = output.display().to_string();
        let args = self.command_args(&output_display);

        let mut child = Command::new(&self.config.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ctx.failure(
                    self.title_key,
                    self.error_key,
                    format!("{}: {e}", self.config.program),
                )
            })?;

        info!(
            task = %ctx.task_name(),
            program = %self.config.program,
            output = %output_display,
            "Recorder launched"
        );
        ctx.started(Some(output_display.clone()));

        let exited_early = tokio::select! {
            _ = ctx.wait_for_stop() => None,
            status = child.wait() => Some(status),
        };

        match exited_early {
            None => {
                if let Err(e) = child.start_kill() {
                    debug!(task = %ctx.task_name(), error = %e, "Recorder already gone");
                }
                match child.wait().await {
                    Ok(status) => debug!(task = %ctx.task_name(), %status, "Recorder stopped"),
                    Err(e) => warn!(task = %ctx.task_name(), error = %e, "Unable to reap recorder"),
                }
                Ok(WorkerOutcome::success_with(output_display))
            }
            Some(Ok(status)) if status.success() => Ok(WorkerOutcome::success_with(output_display)),
            Some(Ok(status)) => Err(ctx.failure(
                self.title_key,
                self.error_key,
                format!("{} exited with {status}", self.config.program),
            )),
            Some(Err(e)) => Err(ctx.failure(self.title_key, self.error_key, e)),
        }
    }
}

pub fn package() -> TaskPackage {
    TaskPackage::new("infinite_loop")
        .with_task(
            TaskDefinition::new(
                tasks::PACKET_CAPTURE,
                TaskProfile::new(class_names::TASK_PACKET_CAPTURE, "PACKET_CAPTURE")
                    .messages("NETWORK_PACKET_CAPTURE_STARTED", "NETWORK_PACKET_CAPTURE_COMPLETED")
                    .infinite_loop("NETWORK_PACKET_CAPTURE_STOPPED"),
                |deps| Arc::new(CaptureWorker::packet_capture(&deps.config)) as Arc<dyn TaskWorker>,
            )
            .enabled_when(|config| config.packet_capture.enabled),
        )
        .with_task(
            TaskDefinition::new(
                tasks::SCREEN_RECORDER,
                TaskProfile::new(class_names::TASK_SCREEN_RECORDER, "SCREEN_RECORDER")
                    .messages("SCREEN_RECORDER_STARTED", "SCREEN_RECORDER_COMPLETED")
                    .infinite_loop("SCREEN_RECORDER_STOPPED"),
                |deps| Arc::new(CaptureWorker::screen_recorder(&deps.config)) as Arc<dyn TaskWorker>,
            )
            .enabled_when(|config| config.screen_recorder.enabled),
        )
}
