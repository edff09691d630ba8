//! # PEC and EML Download
//!
//! Sends the report, its timestamp and the authority certificate through a
//! certified-mail relay, then polls for the delivery receipt and saves it as
//! an `.eml` file. Two sub-tasks track the steps: `PEC` (send) and `EML`
//! (receipt). A failed send never attempts the download.

use crate::config::PecConfig;
use crate::constants::artifacts;
use crate::error;
use crate::options::AcquisitionOptions;
use crate::state_machine::{TaskState, TaskStatus};
use crate::task::{TaskWorker, WorkerContext, WorkerFailure, WorkerOutcome};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const TITLE_KEY: &str = "PEC_AND_DOWNLOAD_EML";

/// Certified message handed to the relay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PecMessage {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

impl PecMessage {
    /// Message for the evidence package of `options`; missing artifacts are left out
    pub fn for_acquisition(options: &AcquisitionOptions, pec_email: &str, subject: String, body: String) -> Self {
        let attachments = [
            options.pdf_filename(),
            artifacts::TIMESTAMP_RESPONSE,
            artifacts::TSA_CERTIFICATE,
        ]
        .into_iter()
        .map(|name| options.artifact_path(name))
        .filter(|path| path.is_file())
        .collect();

        Self {
            sender: pec_email.to_string(),
            recipient: pec_email.to_string(),
            subject,
            body,
            attachments,
        }
    }
}

/// Certified-mail transport. The crate ships no implementation; callers inject one.
#[async_trait]
pub trait CertifiedMailer: Send + Sync {
    async fn send(&self, message: &PecMessage) -> error::Result<()>;

    /// Raw receipt for `message` once the relay has delivered it
    async fn retrieve_receipt(&self, message: &PecMessage) -> error::Result<Option<Vec<u8>>>;
}

pub struct PecAndDownloadEmlWorker {
    mailer: Option<Arc<dyn CertifiedMailer>>,
    config: PecConfig,
}

impl PecAndDownloadEmlWorker {
    pub fn new(mailer: Option<Arc<dyn CertifiedMailer>>, config: PecConfig) -> Self {
        Self { mailer, config }
    }

    fn message(&self, ctx: &WorkerContext) -> PecMessage {
        let options = ctx.options();
        let t = ctx.translations();
        let case_name = if options.case_info.name.is_empty() {
            "N/A"
        } else {
            options.case_info.name.as_str()
        };
        PecMessage::for_acquisition(
            options,
            &self.config.pec_email,
            t.format("PEC_SUBJECT", &[&options.acquisition_type, &case_name]),
            t.format("PEC_BODY", &[&case_name, &options.acquisition_type]),
        )
    }
}

impl std::fmt::Debug for PecAndDownloadEmlWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PecAndDownloadEmlWorker")
            .field("mailer", &self.mailer.is_some())
            .field("pec_email", &self.config.pec_email)
            .field("retries", &self.config.retries)
            .finish()
    }
}

#[async_trait]
impl TaskWorker for PecAndDownloadEmlWorker {
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
        ctx.started(None);
        let t = ctx.translations();
        let pec_label = t.get("PEC");
        let eml_label = t.get("EML");

        let Some(mailer) = &self.mailer else {
            return Err(ctx.failure(TITLE_KEY, "PEC_NOT_CONFIGURED", "no certified mailer"));
        };
        let message = self.message(ctx);

        if let Err(e) = mailer.send(&message).await {
            ctx.update_sub_task(&pec_label, TaskState::Completed, TaskStatus::Failure);
            return Err(ctx.failure(TITLE_KEY, "SMTP_FAILED_MGS", e));
        }
        ctx.update_sub_task(&pec_label, TaskState::Completed, TaskStatus::Success);
        ctx.message(t.format("PEC_SENT", &[&self.config.pec_email]));
        ctx.advance_progress();

        let delay = Duration::from_secs(self.config.retry_delay_secs);
        for attempt in 1..=self.config.retries {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = ctx.wait_for_stop() => {
                    debug!(task = %ctx.task_name(), attempt, "Receipt polling interrupted");
                    break;
                }
            }

            match mailer.retrieve_receipt(&message).await {
                Ok(Some(receipt)) => {
                    let path = ctx
                        .options()
                        .artifact_path(format!("{}.eml", uuid::Uuid::new_v4().simple()));
                    tokio::fs::write(&path, receipt)
                        .await
                        .map_err(|e| ctx.failure(TITLE_KEY, "IMAP_FAILED_MGS", e))?;
                    ctx.update_sub_task(&eml_label, TaskState::Completed, TaskStatus::Success);
                    info!(task = %ctx.task_name(), attempt, path = %path.display(), "PEC receipt saved");
                    return Ok(WorkerOutcome::success_with(path.display().to_string()));
                }
                Ok(None) => debug!(task = %ctx.task_name(), attempt, "PEC receipt not yet delivered"),
                Err(e) => {
                    ctx.update_sub_task(&eml_label, TaskState::Completed, TaskStatus::Failure);
                    return Err(ctx.failure(TITLE_KEY, "IMAP_FAILED_MGS", e));
                }
            }
        }

        ctx.update_sub_task(&eml_label, TaskState::Completed, TaskStatus::Failure);
        Err(ctx.failure(
            TITLE_KEY,
            "IMAP_FAILED_MGS",
            format!("no receipt after {} attempts", self.config.retries),
        ))
    }
}
