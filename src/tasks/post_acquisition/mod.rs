//! # Post-Acquisition Tasks
//!
//! The six finalization stages, registered in chain order. The chain itself
//! lives in [`crate::orchestration::post_acquisition`].

pub mod hash;
pub mod pec;
pub mod report;
pub mod save_case_info;
pub mod timestamp;
pub mod zip_and_remove_folder;

pub use hash::HashWorker;
pub use pec::{CertifiedMailer, PecAndDownloadEmlWorker, PecMessage};
pub use report::ReportWorker;
pub use save_case_info::SaveCaseInfoWorker;
pub use timestamp::{HttpTimestampAuthority, TimestampAuthority, TimestampWorker};
pub use zip_and_remove_folder::ZipAndRemoveFolderWorker;

use crate::constants::{class_names, tasks};
use crate::registry::{TaskDefinition, TaskPackage};
use crate::task::{TaskProfile, TaskWorker};
use std::sync::Arc;

pub fn package() -> TaskPackage {
    TaskPackage::new("post_acquisition")
        .with_task(TaskDefinition::new(
            tasks::SAVE_CASE_INFO,
            TaskProfile::new(class_names::TASK_SAVE_CASE_INFO, "SAVE_CASE_INFO"),
            |_| Arc::new(SaveCaseInfoWorker) as Arc<dyn TaskWorker>,
        ))
        .with_task(TaskDefinition::new(
            tasks::ZIP_AND_REMOVE_FOLDER,
            TaskProfile::new(class_names::TASK_ZIP_AND_REMOVE_FOLDER, "ZIP_AND_REMOVE_FOLDER"),
            |_| Arc::new(ZipAndRemoveFolderWorker) as Arc<dyn TaskWorker>,
        ))
        .with_task(TaskDefinition::new(
            tasks::HASH,
            TaskProfile::new(class_names::TASK_HASH, "HASHFILE")
                .messages("CALCULATE_HASHFILE_STARTED", "CALCULATE_HASHFILE_COMPLETED"),
            |_| Arc::new(HashWorker) as Arc<dyn TaskWorker>,
        ))
        .with_task(TaskDefinition::new(
            tasks::REPORT,
            TaskProfile::new(class_names::TASK_REPORT, "REPORTFILE")
                .messages("GENERATE_PDF_REPORT_STARTED", "GENERATE_PDF_REPORT_COMPLETED"),
            |deps| Arc::new(ReportWorker::new(Arc::clone(&deps.time_source))) as Arc<dyn TaskWorker>,
        ))
        .with_task(
            TaskDefinition::new(
                tasks::TIMESTAMP,
                TaskProfile::new(class_names::TASK_TIMESTAMP, "TIMESTAMP"),
                |deps| {
                    Arc::new(TimestampWorker::new(Arc::clone(&deps.timestamp_authority)))
                        as Arc<dyn TaskWorker>
                },
            )
            .enabled_when(|config| config.timestamp.enabled),
        )
        .with_task(
            TaskDefinition::new(
                tasks::PEC_AND_DOWNLOAD_EML,
                TaskProfile::new(class_names::TASK_PEC_AND_DOWNLOAD_EML, "PEC_AND_DOWNLOAD_EML")
                    .sub_tasks(["PEC", "EML"]),
                |deps| {
                    Arc::new(PecAndDownloadEmlWorker::new(
                        deps.certified_mailer.clone(),
                        deps.config.pec.clone(),
                    )) as Arc<dyn TaskWorker>
                },
            )
            .enabled_when(|config| config.pec.enabled),
        )
}
