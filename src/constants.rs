//! # Acquisition Constants
//!
//! Task identifiers, artifact file names and lifecycle event names shared by the
//! orchestrator, the task registry and the built-in tasks.

/// Symbolic task identifiers. These are the keys callers put in
/// `start_tasks`/`stop_tasks` and the keys the class-name table resolves.
pub mod tasks {
    pub const PACKET_CAPTURE: &str = "PACKETCAPTURE";
    pub const SCREEN_RECORDER: &str = "SCREENRECORDER";
    pub const NSLOOKUP: &str = "NSLOOKUP";
    pub const WHOIS: &str = "WHOIS";
    pub const HEADERS: &str = "HEADERS";
    pub const TRACEROUTE: &str = "TRACEROUTE";
    pub const SSL_KEYLOG: &str = "SSLKEYLOG";
    pub const SSL_CERTIFICATE: &str = "SSLCERTIFICATE";
    pub const HASH: &str = "HASH";
    pub const REPORT: &str = "REPORT";
    pub const TIMESTAMP: &str = "TIMESTAMP";
    pub const PEC_AND_DOWNLOAD_EML: &str = "PEC_AND_DOWNLOAD_EML";
    pub const ZIP_AND_REMOVE_FOLDER: &str = "ZIP_AND_REMOVE_FOLDER";
    pub const SAVE_CASE_INFO: &str = "SAVE_CASE_INFO";

    /// Post-acquisition stages in execution order.
    pub const POST_ACQUISITION: [&str; 6] = [
        SAVE_CASE_INFO,
        ZIP_AND_REMOVE_FOLDER,
        HASH,
        REPORT,
        TIMESTAMP,
        PEC_AND_DOWNLOAD_EML,
    ];
}

/// Implementing type names, one per task identifier.
pub mod class_names {
    pub const TASK_PACKET_CAPTURE: &str = "TaskPacketCapture";
    pub const TASK_SCREEN_RECORDER: &str = "TaskScreenRecorder";
    pub const TASK_NSLOOKUP: &str = "TaskNslookup";
    pub const TASK_WHOIS: &str = "TaskWhois";
    pub const TASK_HEADERS: &str = "TaskHeaders";
    pub const TASK_TRACEROUTE: &str = "TaskTraceroute";
    pub const TASK_SSL_KEYLOG: &str = "TaskSSLKeyLog";
    pub const TASK_SSL_CERTIFICATE: &str = "TaskSSLCertificate";
    pub const TASK_HASH: &str = "TaskHash";
    pub const TASK_REPORT: &str = "TaskReport";
    pub const TASK_TIMESTAMP: &str = "TaskTimestamp";
    pub const TASK_PEC_AND_DOWNLOAD_EML: &str = "TaskPecAndDownloadEml";
    pub const TASK_ZIP_AND_REMOVE_FOLDER: &str = "TaskZipAndRemoveFolder";
    pub const TASK_SAVE_CASE_INFO: &str = "TaskSaveCaseInfo";
}

/// Files written into the acquisition directory.
pub mod artifacts {
    pub const CASE_INFO: &str = "caseinfo.json";
    pub const HASH_REPORT: &str = "acquisition.hash";
    pub const ACQUISITION_LOG: &str = "acquisition.log";
    pub const REPORT_PDF: &str = "acquisition_report.pdf";
    pub const TIMESTAMP_RESPONSE: &str = "timestamp.tsr";
    pub const TSA_CERTIFICATE: &str = "tsa.crt";
    pub const DOWNLOADS_DIR: &str = "downloads";
    pub const WEB_CONTENT_DIR: &str = "acquisition_page";
    pub const MAIL_CONTENT_DIR: &str = "acquisition_mail";
    pub const WHOIS: &str = "whois.txt";
    pub const NSLOOKUP: &str = "nslookup.txt";
    pub const HEADERS: &str = "headers.txt";
    pub const TRACEROUTE: &str = "traceroute.txt";
    pub const SSL_CERTIFICATE: &str = "server.cer";
    pub const SSL_KEYLOG: &str = "sslkey.log";
    pub const PACKET_CAPTURE: &str = "acquisition.pcap";
    pub const SCREEN_RECORDING: &str = "acquisition.mp4";
}

/// Lifecycle event names published on the run event bus.
pub mod events {
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_FINISHED: &str = "task.finished";
    pub const TASK_SUB_TASK_UPDATED: &str = "task.sub_task_updated";
    pub const START_TASKS_FINISHED: &str = "acquisition.start_tasks_finished";
    pub const STOP_TASKS_FINISHED: &str = "acquisition.stop_tasks_finished";
    pub const POST_STAGE_FINISHED: &str = "post_acquisition.stage_finished";
    pub const POST_ACQUISITION_FINISHED: &str = "post_acquisition.finished";
}

/// Full-scale value of the progress meter.
pub const PROGRESS_MAX: f64 = 100.0;

/// Environment variable pointed at the SSL key log by the key-log task.
pub const SSL_KEYLOG_ENV: &str = "SSLKEYLOGFILE";
