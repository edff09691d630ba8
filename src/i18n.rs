//! # Translations
//!
//! Key to display-string lookup for task labels and log/status templates.
//! Templates use positional `{}` placeholders. English strings are built in and
//! can be overridden from a flat JSON object.

use crate::config::error::{ConfigResult, ConfigurationError};
use std::collections::HashMap;
use std::path::Path;
use tracing::warn;

const DEFAULTS: &[(&str, &str)] = &[
    // acquisition phases
    ("ACQUISITION_STARTED", "Acquisition started"),
    ("ACQUISITION_STOPPED", "Acquisition stopped"),
    ("ACQUISITION_FINISHED", "Acquisition finished"),
    ("NTP_ACQUISITION_TIME", "NTP {} acquisition time: {}"),
    ("TASK_IS_EXECUTING", "{} is executing for {} seconds"),
    ("TASK_IS_COMPLETED", "{} completed with status {}"),
    ("TASK_STOP_BEFORE_START", "Stop requested before the task was started"),
    ("TASK_TIMEOUT", "{} did not respond within {} seconds"),
    ("TASK_WORKER_PANICKED", "{} worker terminated unexpectedly"),
    // infinite loop
    ("PACKET_CAPTURE", "Packet capture"),
    ("NETWORK_PACKET_CAPTURE_STARTED", "Network packet capture started"),
    ("NETWORK_PACKET_CAPTURE_STOPPED", "Network packet capture stopped"),
    ("NETWORK_PACKET_CAPTURE_COMPLETED", "Network packet capture completed with status {}"),
    ("PACKET_CAPTURE_ERROR", "Packet capture failed"),
    ("SCREEN_RECORDER", "Screen recorder"),
    ("SCREEN_RECORDER_STARTED", "Screen recording started"),
    ("SCREEN_RECORDER_STOPPED", "Screen recording stopped"),
    ("SCREEN_RECORDER_COMPLETED", "Screen recording completed with status {}"),
    ("SCREEN_RECORDER_ERROR_MSG", "Screen recording failed"),
    // network tools
    ("WHOIS", "WHOIS"),
    ("WHOIS_STARTED", "WHOIS lookup started"),
    ("WHOIS_COMPLETED", "WHOIS lookup completed with status {}"),
    ("WHOIS_EXECUTION_ERROR", "WHOIS lookup failed"),
    ("NSLOOKUP", "NSLOOKUP"),
    ("NSLOOKUP_STARTED", "DNS lookup started"),
    ("NSLOOKUP_COMPLETED", "DNS lookup completed with status {}"),
    ("NSLOOKUP_EXECUTION_ERROR", "DNS lookup failed"),
    ("HEADERS", "HTTP headers"),
    ("HEADERS_STARTED", "HTTP headers collection started"),
    ("HEADERS_COMPLETED", "HTTP headers collection completed with status {}"),
    ("HEADERS_EXECUTION_ERROR", "HTTP headers collection failed"),
    ("TRACEROUTE", "Traceroute"),
    ("TRACEROUTE_STARTED", "Traceroute started"),
    ("TRACEROUTE_COMPLETED", "Traceroute completed with status {}"),
    ("TRACEROUTE_EXECUTION_ERROR", "Traceroute failed"),
    ("SSLKEYLOG", "SSL key log"),
    ("SSLKEYLOG_STARTED", "SSL key log started"),
    ("SSLKEYLOG_COMPLETED", "SSL key log completed with status {}"),
    ("SSLCERTIFICATE", "SSL certificate"),
    ("SSLCERTIFICATE_STARTED", "SSL certificate retrieval started"),
    ("SSLCERTIFICATE_COMPLETED", "SSL certificate retrieval completed with status {}"),
    ("SSLCERTIFICATE_EXECUTION_ERROR", "SSL certificate retrieval failed"),
    ("MALFORMED_URL_ERROR", "The acquisition URL is missing or malformed"),
    // post acquisition
    ("SAVE_CASE_INFO", "Save case info"),
    ("SAVE_CASE_INFO_STARTED", "Saving case info"),
    ("SAVE_CASE_INFO_COMPLETED", "Case info saved with status {}"),
    ("SAVE_CASE_INFO_EXECUTION_ERROR", "Unable to save case info"),
    ("ZIP_AND_REMOVE_FOLDER", "Zip and remove folder"),
    ("ZIP_AND_REMOVE_FOLDER_STARTED", "Compressing acquisition folders"),
    ("ZIP_AND_REMOVE_FOLDER_COMPLETED", "Acquisition folders compressed with status {}"),
    ("ZIP_AND_REMOVE_FOLDER_ERROR", "Unable to compress the acquisition folder"),
    ("DELETE_FOLDER_ERROR", "Unable to delete the acquisition folder"),
    ("HASHFILE", "Hash files"),
    ("CALCULATE_HASHFILE_STARTED", "Calculating file hashes"),
    ("CALCULATE_HASHFILE_COMPLETED", "File hashes calculated with status {}"),
    ("CALCULATE_HASHFILE_ERROR", "Unable to calculate file hashes"),
    ("REPORTFILE", "PDF report"),
    ("GENERATE_PDF_REPORT_STARTED", "Generating PDF report"),
    ("GENERATE_PDF_REPORT_COMPLETED", "PDF report generated with status {}"),
    ("GENERATE_PDF_REPORT_FAILED_MGS", "Unable to generate the PDF report"),
    ("TIMESTAMP", "Timestamp"),
    ("TIMESTAMP_STARTED", "Requesting report timestamp"),
    ("TIMESTAMP_COMPLETED", "Report timestamp completed with status {}"),
    ("TIMESTAMP_EXECUTION_ERROR", "Unable to timestamp the report"),
    ("HTTP_CONNECTION_ERROR", "HTTP connection error"),
    ("PEC_AND_DOWNLOAD_EML", "PEC and EML download"),
    ("PEC_AND_DOWNLOAD_EML_STARTED", "Sending PEC and downloading receipt"),
    ("PEC_AND_DOWNLOAD_EML_COMPLETED", "PEC and receipt download completed with status {}"),
    ("PEC", "Send PEC"),
    ("EML", "Download EML"),
    ("PEC_SENT", "PEC sent to {}"),
    ("PEC_SUBJECT", "Forensic acquisition ({}) - case {}"),
    ("PEC_BODY", "Evidence package of case {}, acquisition type {}. Report, timestamp and TSA certificate attached."),
    ("SMTP_FAILED_MGS", "Unable to send the PEC"),
    ("IMAP_FAILED_MGS", "Unable to download the PEC receipt"),
    ("PEC_NOT_CONFIGURED", "No certified mail relay is configured"),
    // report content
    ("REPORT_TITLE", "Forensic acquisition report"),
    ("CASEDATA", "Case data"),
    ("CASE", "Case"),
    ("LAWYER", "Lawyer"),
    ("OPERATOR", "Operator"),
    ("PROCEEDING", "Proceeding type"),
    ("COURT", "Court"),
    ("NUMBER", "Proceeding number"),
    ("NOTES", "Notes"),
    ("ACQUISITION_TYPE", "Acquisition type"),
    ("ACQUISITION_DATE", "Acquisition date"),
    ("URL", "URL"),
    ("HASHD", "File hashes"),
    ("ZIPD", "Archives"),
    ("ARTIFACTS", "Acquisition files"),
    ("NOT_PRODUCED", "Not produced"),
    ("PRODUCED", "Produced"),
    ("PAGE", "Page"),
    ("OF", "of"),
];

/// Key to template table
#[derive(Debug, Clone)]
pub struct Translations {
    entries: HashMap<String, String>,
}

impl Translations {
    /// Built-in English table
    pub fn english() -> Self {
        Self {
            entries: DEFAULTS
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    /// English table overridden by the flat JSON object at `path`
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigurationError::TranslationsError {
            file_path: path.display().to_string(),
            error: e.to_string(),
        })?;
        let overrides: HashMap<String, String> =
            serde_json::from_str(&raw).map_err(|e| ConfigurationError::TranslationsError {
                file_path: path.display().to_string(),
                error: e.to_string(),
            })?;

        let mut translations = Self::english();
        translations.entries.extend(overrides);
        Ok(translations)
    }

    /// Raw template, or the key itself when missing
    pub fn get(&self, key: &str) -> String {
        match self.entries.get(key) {
            Some(value) => value.clone(),
            None => {
                warn!(key = key, "Missing translation key");
                key.to_string()
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Template with `{}` placeholders replaced in order; surplus args are ignored
    pub fn format(&self, key: &str, args: &[&dyn std::fmt::Display]) -> String {
        let template = self.get(key);
        let mut out = String::with_capacity(template.len());
        let mut args = args.iter();
        let mut rest = template.as_str();
        while let Some(pos) = rest.find("{}") {
            out.push_str(&rest[..pos]);
            match args.next() {
                Some(arg) => out.push_str(&arg.to_string()),
                None => out.push_str("{}"),
            }
            rest = &rest[pos + 2..];
        }
        out.push_str(rest);
        out
    }
}

impl Default for Translations {
    fn default() -> Self {
        Self::english()
    }
}
