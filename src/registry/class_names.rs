//! # Class Name Table
//!
//! Maps symbolic task identifiers (`WHOIS`, `HASH`, ...) to the type name the
//! task instance registers under (`TaskWhois`, `TaskHash`, ...). Preloaded with
//! the built-in tasks; new task kinds register at runtime.

use crate::constants::{class_names as cn, tasks as id};
use dashmap::DashMap;
use tracing::debug;

const BUILTIN: &[(&str, &str)] = &[
    (id::PACKET_CAPTURE, cn::TASK_PACKET_CAPTURE),
    (id::SCREEN_RECORDER, cn::TASK_SCREEN_RECORDER),
    (id::NSLOOKUP, cn::TASK_NSLOOKUP),
    (id::WHOIS, cn::TASK_WHOIS),
    (id::HEADERS, cn::TASK_HEADERS),
    (id::TRACEROUTE, cn::TASK_TRACEROUTE),
    (id::SSL_KEYLOG, cn::TASK_SSL_KEYLOG),
    (id::SSL_CERTIFICATE, cn::TASK_SSL_CERTIFICATE),
    (id::HASH, cn::TASK_HASH),
    (id::REPORT, cn::TASK_REPORT),
    (id::TIMESTAMP, cn::TASK_TIMESTAMP),
    (id::PEC_AND_DOWNLOAD_EML, cn::TASK_PEC_AND_DOWNLOAD_EML),
    (id::ZIP_AND_REMOVE_FOLDER, cn::TASK_ZIP_AND_REMOVE_FOLDER),
    (id::SAVE_CASE_INFO, cn::TASK_SAVE_CASE_INFO),
];

#[derive(Debug)]
pub struct ClassNameTable {
    entries: DashMap<String, String>,
}

impl ClassNameTable {
    pub fn new() -> Self {
        let entries = DashMap::new();
        for (identifier, class_name) in BUILTIN {
            entries.insert((*identifier).to_string(), (*class_name).to_string());
        }
        Self { entries }
    }

    /// Table with no preloaded entries
    pub fn empty() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Register or replace the mapping for `identifier`
    pub fn register(&self, identifier: impl Into<String>, class_name: impl Into<String>) {
        let identifier = identifier.into();
        let class_name = class_name.into();
        debug!(identifier = %identifier, class_name = %class_name, "Class name registered");
        self.entries.insert(identifier, class_name);
    }

    pub fn get(&self, identifier: &str) -> Option<String> {
        self.entries.get(identifier).map(|entry| entry.value().clone())
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.entries.contains_key(identifier)
    }

    /// Class name for `identifier`, or the input unchanged when it is not an identifier.
    ///
    /// Lets callers name tasks either way in `start_tasks`/`stop_tasks`.
    pub fn resolve(&self, identifier: &str) -> String {
        self.get(identifier).unwrap_or_else(|| identifier.to_string())
    }

    pub fn resolve_all(&self, identifiers: &[String]) -> Vec<String> {
        identifiers.iter().map(|id| self.resolve(id)).collect()
    }

    /// All `(identifier, class_name)` pairs sorted by identifier
    pub fn list_all(&self) -> Vec<(String, String)> {
        let mut all: Vec<(String, String)> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        all.sort();
        all
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ClassNameTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_entries() {
        let table = ClassNameTable::new();
        assert_eq!(table.len(), 14);
        assert_eq!(table.get("WHOIS").as_deref(), Some("TaskWhois"));
        assert_eq!(table.get("PEC_AND_DOWNLOAD_EML").as_deref(), Some("TaskPecAndDownloadEml"));
    }

    #[test]
    fn test_resolve_passes_class_names_through() {
        let table = ClassNameTable::new();
        assert_eq!(table.resolve("HASH"), "TaskHash");
        assert_eq!(table.resolve("TaskHash"), "TaskHash");
        assert_eq!(table.resolve("UNKNOWN"), "UNKNOWN");
    }

    #[test]
    fn test_dynamic_registration() {
        let table = ClassNameTable::empty();
        assert!(table.is_empty());
        table.register("SCREENSHOT", "TaskScreenshot");
        assert!(table.contains("SCREENSHOT"));
        assert_eq!(
            table.list_all(),
            vec![("SCREENSHOT".to_string(), "TaskScreenshot".to_string())]
        );
    }
}
