//! # Structured Logging Module
//!
//! Environment-aware structured logging: a human-readable console layer plus a
//! JSON layer that writes into the current acquisition's `acquisition.log`.
//! The JSON sink is switchable so every run logs into its own acquisition
//! directory ([`redirect_to_acquisition_directory`]).

use crate::constants::artifacts;
use chrono::Utc;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

static LOGGER_INITIALIZED: OnceLock<()> = OnceLock::new();
static ACQUISITION_LOG: OnceLock<AcquisitionLogSink> = OnceLock::new();

/// File sink shared between the JSON layer and the orchestrator.
///
/// Writes are discarded while no acquisition directory is set.
#[derive(Clone, Default)]
pub struct AcquisitionLogSink {
    file: Arc<Mutex<Option<(PathBuf, File)>>>,
}

impl AcquisitionLogSink {
    fn redirect(&self, dir: &Path) -> io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(artifacts::ACQUISITION_LOG);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        *self.file.lock() = Some((path.clone(), file));
        Ok(path)
    }

    fn close(&self) {
        if let Some((_, mut file)) = self.file.lock().take() {
            let _ = file.flush();
        }
    }

    fn current_path(&self) -> Option<PathBuf> {
        self.file.lock().as_ref().map(|(path, _)| path.clone())
    }
}

impl Write for AcquisitionLogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.lock().as_mut() {
            Some((_, file)) => file.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.lock().as_mut() {
            Some((_, file)) => file.flush(),
            None => Ok(()),
        }
    }
}

fn acquisition_log() -> &'static AcquisitionLogSink {
    ACQUISITION_LOG.get_or_init(AcquisitionLogSink::default)
}

/// Initialize structured logging with environment-specific configuration
pub fn init_structured_logging() {
    LOGGER_INITIALIZED.get_or_init(|| {
        let environment = get_environment();
        let log_level = get_log_level(&environment);
        let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let (file_writer, guard) = tracing_appender::non_blocking(acquisition_log().clone());

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(true)
                    .with_filter(filter()),
            )
            .with(
                fmt::layer()
                    .with_writer(file_writer)
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_level(true)
                    .with_ansi(false)
                    .json()
                    .with_filter(filter()),
            );

        // An embedding application may already own the global subscriber
        if subscriber.try_init().is_err() {
            tracing::debug!("Global tracing subscriber already initialized - continuing with existing subscriber");
        }

        tracing::info!(
            pid = std::process::id(),
            environment = %environment,
            "🔧 STRUCTURED LOGGING: Initialized"
        );

        // The writer thread lives for the whole process
        std::mem::forget(guard);
    });
}

/// Point the JSON log at `<dir>/acquisition.log`, creating the directory if needed
pub fn redirect_to_acquisition_directory(dir: &Path) -> io::Result<PathBuf> {
    let path = acquisition_log().redirect(dir)?;
    tracing::info!(log_file = %path.display(), "📁 ACQUISITION LOG: Redirected");
    Ok(path)
}

/// Stop writing into the current acquisition directory
pub fn close_acquisition_log() {
    acquisition_log().close();
}

pub fn current_acquisition_log() -> Option<PathBuf> {
    acquisition_log().current_path()
}

/// Get current environment from environment variables
fn get_environment() -> String {
    std::env::var("ACQUISITION_ENV")
        .or_else(|_| std::env::var("APP_ENV"))
        .unwrap_or_else(|_| "development".to_string())
}

/// Get log level based on environment
fn get_log_level(environment: &str) -> String {
    match environment {
        "test" => "debug".to_string(),
        "development" => "debug".to_string(),
        "production" => "info".to_string(),
        _ => "debug".to_string(),
    }
}

/// Log structured data for task operations
pub fn log_task_operation(operation: &str, task_name: &str, status: &str, details: Option<&str>) {
    tracing::info!(
        operation = %operation,
        task_name = %task_name,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "📋 TASK_OPERATION"
    );
}

/// Log structured data for acquisition phases
pub fn log_phase_operation(phase: &str, task_count: usize, status: &str, details: Option<&str>) {
    tracing::info!(
        phase = %phase,
        task_count = task_count,
        status = %status,
        details = details,
        timestamp = %Utc::now().to_rfc3339(),
        "🧭 PHASE_OPERATION"
    );
}

/// Log one hashed evidence file
pub fn log_hash_record(file: &str, size: u64, md5: &str, sha1: &str, sha256: &str) {
    tracing::info!(
        file = %file,
        size = size,
        md5 = %md5,
        sha1 = %sha1,
        sha256 = %sha256,
        "🔐 HASH_RECORD"
    );
}

/// Log error with full context
pub fn log_error(component: &str, operation: &str, error: &str, context: Option<&str>) {
    tracing::error!(
        component = %component,
        operation = %operation,
        error = %error,
        context = context,
        timestamp = %Utc::now().to_rfc3339(),
        "❌ ERROR"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_detection() {
        std::env::set_var("ACQUISITION_ENV", "test_override");
        let env = get_environment();
        assert_eq!(env, "test_override");
        std::env::remove_var("ACQUISITION_ENV");
    }

    #[test]
    fn test_log_level_mapping() {
        assert_eq!(get_log_level("test"), "debug");
        assert_eq!(get_log_level("development"), "debug");
        assert_eq!(get_log_level("production"), "info");
        assert_eq!(get_log_level("unknown"), "debug");
    }

    #[test]
    fn test_sink_discards_without_directory_and_writes_after_redirect() {
        let mut sink = AcquisitionLogSink::default();
        assert_eq!(sink.write(b"dropped\n").unwrap(), 8);

        let dir = tempfile::tempdir().unwrap();
        let path = sink.redirect(dir.path()).unwrap();
        sink.write_all(b"{\"msg\":\"kept\"}\n").unwrap();
        sink.flush().unwrap();
        assert_eq!(sink.current_path(), Some(path.clone()));

        sink.close();
        assert!(sink.current_path().is_none());
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("kept"));
        assert!(!content.contains("dropped"));
    }
}
