//! # Error Types
//!
//! Crate-wide error enum. Task-level failures never surface here: a worker
//! reports a [`WorkerFailure`](crate::task::worker::WorkerFailure) and the
//! owning task converts it to a `COMPLETED/FAILURE` record. `AcquisitionError`
//! is reserved for orchestration misuse and for the helpers that worker bodies
//! call internally.

use crate::config::error::ConfigurationError;
use crate::state_machine::errors::StateMachineError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AcquisitionError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("State transition error: {0}")]
    StateTransition(#[from] StateMachineError),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Task error: {0}")]
    Task(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Report error: {0}")]
    Report(#[from] lopdf::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Time source error: {0}")]
    TimeSource(String),

    #[error("Certified mail error: {0}")]
    CertifiedMail(String),

    #[error("Timestamp authority error: {0}")]
    TimestampAuthority(String),
}

impl AcquisitionError {
    pub fn task(msg: impl Into<String>) -> Self {
        Self::Task(msg.into())
    }
}

impl From<tokio::task::JoinError> for AcquisitionError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(format!("worker join failed: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, AcquisitionError>;
