//! # Progress and Status Sinks
//!
//! The two display collaborators every task writes to: a 0-100 progress meter
//! and a single-line status message. Views implement the traits; the crate
//! ships in-memory implementations used by headless runs and tests.

use crate::constants::PROGRESS_MAX;
use parking_lot::{Mutex, RwLock};

/// Progress meter on a 0-100 scale
pub trait ProgressSink: Send + Sync {
    /// Add `delta` to the current value
    fn advance(&self, delta: f64);

    fn value(&self) -> f64;

    /// Overwrite the current value
    fn set(&self, value: f64);
}

/// Single current status message, overwritten on every call
pub trait StatusSink: Send + Sync {
    fn set_text(&self, text: &str);
}

/// In-memory progress meter.
///
/// `advance` ignores non-positive or non-finite deltas and clamps at
/// [`PROGRESS_MAX`], so the value never decreases while a phase runs.
#[derive(Debug, Default)]
pub struct ProgressMeter {
    value: Mutex<f64>,
}

impl ProgressMeter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for ProgressMeter {
    fn advance(&self, delta: f64) {
        if !delta.is_finite() || delta <= 0.0 {
            return;
        }
        let mut value = self.value.lock();
        *value = (*value + delta).min(PROGRESS_MAX);
    }

    fn value(&self) -> f64 {
        *self.value.lock()
    }

    fn set(&self, value: f64) {
        *self.value.lock() = value.clamp(0.0, PROGRESS_MAX);
    }
}

/// In-memory status line
#[derive(Debug, Default)]
pub struct StatusLine {
    text: RwLock<String>,
}

impl StatusLine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> String {
        self.text.read().clone()
    }
}

impl StatusSink for StatusLine {
    fn set_text(&self, text: &str) {
        *self.text.write() = text.to_string();
    }
}
