use std::sync::atomic::{AtomicBool, Ordering};

/// Once-only guard for phase completion signals.
///
/// [`PhaseLatch::fire`] returns `true` for exactly one caller between resets.
#[derive(Debug, Default)]
pub struct PhaseLatch {
    fired: AtomicBool,
}

impl PhaseLatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fire(&self) -> bool {
        self.fired
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    pub fn reset(&self) {
        self.fired.store(false, Ordering::Release);
    }
}
