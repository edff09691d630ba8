//! # Orchestration
//!
//! - **Acquisition**: phase driver for one run (load, start, stop, post, unload)
//! - **PostAcquisition**: fixed six-stage finalization chain
//! - **PhaseLatch**: once-only guard behind every phase completion signal

pub mod acquisition;
pub mod latch;
pub mod post_acquisition;

pub use acquisition::{Acquisition, Phase};
pub use latch::PhaseLatch;
pub use post_acquisition::{PostAcquisition, PostAcquisitionReport, StageOutcome, StageRecord};
