//! # Built-in Tasks
//!
//! Worker implementations grouped in the packages the task manager scans:
//!
//! - `infinite_loop`: packet capture, screen recording
//! - `network_tools`: WHOIS, DNS, HTTP headers, traceroute, TLS certificate, TLS key log
//! - `post_acquisition`: the six finalization stages

pub mod infinite_loop;
pub mod network_tools;
pub mod post_acquisition;

pub use post_acquisition::{CertifiedMailer, HttpTimestampAuthority, PecMessage, TimestampAuthority};

use crate::registry::TaskPackage;

pub fn builtin_packages() -> Vec<TaskPackage> {
    vec![
        infinite_loop::package(),
        network_tools::package(),
        post_acquisition::package(),
    ]
}
