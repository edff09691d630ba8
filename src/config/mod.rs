//! # Configuration
//!
//! One section per configuration controller. Every section deserializes with
//! defaults, so an empty source yields a usable configuration. Task discovery
//! consults the `enabled` flags; tasks read the remaining keys through the
//! read-only [`AcquisitionConfig::controller`] view or the typed sections.

pub mod error;
pub mod loader;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use serde::{Deserialize, Serialize};

/// Root configuration for an acquisition session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    pub packet_capture: PacketCaptureConfig,
    pub screen_recorder: ScreenRecorderConfig,
    pub timestamp: TimestampConfig,
    pub pec: PecConfig,
    pub network_tools: NetworkToolsConfig,
    pub network_check: NetworkCheckConfig,
    pub execution: ExecutionConfig,
}

/// External recorder driven by an infinite-loop task.
///
/// `args` may contain the `{output}` placeholder, replaced by the absolute path
/// of `filename` inside the acquisition directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureConfig {
    pub enabled: bool,
    pub filename: String,
    pub program: String,
    pub args: Vec<String>,
}

/// `packet_capture` controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacketCaptureConfig {
    pub enabled: bool,
    pub filename: String,
    pub program: String,
    pub args: Vec<String>,
}

impl Default for PacketCaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filename: crate::constants::artifacts::PACKET_CAPTURE.to_string(),
            program: "tcpdump".to_string(),
            args: vec!["-i".into(), "any".into(), "-w".into(), "{output}".into()],
        }
    }
}

impl From<&PacketCaptureConfig> for CaptureConfig {
    fn from(c: &PacketCaptureConfig) -> Self {
        Self {
            enabled: c.enabled,
            filename: c.filename.clone(),
            program: c.program.clone(),
            args: c.args.clone(),
        }
    }
}

/// `screen_recorder` controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenRecorderConfig {
    pub enabled: bool,
    pub filename: String,
    pub program: String,
    pub args: Vec<String>,
}

impl Default for ScreenRecorderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filename: crate::constants::artifacts::SCREEN_RECORDING.to_string(),
            program: "ffmpeg".to_string(),
            args: vec![
                "-y".into(),
                "-f".into(),
                "x11grab".into(),
                "-i".into(),
                ":0.0".into(),
                "{output}".into(),
            ],
        }
    }
}

impl From<&ScreenRecorderConfig> for CaptureConfig {
    fn from(c: &ScreenRecorderConfig) -> Self {
        Self {
            enabled: c.enabled,
            filename: c.filename.clone(),
            program: c.program.clone(),
            args: c.args.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    pub enabled: bool,
    /// RFC 3161 endpoint receiving `application/timestamp-query` posts
    pub server_name: String,
    /// TSA certificate chain, saved as `tsa.crt`
    pub cert_url: String,
    pub request_timeout_secs: u64,
}

impl Default for TimestampConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            server_name: "https://freetsa.org/tsr".to_string(),
            cert_url: "https://freetsa.org/files/tsa.crt".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Certified-mail relay (PEC) settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PecConfig {
    pub enabled: bool,
    pub pec_email: String,
    pub password: String,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub imap_server: String,
    pub imap_port: u16,
    /// Receipt polling attempts
    pub retries: u32,
    pub retry_delay_secs: u64,
}

impl Default for PecConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            pec_email: String::new(),
            password: String::new(),
            smtp_server: String::new(),
            smtp_port: 465,
            imap_server: String::new(),
            imap_port: 993,
            retries: 10,
            retry_delay_secs: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkToolsConfig {
    pub ssl_keylog: bool,
    pub ssl_certificate: bool,
    pub headers: bool,
    pub whois: bool,
    pub nslookup: bool,
    pub traceroute: bool,
    /// Referral root for WHOIS lookups
    pub whois_server: String,
    pub traceroute_program: String,
    pub openssl_program: String,
    pub request_timeout_secs: u64,
}

impl Default for NetworkToolsConfig {
    fn default() -> Self {
        Self {
            ssl_keylog: true,
            ssl_certificate: true,
            headers: true,
            whois: true,
            nslookup: true,
            traceroute: true,
            whois_server: "whois.iana.org".to_string(),
            traceroute_program: "traceroute".to_string(),
            openssl_program: "openssl".to_string(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkCheckConfig {
    pub ntp_server: String,
    pub ntp_timeout_secs: u64,
}

impl Default for NetworkCheckConfig {
    fn default() -> Self {
        Self {
            ntp_server: "pool.ntp.org".to_string(),
            ntp_timeout_secs: 5,
        }
    }
}

/// Task execution bounds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Delay between a task's finished event and joining its worker
    pub worker_grace_period_ms: u64,
    /// Infinite-loop task: start request until the worker confirms it is running
    pub startup_timeout_secs: u64,
    /// Finite task: start request until the worker finishes
    pub operation_timeout_secs: u64,
    /// Stop request until the worker finishes
    pub stop_timeout_secs: u64,
    /// Bounded wait per task in `unload_tasks` before the worker is aborted
    pub teardown_timeout_secs: u64,
    pub event_channel_capacity: usize,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            worker_grace_period_ms: 1000,
            startup_timeout_secs: 30,
            operation_timeout_secs: 600,
            stop_timeout_secs: 60,
            teardown_timeout_secs: 5,
            event_channel_capacity: 1000,
        }
    }
}

impl AcquisitionConfig {
    /// Read-only key/value view of one configuration controller
    pub fn controller(&self, name: &str) -> Option<serde_json::Value> {
        let value = match name {
            "packet_capture" => serde_json::to_value(&self.packet_capture),
            "screen_recorder" => serde_json::to_value(&self.screen_recorder),
            "timestamp" => serde_json::to_value(&self.timestamp),
            "pec" => serde_json::to_value(&self.pec),
            "network_tools" => serde_json::to_value(&self.network_tools),
            "network_check" => serde_json::to_value(&self.network_check),
            "execution" => serde_json::to_value(&self.execution),
            _ => return None,
        };
        value.ok()
    }

    pub fn validate(&self) -> ConfigResult<()> {
        for (section, capture) in [
            ("packet_capture", CaptureConfig::from(&self.packet_capture)),
            ("screen_recorder", CaptureConfig::from(&self.screen_recorder)),
        ] {
            if capture.enabled && capture.program.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    format!("{section}.program"),
                    "enabled capture task",
                ));
            }
            if capture.enabled && capture.filename.trim().is_empty() {
                return Err(ConfigurationError::missing_required_field(
                    format!("{section}.filename"),
                    "enabled capture task",
                ));
            }
        }

        if self.timestamp.enabled && self.timestamp.server_name.trim().is_empty() {
            return Err(ConfigurationError::missing_required_field(
                "timestamp.server_name",
                "timestamp configuration",
            ));
        }

        if self.pec.enabled && self.pec.retries == 0 {
            return Err(ConfigurationError::invalid_value(
                "pec.retries",
                "0",
                "retries must be greater than 0",
            ));
        }

        if self.execution.event_channel_capacity == 0 {
            return Err(ConfigurationError::invalid_value(
                "execution.event_channel_capacity",
                "0",
                "channel capacity must be greater than 0",
            ));
        }

        Ok(())
    }
}
