//! # Time Sources
//!
//! Phase logs are bracketed with a timestamp taken from an independent clock so
//! the acquisition timeline can be audited. [`NtpTimeSource`] asks an NTP server
//! with a single SNTP (RFC 4330) exchange; [`SystemTimeSource`] reads the local
//! clock.

use crate::error::{AcquisitionError, Result};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use std::time::Duration;
use tokio::net::UdpSocket;
use tracing::warn;

/// Seconds between the NTP epoch (1900) and the Unix epoch (1970)
const NTP_UNIX_OFFSET: u64 = 2_208_988_800;
const NTP_PORT: u16 = 123;
const NTP_PACKET_LEN: usize = 48;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[async_trait]
pub trait TimeSource: Send + Sync {
    async fn now(&self) -> Result<DateTime<Utc>>;

    /// Short description for logs, e.g. `ntp:pool.ntp.org`
    fn describe(&self) -> String;
}

#[derive(Debug, Clone, Default)]
pub struct SystemTimeSource;

#[async_trait]
impl TimeSource for SystemTimeSource {
    async fn now(&self) -> Result<DateTime<Utc>> {
        Ok(Utc::now())
    }

    fn describe(&self) -> String {
        "system".to_string()
    }
}

#[derive(Debug, Clone)]
pub struct NtpTimeSource {
    server: String,
    port: u16,
    timeout: Duration,
}

impl NtpTimeSource {
    pub fn new(server: impl Into<String>, timeout: Duration) -> Self {
        Self {
            server: server.into(),
            port: NTP_PORT,
            timeout,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn from_config(config: &crate::config::NetworkCheckConfig) -> Self {
        Self::new(
            config.ntp_server.clone(),
            Duration::from_secs(config.ntp_timeout_secs),
        )
    }

    async fn query(&self) -> Result<DateTime<Utc>> {
        let socket = UdpSocket::bind("0.0.0.0:0").await?;
        socket.connect((self.server.as_str(), self.port)).await?;

        let mut request = [0u8; NTP_PACKET_LEN];
        // LI = 0, VN = 3, Mode = 3 (client)
        request[0] = 0x1B;
        socket.send(&request).await?;

        let mut response = [0u8; NTP_PACKET_LEN];
        let received = socket.recv(&mut response).await?;
        parse_transmit_timestamp(&response[..received])
    }
}

#[async_trait]
impl TimeSource for NtpTimeSource {
    async fn now(&self) -> Result<DateTime<Utc>> {
        match tokio::time::timeout(self.timeout, self.query()).await {
            Ok(result) => result,
            Err(_) => Err(AcquisitionError::TimeSource(format!(
                "no NTP response from {} within {:?}",
                self.server, self.timeout
            ))),
        }
    }

    fn describe(&self) -> String {
        format!("ntp:{}", self.server)
    }
}

/// Decode the transmit timestamp (bytes 40..48) of an SNTP server reply
pub fn parse_transmit_timestamp(packet: &[u8]) -> Result<DateTime<Utc>> {
    if packet.len() < NTP_PACKET_LEN {
        return Err(AcquisitionError::TimeSource(format!(
            "short NTP packet: {} bytes",
            packet.len()
        )));
    }

    let mode = packet[0] & 0x07;
    if mode != 4 {
        return Err(AcquisitionError::TimeSource(format!(
            "unexpected NTP mode {mode}"
        )));
    }

    let seconds = u32::from_be_bytes([packet[40], packet[41], packet[42], packet[43]]) as u64;
    let fraction = u32::from_be_bytes([packet[44], packet[45], packet[46], packet[47]]) as u64;
    if seconds < NTP_UNIX_OFFSET {
        return Err(AcquisitionError::TimeSource(
            "NTP timestamp before the Unix epoch".to_string(),
        ));
    }

    let unix_seconds = (seconds - NTP_UNIX_OFFSET) as i64;
    let nanos = ((fraction * 1_000_000_000) >> 32) as u32;
    Utc.timestamp_opt(unix_seconds, nanos)
        .single()
        .ok_or_else(|| AcquisitionError::TimeSource("invalid NTP timestamp".to_string()))
}

/// Formatted time from `source`, falling back to the local clock on failure
pub async fn formatted_now(source: &dyn TimeSource) -> String {
    match source.now().await {
        Ok(time) => time.format(TIMESTAMP_FORMAT).to_string(),
        Err(e) => {
            warn!(
                source = %source.describe(),
                error = %e,
                "Time source unavailable, using local clock"
            );
            Utc::now().format(TIMESTAMP_FORMAT).to_string()
        }
    }
}
