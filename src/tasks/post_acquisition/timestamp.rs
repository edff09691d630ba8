//! # Report Timestamp
//!
//! RFC 3161 timestamp of the PDF report. The stage downloads the authority's
//! certificate chain (`tsa.crt`), posts a `TimeStampReq` over the SHA-256
//! digest of the report and stores the DER response (`timestamp.tsr`).

use crate::config::TimestampConfig;
use crate::constants::artifacts;
use crate::error::{self, AcquisitionError};
use crate::task::{TaskWorker, WorkerContext, WorkerFailure, WorkerOutcome};
use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const TITLE_KEY: &str = "TIMESTAMP";
const ERROR_KEY: &str = "TIMESTAMP_EXECUTION_ERROR";
const HTTP_ERROR_KEY: &str = "HTTP_CONNECTION_ERROR";
const TIMESTAMP_QUERY: &str = "application/timestamp-query";

/// AlgorithmIdentifier { id-sha256, NULL }
const SHA256_ALGORITHM: [u8; 15] = [
    0x30, 0x0d, 0x06, 0x09, 0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01, 0x05, 0x00,
];

#[async_trait]
pub trait TimestampAuthority: Send + Sync {
    /// Certificate chain of the authority, stored verbatim
    async fn fetch_certificate(&self) -> error::Result<Vec<u8>>;

    /// DER `TimeStampResp` for a SHA-256 digest
    async fn request_timestamp(&self, digest: &[u8]) -> error::Result<Vec<u8>>;

    fn describe(&self) -> String;
}

#[derive(Debug, Clone)]
pub struct HttpTimestampAuthority {
    server_url: String,
    cert_url: String,
    timeout: Duration,
}

impl HttpTimestampAuthority {
    pub fn new(server_url: impl Into<String>, cert_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            server_url: server_url.into(),
            cert_url: cert_url.into(),
            timeout,
        }
    }

    pub fn from_config(config: &TimestampConfig) -> Self {
        Self::new(
            config.server_name.clone(),
            config.cert_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn client(&self) -> error::Result<reqwest::Client> {
        Ok(reqwest::Client::builder().timeout(self.timeout).build()?)
    }
}

#[async_trait]
impl TimestampAuthority for HttpTimestampAuthority {
    async fn fetch_certificate(&self) -> error::Result<Vec<u8>> {
        let response = self
            .client()?
            .get(&self.cert_url)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn request_timestamp(&self, digest: &[u8]) -> error::Result<Vec<u8>> {
        let request = encode_timestamp_request(digest, nonce());
        let response = self
            .client()?
            .post(&self.server_url)
            .header(reqwest::header::CONTENT_TYPE, TIMESTAMP_QUERY)
            .body(request)
            .send()
            .await?
            .error_for_status()?;
        let body = response.bytes().await?.to_vec();

        match response_status(&body) {
            Some(0 | 1) => Ok(body),
            Some(status) => Err(AcquisitionError::TimestampAuthority(format!(
                "request rejected with PKIStatus {status}"
            ))),
            None => Err(AcquisitionError::TimestampAuthority(
                "malformed TimeStampResp".to_string(),
            )),
        }
    }

    fn describe(&self) -> String {
        self.server_url.clone()
    }
}

fn nonce() -> u64 {
    let bytes = uuid::Uuid::new_v4().into_bytes();
    let mut nonce = [0u8; 8];
    nonce.copy_from_slice(&bytes[..8]);
    u64::from_be_bytes(nonce)
}

fn der_length(len: usize, out: &mut Vec<u8>) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().take_while(|b| **b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
}

fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(content.len() + 4);
    out.push(tag);
    der_length(content.len(), &mut out);
    out.extend_from_slice(content);
    out
}

fn der_unsigned(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count().min(7);
    let mut content = Vec::with_capacity(9);
    if bytes[skip] & 0x80 != 0 {
        content.push(0);
    }
    content.extend_from_slice(&bytes[skip..]);
    der(0x02, &content)
}

/// DER `TimeStampReq` (v1, SHA-256 imprint, nonce, certReq TRUE)
pub fn encode_timestamp_request(digest: &[u8], nonce: u64) -> Vec<u8> {
    let mut imprint = SHA256_ALGORITHM.to_vec();
    imprint.extend(der(0x04, digest));

    let mut body = der_unsigned(1);
    body.extend(der(0x30, &imprint));
    body.extend(der_unsigned(nonce));
    body.extend([0x01, 0x01, 0xff]);
    der(0x30, &body)
}

fn read_header(data: &[u8]) -> Option<(u8, usize, usize)> {
    let tag = *data.first()?;
    let first = *data.get(1)?;
    if first < 0x80 {
        return Some((tag, 2, first as usize));
    }
    let count = (first & 0x7f) as usize;
    if count == 0 || count > 4 {
        return None;
    }
    let len = data
        .get(2..2 + count)?
        .iter()
        .fold(0usize, |acc, b| (acc << 8) | *b as usize);
    Some((tag, 2 + count, len))
}

/// `PKIStatusInfo.status` of a DER `TimeStampResp`
pub fn response_status(response: &[u8]) -> Option<u32> {
    let (tag, header, _) = read_header(response)?;
    if tag != 0x30 {
        return None;
    }
    let status_info = response.get(header..)?;
    let (tag, header, _) = read_header(status_info)?;
    if tag != 0x30 {
        return None;
    }
    let status = status_info.get(header..)?;
    let (tag, header, len) = read_header(status)?;
    if tag != 0x02 || len == 0 || len > 4 {
        return None;
    }
    Some(
        status
            .get(header..header + len)?
            .iter()
            .fold(0u32, |acc, b| (acc << 8) | u32::from(*b)),
    )
}

pub struct TimestampWorker {
    authority: Arc<dyn TimestampAuthority>,
}

impl TimestampWorker {
    pub fn new(authority: Arc<dyn TimestampAuthority>) -> Self {
        Self { authority }
    }
}

impl std::fmt::Debug for TimestampWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimestampWorker")
            .field("authority", &self.authority.describe())
            .finish()
    }
}

#[async_trait]
impl TaskWorker for TimestampWorker {
    async fn run(&self, ctx: &WorkerContext) -> Result<WorkerOutcome, WorkerFailure> {
        ctx.started(None);
        let options = ctx.options();
        let report = options.artifact_path(options.pdf_filename());

        let pdf = tokio::fs::read(&report)
            .await
            .map_err(|e| ctx.failure(TITLE_KEY, ERROR_KEY, format!("{}: {e}", report.display())))?;
        let digest = Sha256::digest(&pdf);
        debug!(report = %report.display(), digest = %hex::encode(digest.as_slice()), "Report digest");

        let certificate = self
            .authority
            .fetch_certificate()
            .await
            .map_err(|e| ctx.failure(TITLE_KEY, HTTP_ERROR_KEY, e))?;
        tokio::fs::write(options.artifact_path(artifacts::TSA_CERTIFICATE), certificate)
            .await
            .map_err(|e| ctx.failure(TITLE_KEY, ERROR_KEY, e))?;

        let token = self
            .authority
            .request_timestamp(digest.as_slice())
            .await
            .map_err(|e| match e {
                AcquisitionError::Http(_) => ctx.failure(TITLE_KEY, HTTP_ERROR_KEY, e),
                _ => ctx.failure(TITLE_KEY, ERROR_KEY, e),
            })?;
        let tsr = options.artifact_path(artifacts::TIMESTAMP_RESPONSE);
        tokio::fs::write(&tsr, token)
            .await
            .map_err(|e| ctx.failure(TITLE_KEY, ERROR_KEY, e))?;

        info!(task = %ctx.task_name(), authority = %self.authority.describe(), "Report timestamped");
        Ok(WorkerOutcome::success_with(tsr.display().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_request_encoding() {
        let request = encode_timestamp_request(&[0u8; 32], 1);
        assert_eq!(request.len(), 62);
        assert_eq!(
            &request[..11],
            &[0x30, 0x3c, 0x02, 0x01, 0x01, 0x30, 0x31, 0x30, 0x0d, 0x06, 0x09]
        );
        assert_eq!(&request[request.len() - 6..], &[0x02, 0x01, 0x01, 0x01, 0x01, 0xff]);
    }

    #[test]
    fn test_nonce_with_high_bit_is_padded() {
        assert_eq!(der_unsigned(0x80), vec![0x02, 0x02, 0x00, 0x80]);
        assert_eq!(der_unsigned(0), vec![0x02, 0x01, 0x00]);
        assert_eq!(der_unsigned(u64::MAX).len(), 11);
    }

    #[test]
    fn test_long_form_length() {
        let mut out = Vec::new();
        der_length(300, &mut out);
        assert_eq!(out, vec![0x82, 0x01, 0x2c]);
    }

    #[test]
    fn test_response_status() {
        // TimeStampResp { PKIStatusInfo { status 0 } }
        assert_eq!(response_status(&[0x30, 0x05, 0x30, 0x03, 0x02, 0x01, 0x00]), Some(0));
        assert_eq!(response_status(&[0x30, 0x05, 0x30, 0x03, 0x02, 0x01, 0x02]), Some(2));
        assert_eq!(response_status(b"<html>"), None);
        assert_eq!(response_status(&[]), None);
    }
}
