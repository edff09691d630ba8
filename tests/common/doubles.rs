//! Fake network collaborators

use async_trait::async_trait;
use evidence_acquisition::error::{AcquisitionError, Result};
use evidence_acquisition::tasks::{CertifiedMailer, PecMessage, TimestampAuthority};
use parking_lot::Mutex;

pub const FAKE_TSA_CERTIFICATE: &[u8] = b"-----BEGIN CERTIFICATE-----\nFAKE\n-----END CERTIFICATE-----\n";
pub const FAKE_TSA_RESPONSE: &[u8] = &[0x30, 0x05, 0x30, 0x03, 0x02, 0x01, 0x00];

/// Authority answering every request with fixed bytes
#[derive(Debug, Default)]
pub struct FakeTimestampAuthority {
    pub fail: bool,
    pub digests: Mutex<Vec<Vec<u8>>>,
}

impl FakeTimestampAuthority {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait]
impl TimestampAuthority for FakeTimestampAuthority {
    async fn fetch_certificate(&self) -> Result<Vec<u8>> {
        if self.fail {
            return Err(AcquisitionError::TimestampAuthority("unreachable".into()));
        }
        Ok(FAKE_TSA_CERTIFICATE.to_vec())
    }

    async fn request_timestamp(&self, digest: &[u8]) -> Result<Vec<u8>> {
        self.digests.lock().push(digest.to_vec());
        Ok(FAKE_TSA_RESPONSE.to_vec())
    }

    fn describe(&self) -> String {
        "fake-tsa".to_string()
    }
}

/// Mailer that delivers the receipt on the first poll
#[derive(Debug, Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<PecMessage>>,
}

#[async_trait]
impl CertifiedMailer for FakeMailer {
    async fn send(&self, message: &PecMessage) -> Result<()> {
        self.sent.lock().push(message.clone());
        Ok(())
    }

    async fn retrieve_receipt(&self, message: &PecMessage) -> Result<Option<Vec<u8>>> {
        Ok(Some(format!("Subject: POSTA CERTIFICATA: {}\r\n\r\n", message.subject).into_bytes()))
    }
}
