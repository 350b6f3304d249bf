use std::time::Duration;

use super::domain::{ApplicantPii, ProofingResult};

/// Transport-level client for one vendor. Implementations own their own timeouts and
/// report them as [`ProoferError::Timeout`] rather than blocking the worker.
pub trait Proofer: Send + Sync {
    fn vendor_name(&self) -> &str;
    fn proof(&self, applicant_pii: &ApplicantPii) -> Result<ProofingResult, ProoferError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProoferError {
    #[error("{vendor} timed out after {}ms", .after.as_millis())]
    Timeout { vendor: String, after: Duration },
    #[error("{vendor} responded with HTTP {status}")]
    Http { vendor: String, status: u16 },
    #[error("{vendor} returned a malformed response: {detail}")]
    Malformed { vendor: String, detail: String },
    #[error("{vendor} unavailable: {detail}")]
    Unavailable { vendor: String, detail: String },
}

impl ProoferError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProoferError::Timeout { .. })
    }
}
