//! Background jobs: the primary resolution-proofing job, its shadow-mode companion, and
//! the queue envelope both travel in.

pub mod encryption;
pub mod events;
pub mod payload;
pub mod queue;
mod resolution_proofing;
mod shadow_mode;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use chrono::{DateTime, Utc};

pub use encryption::{ArgumentDecryptor, BackgroundProofingArgEncryptor, EncryptionError};
pub use events::{
    JobEvent, ProofResolutionEvent, ProofingTelemetry, ShadowModeComparisonEvent,
    ThreatMetrixEvent, TracingTelemetry,
};
pub use payload::{
    DecryptedProofingArguments, ResolutionProofingJobArgs, ShadowModeProofingJobArgs,
};
pub use queue::{ChannelJobQueue, JobEnvelope, JobQueue, QueueError, QueuedJob};
pub use resolution_proofing::{ProofingCollaborators, ResolutionProofingJob};
pub use shadow_mode::{ShadowModePolicy, ShadowModeProofingJob};

use crate::accounts::{RepositoryError, UserId};
use crate::config::ProofingConfig;
use crate::proofing::VendorSet;
use crate::result_store::{ResultId, ResultStoreError, StoreOutcome};

/// Errors that abort a whole attempt. Per-check vendor failures never surface here.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("failed to decrypt proofing arguments: {0}")]
    Decrypt(#[from] EncryptionError),
    #[error("decrypted proofing arguments are malformed: {0}")]
    MalformedArguments(#[source] serde_json::Error),
    #[error("user {0:?} not found")]
    UserNotFound(UserId),
    #[error("account lookup failed: {0}")]
    Accounts(#[from] RepositoryError),
    #[error("applicant pii has no ssn")]
    MissingSsn,
    #[error("duplicate ssn search failed: {0}")]
    DuplicateCheck(#[source] RepositoryError),
    #[error("result store write failed: {0}")]
    ResultStore(#[from] ResultStoreError),
}

impl JobError {
    /// Whether the queue should deliver the job again.
    pub fn is_retryable(&self) -> bool {
        match self {
            JobError::Decrypt(_) | JobError::Accounts(_) | JobError::DuplicateCheck(_) => true,
            JobError::ResultStore(ResultStoreError::Unavailable(_)) => true,
            JobError::ResultStore(ResultStoreError::SlotNotFound(_))
            | JobError::MalformedArguments(_)
            | JobError::UserNotFound(_)
            | JobError::MissingSsn => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// Too old to act on; nothing was called or written.
    Discarded { age: chrono::Duration },
    Persisted {
        result_id: ResultId,
        success: bool,
        ssn_is_unique: bool,
        store_outcome: StoreOutcome,
        shadow_enqueued: bool,
    },
    ShadowCompared {
        result_id: ResultId,
        vendor_name: String,
        success: bool,
    },
}

impl JobOutcome {
    pub const fn label(&self) -> &'static str {
        match self {
            JobOutcome::Discarded { .. } => "discarded",
            JobOutcome::Persisted { .. } => "persisted",
            JobOutcome::ShadowCompared { .. } => "shadow_compared",
        }
    }
}

/// Dispatches queued envelopes to the job that handles them.
#[derive(Debug)]
pub struct JobRunner {
    resolution: ResolutionProofingJob,
    shadow_mode: ShadowModeProofingJob,
    max_attempts: u32,
}

impl JobRunner {
    pub fn new(
        collaborators: ProofingCollaborators,
        config: &ProofingConfig,
        vendors: &VendorSet,
    ) -> Self {
        let shadow_mode = ShadowModeProofingJob::new(
            collaborators.decryptor.clone(),
            collaborators.accounts.clone(),
            collaborators.results.clone(),
            collaborators.telemetry.clone(),
            Arc::clone(&vendors.socure_id_plus),
            collaborators.costs.clone(),
        );
        Self {
            resolution: ResolutionProofingJob::new(collaborators, config, vendors),
            shadow_mode,
            max_attempts: config.job_max_attempts,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// True when a failed envelope should be re-enqueued.
    pub fn should_retry(&self, envelope: &JobEnvelope, error: &JobError) -> bool {
        error.is_retryable() && envelope.attempts + 1 < self.max_attempts
    }

    pub fn run(&self, envelope: &JobEnvelope, now: DateTime<Utc>) -> Result<JobOutcome, JobError> {
        match &envelope.job {
            QueuedJob::ResolutionProofing(args) => {
                self.resolution.perform(args, envelope.enqueued_at, now)
            }
            QueuedJob::ShadowModeProofing(args) => {
                let result = self.shadow_mode.perform(args)?;
                Ok(JobOutcome::ShadowCompared {
                    result_id: args.document_capture_session_result_id.clone(),
                    vendor_name: result.vendor_name,
                    success: result.success,
                })
            }
        }
    }
}
