use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::accounts::{AccountDirectory, ServiceProvider, User};
use crate::config::ProofingConfig;
use crate::duplicates::{
    ConfirmationRepository, DuplicateProfileChecker, DuplicateSsnFinder, ProfileRepository,
};
use crate::fingerprint::Fingerprinter;
use crate::proofing::domain::fields;
use crate::proofing::{
    CostRecorder, ProgressiveProofer, ProofingRequest, ResultsAggregate, VendorSet,
};
use crate::result_store::{ResultStore, StoreOutcome};

use super::encryption::ArgumentDecryptor;
use super::events::{JobEvent, ProofResolutionLog, ProofingTelemetry, ThreatMetrixEvent};
use super::payload::{
    DecryptedProofingArguments, ResolutionProofingJobArgs, ShadowModeProofingJobArgs,
};
use super::queue::{JobEnvelope, JobQueue, QueuedJob};
use super::shadow_mode::ShadowModePolicy;
use super::{JobError, JobOutcome};

/// Ports the primary job reads from and writes to.
#[derive(Clone)]
pub struct ProofingCollaborators {
    pub decryptor: Arc<dyn ArgumentDecryptor>,
    pub accounts: Arc<dyn AccountDirectory>,
    pub profiles: Arc<dyn ProfileRepository>,
    pub confirmations: Arc<dyn ConfirmationRepository>,
    pub results: Arc<dyn ResultStore>,
    pub queue: Arc<dyn JobQueue>,
    pub telemetry: Arc<dyn ProofingTelemetry>,
    pub costs: Arc<dyn CostRecorder>,
}

/// One proofing attempt: staleness gate, decrypt, proof, duplicate search, persist, and
/// the optional shadow-mode dispatch.
pub struct ResolutionProofingJob {
    collaborators: ProofingCollaborators,
    proofer: ProgressiveProofer,
    fingerprinter: Fingerprinter,
    duplicate_checker: DuplicateProfileChecker,
    shadow_mode: ShadowModePolicy,
    stale_job_timeout: Duration,
}

impl ResolutionProofingJob {
    pub fn new(
        collaborators: ProofingCollaborators,
        config: &ProofingConfig,
        vendors: &VendorSet,
    ) -> Self {
        let proofer = vendors.progressive_proofer(config, collaborators.costs.clone());
        let duplicate_checker = DuplicateProfileChecker::new(
            collaborators.confirmations.clone(),
            config.eligible_one_account_providers.iter().cloned(),
        );

        Self {
            proofer,
            fingerprinter: config.fingerprinter(),
            duplicate_checker,
            shadow_mode: ShadowModePolicy::new(
                config.shadow_mode_enabled,
                config.shadow_mode_percent,
            ),
            stale_job_timeout: config.stale_job_timeout,
            collaborators,
        }
    }

    pub fn is_stale(&self, enqueued_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now.signed_duration_since(enqueued_at)
            .to_std()
            .is_ok_and(|age| age > self.stale_job_timeout)
    }

    /// Run the attempt. Exactly one `ProofResolution` event is emitted per call, whatever
    /// the exit path.
    pub fn perform(
        &self,
        args: &ResolutionProofingJobArgs,
        enqueued_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<JobOutcome, JobError> {
        let mut log =
            ProofResolutionLog::start(self.collaborators.telemetry.as_ref(), &args.trace_id);

        if self.is_stale(enqueued_at, now) {
            let age = now.signed_duration_since(enqueued_at);
            tracing::warn!(
                trace_id = %args.trace_id,
                result_id = %args.result_id,
                age_seconds = age.num_seconds(),
                "discarding stale proofing job"
            );
            log.finish("discarded");
            return Ok(JobOutcome::Discarded { age });
        }

        let plaintext = self
            .collaborators
            .decryptor
            .decrypt(&args.encrypted_arguments)?;
        let decrypted: DecryptedProofingArguments =
            serde_json::from_str(&plaintext).map_err(JobError::MalformedArguments)?;

        let user = self
            .collaborators
            .accounts
            .find_user(args.user_id)?
            .ok_or(JobError::UserNotFound(args.user_id))?;
        let current_sp = match args.service_provider_issuer.as_deref() {
            Some(issuer) => self.collaborators.accounts.find_service_provider(issuer)?,
            None => None,
        };

        let mut applicant_pii = decrypted.applicant_pii;
        applicant_pii.insert(
            fields::UUID_PREFIX,
            current_sp.as_ref().and_then(|sp| sp.app_id.clone()),
        );
        applicant_pii.insert(fields::UUID, user.uuid.clone());
        let ssn = applicant_pii.ssn().ok_or(JobError::MissingSsn)?;

        let request = ProofingRequest {
            applicant_pii: &applicant_pii,
            user_email: &user.last_sign_in_email,
            threatmetrix_session_id: args.threatmetrix_session_id.as_deref(),
            request_ip: args.request_ip.as_deref(),
            ipp_enrollment_in_progress: args.ipp_enrollment_in_progress,
            current_sp: current_sp.as_ref(),
            attempt_id: Some(&args.result_id.0),
        };
        let aggregate = self.proofer.proof(&request, log.timer());
        log.record_callback(aggregate.callback_log_data());

        self.log_threatmetrix_info(&user, &aggregate);

        let ssn_is_unique = self.ssn_is_unique(&user, current_sp.as_ref(), &ssn, now)?;

        let mut adjudicated_result = aggregate.adjudicated_result;
        adjudicated_result.ssn_is_unique = Some(ssn_is_unique);
        let success = adjudicated_result.success;

        let store_outcome = self
            .collaborators
            .results
            .store_proofing_result(&args.result_id, adjudicated_result.to_map())?;
        if store_outcome == StoreOutcome::AlreadyStored {
            tracing::info!(
                trace_id = %args.trace_id,
                result_id = %args.result_id,
                "proofing result already stored; keeping the first write"
            );
        }
        log.finish("persisted");

        let shadow_enqueued = self.enqueue_shadow_mode_job(args, &user, now);

        Ok(JobOutcome::Persisted {
            result_id: args.result_id.clone(),
            success,
            ssn_is_unique,
            store_outcome,
            shadow_enqueued,
        })
    }

    fn log_threatmetrix_info(&self, user: &User, aggregate: &ResultsAggregate) {
        let device = &aggregate.results.device_profiling_result;
        self.collaborators
            .telemetry
            .emit(JobEvent::ThreatMetrix(ThreatMetrixEvent {
                user_id: user.uuid.clone(),
                threatmetrix_request_id: device.transaction_id.clone(),
                threatmetrix_success: device.success,
            }));
    }

    /// A failed search is fatal; only confirmation bookkeeping is allowed to fail quietly.
    fn ssn_is_unique(
        &self,
        user: &User,
        current_sp: Option<&ServiceProvider>,
        ssn: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, JobError> {
        let finder =
            DuplicateSsnFinder::new(&self.fingerprinter, self.collaborators.profiles.as_ref());
        let matches = finder
            .associated_matches(user.id, ssn)
            .map_err(JobError::DuplicateCheck)?;

        if matches.is_empty() {
            return Ok(true);
        }

        match self
            .duplicate_checker
            .check_for_duplicate_profiles(user, current_sp, &matches, now)
        {
            Ok(Some(outcome)) => {
                tracing::info!(user_uuid = %user.uuid, ?outcome, "duplicate profiles recorded");
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(user_uuid = %user.uuid, %error, "failed to record duplicate profiles");
            }
        }

        Ok(false)
    }

    fn enqueue_shadow_mode_job(
        &self,
        args: &ResolutionProofingJobArgs,
        user: &User,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.shadow_mode.enabled_for(user) {
            return false;
        }

        let job = QueuedJob::ShadowModeProofing(ShadowModeProofingJobArgs {
            document_capture_session_result_id: args.result_id.clone(),
            encrypted_arguments: args.encrypted_arguments.clone(),
            service_provider_issuer: args.service_provider_issuer.clone(),
            user_email: user.last_sign_in_email.clone(),
            user_uuid: user.uuid.clone(),
        });

        match self.collaborators.queue.enqueue(JobEnvelope::new(job, now)) {
            Ok(()) => true,
            Err(error) => {
                tracing::warn!(result_id = %args.result_id, %error, "failed to enqueue shadow mode job");
                false
            }
        }
    }
}

impl std::fmt::Debug for ResolutionProofingJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolutionProofingJob")
            .field("rule", &self.proofer.rule())
            .field("shadow_mode", &self.shadow_mode)
            .field("stale_job_timeout", &self.stale_job_timeout)
            .finish_non_exhaustive()
    }
}
