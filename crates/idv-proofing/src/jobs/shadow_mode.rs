use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::accounts::{AccountDirectory, User};
use crate::proofing::{
    AdjudicatedResult, CostRecorder, ProofingRequest, ProofingResult, Proofer,
    StateIdAddressPlugin, Timer,
};
use crate::result_store::{ProofingSlot, ResultStore};

use super::encryption::ArgumentDecryptor;
use super::events::{JobEvent, ProofingTelemetry, ShadowModeComparisonEvent};
use super::payload::{DecryptedProofingArguments, ShadowModeProofingJobArgs};
use super::JobError;

const EXPERIMENT_NAME: &str = "socure_idv_shadow_mode";
const RESIDENTIAL_NOT_CHECKED: &str = "ShadowModeResidentialNotChecked";

/// Deterministic per-user enrollment in the alternate-vendor comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowModePolicy {
    pub enabled: bool,
    /// 0..=100
    pub percent: u8,
}

impl ShadowModePolicy {
    pub fn new(enabled: bool, percent: u8) -> Self {
        Self {
            enabled,
            percent: percent.min(100),
        }
    }

    /// Stable bucket in `0..100` derived only from the user uuid.
    pub fn bucket(user_uuid: &str) -> u8 {
        let digest = Sha256::new()
            .chain_update(EXPERIMENT_NAME.as_bytes())
            .chain_update(b":")
            .chain_update(user_uuid.as_bytes())
            .finalize();
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % 100) as u8
    }

    pub fn enabled_for(&self, user: &User) -> bool {
        self.enabled && Self::bucket(&user.uuid) < self.percent
    }
}

/// Re-runs state-ID address resolution against the alternate vendor and compares it with
/// the stored primary verdict. Never writes to the result store.
pub struct ShadowModeProofingJob {
    decryptor: Arc<dyn ArgumentDecryptor>,
    accounts: Arc<dyn AccountDirectory>,
    results: Arc<dyn ResultStore>,
    telemetry: Arc<dyn ProofingTelemetry>,
    plugin: StateIdAddressPlugin,
}

impl ShadowModeProofingJob {
    pub fn new(
        decryptor: Arc<dyn ArgumentDecryptor>,
        accounts: Arc<dyn AccountDirectory>,
        results: Arc<dyn ResultStore>,
        telemetry: Arc<dyn ProofingTelemetry>,
        alternate_vendor: Arc<dyn Proofer>,
        costs: Arc<dyn CostRecorder>,
    ) -> Self {
        Self {
            decryptor,
            accounts,
            results,
            telemetry,
            plugin: StateIdAddressPlugin::socure(alternate_vendor, costs),
        }
    }

    pub fn perform(&self, args: &ShadowModeProofingJobArgs) -> Result<ProofingResult, JobError> {
        let plaintext = self.decryptor.decrypt(&args.encrypted_arguments)?;
        let decrypted: DecryptedProofingArguments =
            serde_json::from_str(&plaintext).map_err(JobError::MalformedArguments)?;

        let current_sp = match args.service_provider_issuer.as_deref() {
            Some(issuer) => self.accounts.find_service_provider(issuer)?,
            None => None,
        };

        let request = ProofingRequest {
            applicant_pii: &decrypted.applicant_pii,
            user_email: &args.user_email,
            threatmetrix_session_id: None,
            request_ip: None,
            ipp_enrollment_in_progress: false,
            current_sp: current_sp.as_ref(),
            attempt_id: Some(&args.document_capture_session_result_id.0),
        };
        let residential = ProofingResult::not_required(RESIDENTIAL_NOT_CHECKED);
        let mut timer = Timer::new();
        let shadow = self.plugin.proof_with(&request, &residential, &mut timer);

        let primary_success = match self.results.load(&args.document_capture_session_result_id) {
            Ok(ProofingSlot::Complete(map)) => AdjudicatedResult::from_map(map)
                .map(|result| result.success)
                .map_err(|error| {
                    tracing::warn!(%error, "stored proofing result is not readable");
                })
                .ok(),
            Ok(ProofingSlot::Pending) => None,
            Err(error) => {
                tracing::warn!(%error, "primary proofing result unavailable for comparison");
                None
            }
        };

        self.telemetry
            .emit(JobEvent::ShadowModeComparison(ShadowModeComparisonEvent {
                result_id: args.document_capture_session_result_id.clone(),
                user_uuid: args.user_uuid.clone(),
                vendor_name: shadow.vendor_name.clone(),
                shadow_success: shadow.success,
                primary_success,
                agrees: primary_success.map(|primary| primary == shadow.success),
                timing: timer.results().clone(),
            }));

        Ok(shadow)
    }
}

impl std::fmt::Debug for ShadowModeProofingJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowModeProofingJob")
            .field("plugin", &self.plugin)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::UserId;

    fn user(uuid: &str) -> User {
        User {
            id: UserId(1),
            uuid: uuid.to_string(),
            last_sign_in_email: "applicant@example.com".to_string(),
            profile_id: None,
        }
    }

    #[test]
    fn bucket_is_stable_and_bounded() {
        let first = ShadowModePolicy::bucket("5d1a4c1e-7c3b-4ad5-8f3b-2f7d2a0f9b11");
        let second = ShadowModePolicy::bucket("5d1a4c1e-7c3b-4ad5-8f3b-2f7d2a0f9b11");
        assert_eq!(first, second);
        assert!(first < 100);
    }

    #[test]
    fn disabled_or_zero_percent_never_enrolls() {
        let applicant = user("any-uuid");
        assert!(!ShadowModePolicy::new(false, 100).enabled_for(&applicant));
        assert!(!ShadowModePolicy::new(true, 0).enabled_for(&applicant));
        assert!(ShadowModePolicy::new(true, 100).enabled_for(&applicant));
    }

    #[test]
    fn percent_is_clamped() {
        assert_eq!(ShadowModePolicy::new(true, 250).percent, 100);
    }
}
