//! One plugin per proofing stage. Each wraps a vendor [`Proofer`] and translates its
//! response (or failure) into the shared [`ProofingResult`] shape.

mod residential_address;
mod state_id;
mod state_id_address;
pub(crate) mod threatmetrix;

pub use residential_address::ResidentialAddressPlugin;
pub use state_id::StateIdPlugin;
pub use state_id_address::StateIdAddressPlugin;
pub use threatmetrix::ThreatMetrixPlugin;

use crate::accounts::ServiceProvider;

use super::cost::{add_sp_cost, CostRecorder, SpCostToken};
use super::domain::{ApplicantPii, ProofingResult, ProofingStage, StageResults};
use super::timer::Timer;
use super::vendor::Proofer;

/// Per-attempt inputs shared by every plugin.
#[derive(Debug, Clone, Copy)]
pub struct ProofingRequest<'a> {
    pub applicant_pii: &'a ApplicantPii,
    pub user_email: &'a str,
    pub threatmetrix_session_id: Option<&'a str>,
    pub request_ip: Option<&'a str>,
    pub ipp_enrollment_in_progress: bool,
    pub current_sp: Option<&'a ServiceProvider>,
    /// Identifies the proofing attempt for billing. Redeliveries of the same attempt
    /// share it, so their repeated vendor transactions are billed once.
    pub attempt_id: Option<&'a str>,
}

/// A single proofing check. `prior` holds the results of stages that already ran.
pub trait ProofingCheck: Send + Sync {
    fn stage(&self) -> ProofingStage;

    fn call(
        &self,
        request: &ProofingRequest<'_>,
        prior: &StageResults,
        timer: &mut Timer,
    ) -> ProofingResult;
}

/// Vendor binding shared by the plugins: which client to call and what to bill.
#[derive(Clone)]
pub(crate) struct VendorBinding {
    pub(crate) proofer: std::sync::Arc<dyn Proofer>,
    pub(crate) costs: std::sync::Arc<dyn CostRecorder>,
    pub(crate) sp_cost_token: SpCostToken,
}

impl VendorBinding {
    /// Time the vendor call under `bucket`, fold transport errors into a failed result,
    /// and bill the attempt.
    pub(crate) fn invoke(
        &self,
        applicant_pii: &ApplicantPii,
        request: &ProofingRequest<'_>,
        bucket: &str,
        timer: &mut Timer,
    ) -> ProofingResult {
        let result = timer
            .time(bucket, || self.proofer.proof(applicant_pii))
            .unwrap_or_else(|error| {
                tracing::warn!(vendor = self.proofer.vendor_name(), %error, "vendor call failed");
                ProofingResult::from_vendor_error(self.proofer.vendor_name(), &error)
            });

        add_sp_cost(
            self.costs.as_ref(),
            request.current_sp,
            request.attempt_id,
            self.sp_cost_token,
            result.transaction_id.as_deref(),
        );

        result
    }
}

impl std::fmt::Debug for VendorBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorBinding")
            .field("vendor", &self.proofer.vendor_name())
            .field("sp_cost_token", &self.sp_cost_token)
            .finish()
    }
}
