use std::sync::Arc;

use crate::proofing::cost::{CostRecorder, SpCostToken};
use crate::proofing::domain::{vendor_names, ProofingResult, ProofingStage, StageResults};
use crate::proofing::timer::Timer;
use crate::proofing::vendor::Proofer;

use super::{ProofingCheck, ProofingRequest, VendorBinding};

/// Resolution against the self-reported residential address. Only in-person proofing
/// collects a residential address separate from the ID, so other flows skip the call.
#[derive(Debug, Clone)]
pub struct ResidentialAddressPlugin {
    vendor: VendorBinding,
}

impl ResidentialAddressPlugin {
    pub fn new(proofer: Arc<dyn Proofer>, costs: Arc<dyn CostRecorder>) -> Self {
        Self {
            vendor: VendorBinding {
                proofer,
                costs,
                sp_cost_token: SpCostToken::LexisNexisResolution,
            },
        }
    }
}

impl ProofingCheck for ResidentialAddressPlugin {
    fn stage(&self) -> ProofingStage {
        ProofingStage::ResidentialAddress
    }

    fn call(
        &self,
        request: &ProofingRequest<'_>,
        _prior: &StageResults,
        timer: &mut Timer,
    ) -> ProofingResult {
        if !request.ipp_enrollment_in_progress {
            return ProofingResult::not_required(vendor_names::RESIDENTIAL_ADDRESS_NOT_REQUIRED);
        }

        self.vendor.invoke(
            request.applicant_pii,
            request,
            self.stage().label(),
            timer,
        )
    }
}
