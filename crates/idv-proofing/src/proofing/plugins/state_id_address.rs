use std::sync::Arc;

use crate::proofing::cost::{CostRecorder, SpCostToken};
use crate::proofing::domain::{ProofingResult, ProofingStage, StageResults};
use crate::proofing::timer::Timer;
use crate::proofing::vendor::Proofer;

use super::{ProofingCheck, ProofingRequest, VendorBinding};

/// Identity resolution against the address printed on the applicant's state ID.
///
/// The address-equivalence and failed-prerequisite short-circuits live here once; vendors
/// only differ in the [`VendorBinding`] handed to the constructor.
#[derive(Debug, Clone)]
pub struct StateIdAddressPlugin {
    vendor: VendorBinding,
}

impl StateIdAddressPlugin {
    pub fn new(
        proofer: Arc<dyn Proofer>,
        costs: Arc<dyn CostRecorder>,
        sp_cost_token: SpCostToken,
    ) -> Self {
        Self {
            vendor: VendorBinding {
                proofer,
                costs,
                sp_cost_token,
            },
        }
    }

    /// LexisNexis InstantVerify binding.
    pub fn lexis_nexis(proofer: Arc<dyn Proofer>, costs: Arc<dyn CostRecorder>) -> Self {
        Self::new(proofer, costs, SpCostToken::LexisNexisResolution)
    }

    /// Socure ID+ binding.
    pub fn socure(proofer: Arc<dyn Proofer>, costs: Arc<dyn CostRecorder>) -> Self {
        Self::new(proofer, costs, SpCostToken::SocureResolution)
    }

    pub fn sp_cost_token(&self) -> SpCostToken {
        self.vendor.sp_cost_token
    }

    /// Run the check against an explicit residential result. Used directly by the shadow
    /// job, which has no orchestrator slots.
    pub fn proof_with(
        &self,
        request: &ProofingRequest<'_>,
        residential_address_resolution_result: &ProofingResult,
        timer: &mut Timer,
    ) -> ProofingResult {
        let pii = request.applicant_pii;

        if pii.same_address_as_id() && request.ipp_enrollment_in_progress {
            return residential_address_resolution_result.clone();
        }

        if !residential_address_resolution_result.success {
            return ProofingResult::resolution_cannot_pass();
        }

        if request.ipp_enrollment_in_progress {
            let with_state_id_address = pii.with_state_id_address();
            self.vendor.invoke(
                &with_state_id_address,
                request,
                ProofingStage::StateIdAddress.label(),
                timer,
            )
        } else {
            self.vendor.invoke(
                pii,
                request,
                ProofingStage::StateIdAddress.label(),
                timer,
            )
        }
    }
}

impl ProofingCheck for StateIdAddressPlugin {
    fn stage(&self) -> ProofingStage {
        ProofingStage::StateIdAddress
    }

    fn call(
        &self,
        request: &ProofingRequest<'_>,
        prior: &StageResults,
        timer: &mut Timer,
    ) -> ProofingResult {
        match prior.get(ProofingStage::ResidentialAddress) {
            Some(residential) => self.proof_with(request, residential, timer),
            None => ProofingResult::resolution_cannot_pass(),
        }
    }
}
