use std::collections::BTreeSet;
use std::sync::Arc;

use crate::proofing::cost::{CostRecorder, SpCostToken};
use crate::proofing::domain::{vendor_names, ProofingResult, ProofingStage, StageResults};
use crate::proofing::timer::Timer;
use crate::proofing::vendor::Proofer;

use super::{ProofingCheck, ProofingRequest, VendorBinding};

/// State-issued ID validation (AAMVA DLDV).
#[derive(Debug, Clone)]
pub struct StateIdPlugin {
    vendor: VendorBinding,
    supported_jurisdictions: BTreeSet<String>,
}

impl StateIdPlugin {
    pub fn new(
        proofer: Arc<dyn Proofer>,
        costs: Arc<dyn CostRecorder>,
        supported_jurisdictions: BTreeSet<String>,
    ) -> Self {
        Self {
            vendor: VendorBinding {
                proofer,
                costs,
                sp_cost_token: SpCostToken::Aamva,
            },
            supported_jurisdictions,
        }
    }

    fn jurisdiction_supported(&self, jurisdiction: Option<&str>) -> bool {
        jurisdiction
            .map(|code| code.trim().to_ascii_uppercase())
            .is_some_and(|code| self.supported_jurisdictions.contains(&code))
    }
}

impl ProofingCheck for StateIdPlugin {
    fn stage(&self) -> ProofingStage {
        ProofingStage::StateId
    }

    fn call(
        &self,
        request: &ProofingRequest<'_>,
        prior: &StageResults,
        timer: &mut Timer,
    ) -> ProofingResult {
        let resolution_passed = prior
            .get(ProofingStage::StateIdAddress)
            .is_some_and(|result| result.success);
        if !resolution_passed {
            return ProofingResult::resolution_cannot_pass();
        }

        let jurisdiction = request.applicant_pii.state_id_jurisdiction();
        if !self.jurisdiction_supported(jurisdiction.as_deref()) {
            return ProofingResult::not_required(vendor_names::UNSUPPORTED_JURISDICTION);
        }

        self.vendor.invoke(
            request.applicant_pii,
            request,
            self.stage().label(),
            timer,
        )
    }
}
