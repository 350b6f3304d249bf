use std::collections::BTreeMap;
use std::sync::Arc;

use crate::proofing::cost::{CostRecorder, SpCostToken};
use crate::proofing::domain::{
    fields, vendor_names, ProofingResult, ProofingStage, StageResults,
};
use crate::proofing::timer::Timer;
use crate::proofing::vendor::Proofer;

use super::{ProofingCheck, ProofingRequest, VendorBinding};

pub const REVIEW_STATUS_PASS: &str = "pass";
pub const REVIEW_STATUS_REJECT: &str = "reject";

/// Device-profiling and fraud-risk scoring.
#[derive(Debug, Clone)]
pub struct ThreatMetrixPlugin {
    vendor: VendorBinding,
    enabled: bool,
}

impl ThreatMetrixPlugin {
    pub fn new(proofer: Arc<dyn Proofer>, costs: Arc<dyn CostRecorder>, enabled: bool) -> Self {
        Self {
            vendor: VendorBinding {
                proofer,
                costs,
                sp_cost_token: SpCostToken::Threatmetrix,
            },
            enabled,
        }
    }
}

impl ProofingCheck for ThreatMetrixPlugin {
    fn stage(&self) -> ProofingStage {
        ProofingStage::DeviceProfiling
    }

    fn call(
        &self,
        request: &ProofingRequest<'_>,
        _prior: &StageResults,
        timer: &mut Timer,
    ) -> ProofingResult {
        if !self.enabled {
            let mut result = ProofingResult::not_required(vendor_names::THREATMETRIX_NOT_ENABLED);
            result.review_status = Some(REVIEW_STATUS_PASS.to_string());
            return result;
        }

        let Some(session_id) = request.threatmetrix_session_id.filter(|id| !id.is_empty())
        else {
            let mut errors = BTreeMap::new();
            errors.insert(
                "threatmetrix_session_id".to_string(),
                vec!["session id is missing".to_string()],
            );
            let mut result = ProofingResult::failed(self.vendor.proofer.vendor_name(), errors);
            result.review_status = Some(REVIEW_STATUS_REJECT.to_string());
            return result;
        };

        let mut pii = request.applicant_pii.clone();
        pii.insert(fields::THREATMETRIX_SESSION_ID, session_id);
        pii.insert(fields::EMAIL, request.user_email);
        if let Some(ip) = request.request_ip {
            pii.insert(fields::REQUEST_IP, ip);
        }

        let mut result =
            self.vendor
                .invoke(&pii, request, self.stage().label(), timer);

        // Only an explicit pass clears device profiling.
        let passed = result.review_status.as_deref() == Some(REVIEW_STATUS_PASS);
        result.success = result.success && passed;
        if result.review_status.is_none() {
            result.review_status = Some(REVIEW_STATUS_REJECT.to_string());
        }
        result
    }
}
