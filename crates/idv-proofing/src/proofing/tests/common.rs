use std::collections::BTreeMap;
use std::sync::Arc;

use crate::accounts::ServiceProvider;
use crate::memory::RecordingCostSink;
use crate::proofing::domain::{fields, ProofingStage, StageResults};
use crate::proofing::mock::{MockFixture, MockProofer, MockVendorConfig, MockVendors};
use crate::proofing::plugins::{ProofingCheck, ProofingRequest};
use crate::proofing::timer::Timer;
use crate::proofing::{ApplicantPii, ProofingResult, ProofingResults};

pub(super) const SSN: &str = "900-12-3456";

pub(super) fn applicant_pii() -> ApplicantPii {
    ApplicantPii::new()
        .with("first_name", "Fakey")
        .with("last_name", "McFakerson")
        .with("dob", "1938-10-06")
        .with(fields::SSN, SSN)
        .with("address1", "1 Fake Rd")
        .with("address2", "Apt 2")
        .with("city", "Great Falls")
        .with("state", "MT")
        .with("zipcode", "59010")
        .with("identity_doc_address1", "123 Way St")
        .with("identity_doc_address2", "Suite 1")
        .with("identity_doc_city", "Arlington")
        .with("identity_doc_address_state", "VA")
        .with("identity_doc_zipcode", "22201")
        .with(fields::STATE_ID_JURISDICTION, "va")
        .with(fields::UUID, "5d1a4c1e-7c3b-4ad5-8f3b-2f7d2a0f9b11")
}

pub(super) fn same_address_pii() -> ApplicantPii {
    applicant_pii().with(fields::SAME_ADDRESS_AS_ID, "true")
}

pub(super) fn service_provider() -> ServiceProvider {
    ServiceProvider {
        issuer: "urn:gov:gsa:openidconnect:sp:test".to_string(),
        app_id: Some("app-123".to_string()),
    }
}

pub(super) fn request<'a>(
    pii: &'a ApplicantPii,
    sp: &'a ServiceProvider,
    ipp_enrollment_in_progress: bool,
) -> ProofingRequest<'a> {
    ProofingRequest {
        applicant_pii: pii,
        user_email: "fakey@example.com",
        threatmetrix_session_id: Some("tmx-session-1"),
        request_ip: Some("192.0.2.10"),
        ipp_enrollment_in_progress,
        current_sp: Some(sp),
        attempt_id: Some("attempt-1"),
    }
}

pub(super) fn mocks(fixture: MockFixture) -> MockVendors {
    MockVendors::new(MockVendorConfig::with_fixture(fixture))
}

pub(super) fn mock(name: &str, fixture: MockFixture) -> Arc<MockProofer> {
    Arc::new(MockProofer::resolution(
        name,
        MockVendorConfig::with_fixture(fixture),
    ))
}

pub(super) fn cost_sink() -> Arc<RecordingCostSink> {
    Arc::new(RecordingCostSink::default())
}

pub(super) fn passing(vendor: &str) -> ProofingResult {
    ProofingResult::passed(vendor).with_transaction_id(format!("{vendor}-tx"))
}

pub(super) fn failing(vendor: &str, field: &str) -> ProofingResult {
    let mut errors = BTreeMap::new();
    errors.insert(field.to_string(), vec!["unverified".to_string()]);
    ProofingResult::failed(vendor, errors)
}

pub(super) fn device_result(review_status: &str) -> ProofingResult {
    let mut result = if review_status == "pass" {
        passing("lexisnexis:threatmetrix")
    } else {
        failing("lexisnexis:threatmetrix", "review_status")
    };
    result.review_status = Some(review_status.to_string());
    result
}

pub(super) fn all_passing_results() -> ProofingResults {
    ProofingResults {
        device_profiling_result: device_result("pass"),
        residential_resolution_result: passing("lexisnexis:instant_verify"),
        resolution_result: passing("lexisnexis:instant_verify"),
        state_id_result: passing("aamva:state_id"),
    }
}

pub(super) fn prior_with(stage: ProofingStage, result: ProofingResult) -> StageResults {
    let mut prior = StageResults::default();
    prior.record(stage, result);
    prior
}

/// Check that panics instead of answering.
pub(super) struct PanickingCheck(pub(super) ProofingStage);

impl ProofingCheck for PanickingCheck {
    fn stage(&self) -> ProofingStage {
        self.0
    }

    fn call(
        &self,
        _request: &ProofingRequest<'_>,
        _prior: &StageResults,
        _timer: &mut Timer,
    ) -> ProofingResult {
        panic!("vendor client bug")
    }
}
