use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::accounts::UserId;
use crate::proofing::ApplicantPii;
use crate::result_store::ResultId;

/// Inbound payload of the primary proofing job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionProofingJobArgs {
    pub result_id: ResultId,
    pub encrypted_arguments: String,
    pub trace_id: String,
    pub ipp_enrollment_in_progress: bool,
    pub user_id: UserId,
    #[serde(default)]
    pub service_provider_issuer: Option<String>,
    #[serde(default)]
    pub threatmetrix_session_id: Option<String>,
    #[serde(default)]
    pub request_ip: Option<String>,
}

/// Plaintext behind `encrypted_arguments`. Extra context keys are kept but unused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecryptedProofingArguments {
    pub applicant_pii: ApplicantPii,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Payload of the out-of-band comparison job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowModeProofingJobArgs {
    pub document_capture_session_result_id: ResultId,
    pub encrypted_arguments: String,
    #[serde(default)]
    pub service_provider_issuer: Option<String>,
    pub user_email: String,
    pub user_uuid: String,
}
