use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::vendor::ProoferError;

/// Well-known PII keys read by the pipeline. Any other key is carried through untouched.
pub mod fields {
    pub const SSN: &str = "ssn";
    pub const UUID: &str = "uuid";
    pub const UUID_PREFIX: &str = "uuid_prefix";
    pub const SAME_ADDRESS_AS_ID: &str = "same_address_as_id";
    pub const STATE_ID_JURISDICTION: &str = "state_id_jurisdiction";
    pub const THREATMETRIX_SESSION_ID: &str = "threatmetrix_session_id";
    pub const EMAIL: &str = "email";
    pub const REQUEST_IP: &str = "request_ip";

    /// State-ID address field and the residential field it replaces.
    pub const STATE_ID_ADDRESS_MAP: [(&str, &str); 5] = [
        ("identity_doc_address1", "address1"),
        ("identity_doc_address2", "address2"),
        ("identity_doc_city", "city"),
        ("identity_doc_address_state", "state"),
        ("identity_doc_zipcode", "zipcode"),
    ];
}

/// Applicant-supplied verification fields, kept as an open mapping so new form fields
/// flow through to vendors without a schema change. Lives only for one job execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApplicantPii(BTreeMap<String, Value>);

impl ApplicantPii {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String form of a field; non-string scalars are rendered, null is absent.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.0.get(key)? {
            Value::Null => None,
            Value::String(value) => Some(value.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn ssn(&self) -> Option<String> {
        self.get_str(fields::SSN).filter(|ssn| !ssn.trim().is_empty())
    }

    pub fn uuid(&self) -> Option<String> {
        self.get_str(fields::UUID)
    }

    pub fn same_address_as_id(&self) -> bool {
        self.get_str(fields::SAME_ADDRESS_AS_ID).as_deref() == Some("true")
    }

    pub fn state_id_jurisdiction(&self) -> Option<String> {
        self.get_str(fields::STATE_ID_JURISDICTION)
    }

    /// Copy with the state-ID address written over the residential address keys.
    ///
    /// Residential keys are dropped first so a missing state-ID field never leaves a stale
    /// residential value behind.
    pub fn with_state_id_address(&self) -> Self {
        let mut copy = self.0.clone();
        for (_, residential) in fields::STATE_ID_ADDRESS_MAP {
            copy.remove(residential);
        }
        for (state_id, residential) in fields::STATE_ID_ADDRESS_MAP {
            if let Some(value) = copy.remove(state_id) {
                copy.insert(residential.to_string(), value);
            }
        }
        Self(copy)
    }
}

impl FromIterator<(String, Value)> for ApplicantPii {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// The four checks a proofing attempt performs, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofingStage {
    DeviceProfiling,
    ResidentialAddress,
    StateIdAddress,
    StateId,
}

impl ProofingStage {
    pub const ORDERED: [ProofingStage; 4] = [
        ProofingStage::DeviceProfiling,
        ProofingStage::ResidentialAddress,
        ProofingStage::StateIdAddress,
        ProofingStage::StateId,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            ProofingStage::DeviceProfiling => "threatmetrix",
            ProofingStage::ResidentialAddress => "residential_address",
            ProofingStage::StateIdAddress => "resolution",
            ProofingStage::StateId => "state_id",
        }
    }
}

pub mod vendor_names {
    pub const RESOLUTION_CANNOT_PASS: &str = "ResolutionCannotPass";
    pub const RESIDENTIAL_ADDRESS_NOT_REQUIRED: &str = "ResidentialAddressNotRequired";
    pub const UNSUPPORTED_JURISDICTION: &str = "UnsupportedJurisdiction";
    pub const THREATMETRIX_NOT_ENABLED: &str = "ThreatMetrixNotEnabled";
    pub const PLUGIN_PANICKED: &str = "PluginPanicked";
}

/// Outcome of one vendor check in the shape every plugin shares.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofingResult {
    pub success: bool,
    pub vendor_name: String,
    #[serde(default)]
    pub errors: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub exception: Option<String>,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub reference: Option<String>,
    /// Device-profiling review status (`pass`, `review`, `reject`).
    #[serde(default)]
    pub review_status: Option<String>,
    #[serde(default)]
    pub verified_attributes: BTreeSet<String>,
}

impl ProofingResult {
    pub fn passed(vendor_name: impl Into<String>) -> Self {
        Self {
            success: true,
            vendor_name: vendor_name.into(),
            ..Self::default()
        }
    }

    pub fn failed(vendor_name: impl Into<String>, errors: BTreeMap<String, Vec<String>>) -> Self {
        Self {
            success: false,
            vendor_name: vendor_name.into(),
            errors,
            ..Self::default()
        }
    }

    /// Stage that was deliberately skipped and must not count against the applicant.
    pub fn not_required(vendor_name: impl Into<String>) -> Self {
        Self::passed(vendor_name)
    }

    /// Returned instead of calling a vendor whose prerequisite check failed.
    pub fn resolution_cannot_pass() -> Self {
        Self::failed(vendor_names::RESOLUTION_CANNOT_PASS, BTreeMap::new())
    }

    pub fn from_vendor_error(vendor_name: impl Into<String>, error: &ProoferError) -> Self {
        Self {
            success: false,
            vendor_name: vendor_name.into(),
            exception: Some(error.to_string()),
            timed_out: error.is_timeout(),
            ..Self::default()
        }
    }

    pub fn with_transaction_id(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }

    pub fn is_exception(&self) -> bool {
        self.exception.is_some()
    }
}

/// Results of every stage of one attempt, one slot per stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofingResults {
    pub device_profiling_result: ProofingResult,
    pub residential_resolution_result: ProofingResult,
    pub resolution_result: ProofingResult,
    pub state_id_result: ProofingResult,
}

impl ProofingResults {
    pub fn get(&self, stage: ProofingStage) -> &ProofingResult {
        match stage {
            ProofingStage::DeviceProfiling => &self.device_profiling_result,
            ProofingStage::ResidentialAddress => &self.residential_resolution_result,
            ProofingStage::StateIdAddress => &self.resolution_result,
            ProofingStage::StateId => &self.state_id_result,
        }
    }
}

/// Slots filled while the orchestrator walks the plugin list. Each stage writes once.
#[derive(Debug, Clone, Default)]
pub struct StageResults {
    slots: BTreeMap<ProofingStage, ProofingResult>,
}

impl StageResults {
    pub fn get(&self, stage: ProofingStage) -> Option<&ProofingResult> {
        self.slots.get(&stage)
    }

    /// Returns `false` (and keeps the first value) if the slot was already written.
    pub fn record(&mut self, stage: ProofingStage, result: ProofingResult) -> bool {
        if self.slots.contains_key(&stage) {
            return false;
        }
        self.slots.insert(stage, result);
        true
    }

    pub(crate) fn into_results(mut self) -> ProofingResults {
        let mut take = |stage: ProofingStage| {
            self.slots.remove(&stage).unwrap_or_else(|| {
                let mut errors = BTreeMap::new();
                errors.insert(stage.label().to_string(), vec!["not performed".to_string()]);
                ProofingResult::failed("NotPerformed", errors)
            })
        };
        ProofingResults {
            device_profiling_result: take(ProofingStage::DeviceProfiling),
            residential_resolution_result: take(ProofingStage::ResidentialAddress),
            resolution_result: take(ProofingStage::StateIdAddress),
            state_id_result: take(ProofingStage::StateId),
        }
    }
}

/// Telemetry-only summary of one attempt. Never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CallbackLogData {
    pub result: serde_json::Map<String, Value>,
    pub resolution_success: bool,
    pub residential_resolution_success: bool,
    pub state_id_success: bool,
    pub device_profiling_success: bool,
}
