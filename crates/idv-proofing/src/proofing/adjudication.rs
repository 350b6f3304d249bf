use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::domain::{ProofingResult, ProofingResults, ProofingStage};

/// Deployment-selected rule for folding stage results into one verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjudicationRule {
    /// Every stage, device profiling included, must pass.
    #[default]
    AllChecks,
    /// Residential, state-ID address and state-ID stages must pass. Device profiling is
    /// reported but does not decide the verdict.
    IdentityChecks,
}

impl AdjudicationRule {
    pub const fn label(self) -> &'static str {
        match self {
            AdjudicationRule::AllChecks => "all_checks",
            AdjudicationRule::IdentityChecks => "identity_checks",
        }
    }

    fn requires_device_profiling(self) -> bool {
        matches!(self, AdjudicationRule::AllChecks)
    }
}

impl FromStr for AdjudicationRule {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "all_checks" => Ok(Self::AllChecks),
            "identity_checks" => Ok(Self::IdentityChecks),
            other => Err(format!("unknown adjudication rule '{other}'")),
        }
    }
}

/// Per-stage summary kept in the stored result for support and analytics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSummary {
    pub vendor_name: String,
    pub success: bool,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<String>,
}

impl From<&ProofingResult> for StageSummary {
    fn from(result: &ProofingResult) -> Self {
        Self {
            vendor_name: result.vendor_name.clone(),
            success: result.success,
            timed_out: result.timed_out,
            transaction_id: result.transaction_id.clone(),
            exception: result.exception.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdjudicationContext {
    pub adjudication_rule: AdjudicationRule,
    pub device_profiling_adjudication_reason: String,
    pub resolution_adjudication_reason: String,
    #[serde(default)]
    pub stages: BTreeMap<String, StageSummary>,
}

/// The single verdict stored for the pending session. Unknown keys survive a
/// `from_map`/`to_map` round trip through `extra`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjudicatedResult {
    pub success: bool,
    #[serde(default)]
    pub errors: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub exception: Option<String>,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub threatmetrix_review_status: Option<String>,
    pub context: AdjudicationContext,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssn_is_unique: Option<bool>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl AdjudicatedResult {
    pub fn to_map(&self) -> serde_json::Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            // Every field serializes to a JSON value; a struct always yields an object.
            _ => serde_json::Map::new(),
        }
    }

    pub fn from_map(map: serde_json::Map<String, Value>) -> Result<Self, serde_json::Error> {
        serde_json::from_value(Value::Object(map))
    }
}

/// Pure verdict over the collected stage results.
pub fn adjudicate(rule: AdjudicationRule, results: &ProofingResults) -> AdjudicatedResult {
    let device = &results.device_profiling_result;
    let residential = &results.residential_resolution_result;
    let resolution = &results.resolution_result;
    let state_id = &results.state_id_result;

    let (device_profiling_adjudication_reason, device_ok) =
        if !rule.requires_device_profiling() {
            ("device_profiling_not_required", true)
        } else if device.success {
            ("device_profiling_result_pass", true)
        } else if device.is_exception() {
            ("device_profiling_exception", false)
        } else {
            ("device_profiling_result_review_required", false)
        };

    let (resolution_adjudication_reason, identity_ok) = if !residential.success {
        ("fail_residential_address", false)
    } else if !resolution.success {
        ("fail_resolution_skip_state_id", false)
    } else if !state_id.success {
        ("fail_state_id", false)
    } else {
        ("pass_resolution_and_state_id", true)
    };

    let mut errors = BTreeMap::new();
    let mut exception = None;
    let mut timed_out = false;
    let mut stages = BTreeMap::new();

    for stage in ProofingStage::ORDERED {
        let result = results.get(stage);
        stages.insert(stage.label().to_string(), StageSummary::from(result));
        if stage == ProofingStage::DeviceProfiling && !rule.requires_device_profiling() {
            continue;
        }
        for (key, messages) in &result.errors {
            errors
                .entry(key.clone())
                .or_insert_with(Vec::new)
                .extend(messages.iter().cloned());
        }
        if exception.is_none() {
            exception = result.exception.clone();
        }
        timed_out |= result.timed_out;
    }

    AdjudicatedResult {
        success: device_ok && identity_ok,
        errors,
        exception,
        timed_out,
        threatmetrix_review_status: device.review_status.clone(),
        context: AdjudicationContext {
            adjudication_rule: rule,
            device_profiling_adjudication_reason: device_profiling_adjudication_reason
                .to_string(),
            resolution_adjudication_reason: resolution_adjudication_reason.to_string(),
            stages,
        },
        ssn_is_unique: None,
        extra: BTreeMap::new(),
    }
}
