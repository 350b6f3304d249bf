use serde::{Deserialize, Serialize};

use crate::accounts::ServiceProvider;

/// Billing bucket a vendor call is charged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpCostToken {
    LexisNexisResolution,
    SocureResolution,
    Aamva,
    Threatmetrix,
}

impl SpCostToken {
    pub const fn label(self) -> &'static str {
        match self {
            SpCostToken::LexisNexisResolution => "lexis_nexis_resolution",
            SpCostToken::SocureResolution => "socure_resolution",
            SpCostToken::Aamva => "aamva",
            SpCostToken::Threatmetrix => "threatmetrix",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpCostEntry {
    pub issuer: Option<String>,
    pub app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempt_id: Option<String>,
    pub cost_token: SpCostToken,
    pub transaction_id: Option<String>,
}

/// Sink for per-call vendor costs. Duplicate transaction ids must be tolerated.
pub trait CostRecorder: Send + Sync {
    fn record(&self, entry: SpCostEntry) -> Result<(), CostError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CostError {
    #[error("cost ledger unavailable: {0}")]
    Unavailable(String),
}

/// Fire-and-forget cost write; failures are logged and never reach the proofing result.
pub(crate) fn add_sp_cost(
    recorder: &dyn CostRecorder,
    current_sp: Option<&ServiceProvider>,
    attempt_id: Option<&str>,
    cost_token: SpCostToken,
    transaction_id: Option<&str>,
) {
    let entry = SpCostEntry {
        issuer: current_sp.map(|sp| sp.issuer.clone()),
        app_id: current_sp.and_then(|sp| sp.app_id.clone()),
        attempt_id: attempt_id.map(str::to_string),
        cost_token,
        transaction_id: transaction_id
            .filter(|id| !id.is_empty())
            .map(str::to_string),
    };

    if let Err(error) = recorder.record(entry) {
        tracing::warn!(cost_token = cost_token.label(), %error, "failed to record sp cost");
    }
}
