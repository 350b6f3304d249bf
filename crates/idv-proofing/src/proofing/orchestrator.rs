use std::panic::{self, AssertUnwindSafe};

use super::adjudication::{adjudicate, AdjudicatedResult, AdjudicationRule};
use super::domain::{
    vendor_names, CallbackLogData, ProofingResult, ProofingResults, StageResults,
};
use super::plugins::{ProofingCheck, ProofingRequest};
use super::timer::Timer;

/// The fixed set of checks, one per stage, run in stage order.
pub struct ProofingPlugins {
    pub device_profiling: Box<dyn ProofingCheck>,
    pub residential_address: Box<dyn ProofingCheck>,
    pub state_id_address: Box<dyn ProofingCheck>,
    pub state_id: Box<dyn ProofingCheck>,
}

impl ProofingPlugins {
    fn ordered(&self) -> [&dyn ProofingCheck; 4] {
        [
            self.device_profiling.as_ref(),
            self.residential_address.as_ref(),
            self.state_id_address.as_ref(),
            self.state_id.as_ref(),
        ]
    }
}

/// Everything one attempt produced: per-stage results plus the adjudicated verdict.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsAggregate {
    pub results: ProofingResults,
    pub adjudicated_result: AdjudicatedResult,
}

impl ResultsAggregate {
    pub fn callback_log_data(&self) -> CallbackLogData {
        CallbackLogData {
            result: self.adjudicated_result.to_map(),
            resolution_success: self.results.resolution_result.success,
            residential_resolution_success: self.results.residential_resolution_result.success,
            state_id_success: self.results.state_id_result.success,
            device_profiling_success: self.results.device_profiling_result.success,
        }
    }
}

/// Runs the configured plugins in order and adjudicates their results.
pub struct ProgressiveProofer {
    plugins: ProofingPlugins,
    rule: AdjudicationRule,
}

impl ProgressiveProofer {
    pub fn new(plugins: ProofingPlugins, rule: AdjudicationRule) -> Self {
        Self { plugins, rule }
    }

    pub fn rule(&self) -> AdjudicationRule {
        self.rule
    }

    /// Never fails: a plugin that errors or panics only degrades its own stage.
    pub fn proof(&self, request: &ProofingRequest<'_>, timer: &mut Timer) -> ResultsAggregate {
        let mut stages = StageResults::default();

        for plugin in self.plugins.ordered() {
            let stage = plugin.stage();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                plugin.call(request, &stages, timer)
            }));
            let result = outcome.unwrap_or_else(|payload| {
                let detail = panic_detail(payload.as_ref());
                tracing::error!(stage = stage.label(), %detail, "proofing plugin panicked");
                let mut result = ProofingResult::failed(
                    vendor_names::PLUGIN_PANICKED,
                    Default::default(),
                );
                result.exception = Some(detail);
                result
            });

            if !stages.record(stage, result) {
                tracing::warn!(stage = stage.label(), "duplicate plugin for stage ignored");
            }
        }

        let results = stages.into_results();
        let adjudicated_result = adjudicate(self.rule, &results);
        ResultsAggregate {
            results,
            adjudicated_result,
        }
    }
}

fn panic_detail(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "plugin panicked".to_string()
    }
}
