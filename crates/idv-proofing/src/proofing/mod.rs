//! The progressive proofer: vendor plugins, their shared result model, and the pure
//! adjudication step that turns per-stage results into one verdict.

pub mod adjudication;
pub mod cost;
pub mod domain;
pub mod mock;
pub mod orchestrator;
pub mod plugins;
pub mod timer;
pub mod vendor;

#[cfg(test)]
mod tests;

use std::sync::Arc;

pub use adjudication::{adjudicate, AdjudicatedResult, AdjudicationContext, AdjudicationRule};
pub use cost::{CostError, CostRecorder, SpCostEntry, SpCostToken};
pub use domain::{
    ApplicantPii, CallbackLogData, ProofingResult, ProofingResults, ProofingStage, StageResults,
};
pub use orchestrator::{ProgressiveProofer, ProofingPlugins, ResultsAggregate};
pub use plugins::{
    ProofingCheck, ProofingRequest, ResidentialAddressPlugin, StateIdAddressPlugin,
    StateIdPlugin, ThreatMetrixPlugin,
};
pub use timer::Timer;
pub use vendor::{Proofer, ProoferError};

use crate::config::{ProofingConfig, ResolutionVendor};

/// Vendor clients available to a deployment.
#[derive(Clone)]
pub struct VendorSet {
    pub threatmetrix: Arc<dyn Proofer>,
    pub lexis_nexis_instant_verify: Arc<dyn Proofer>,
    pub socure_id_plus: Arc<dyn Proofer>,
    pub aamva: Arc<dyn Proofer>,
}

impl VendorSet {
    /// State-ID address plugin bound to the configured resolution vendor.
    pub fn state_id_address_plugin(
        &self,
        vendor: ResolutionVendor,
        costs: Arc<dyn CostRecorder>,
    ) -> StateIdAddressPlugin {
        match vendor {
            ResolutionVendor::LexisNexis => {
                StateIdAddressPlugin::lexis_nexis(self.lexis_nexis_instant_verify.clone(), costs)
            }
            ResolutionVendor::Socure => {
                StateIdAddressPlugin::socure(self.socure_id_plus.clone(), costs)
            }
        }
    }

    /// The fixed, ordered plugin list for the configured deployment.
    pub fn plugins(&self, config: &ProofingConfig, costs: Arc<dyn CostRecorder>) -> ProofingPlugins {
        ProofingPlugins {
            device_profiling: Box::new(ThreatMetrixPlugin::new(
                self.threatmetrix.clone(),
                costs.clone(),
                config.device_profiling_enabled,
            )),
            residential_address: Box::new(ResidentialAddressPlugin::new(
                self.lexis_nexis_instant_verify.clone(),
                costs.clone(),
            )),
            state_id_address: Box::new(
                self.state_id_address_plugin(config.resolution_vendor, costs.clone()),
            ),
            state_id: Box::new(StateIdPlugin::new(
                self.aamva.clone(),
                costs,
                config.aamva_supported_jurisdictions.clone(),
            )),
        }
    }

    pub fn progressive_proofer(
        &self,
        config: &ProofingConfig,
        costs: Arc<dyn CostRecorder>,
    ) -> ProgressiveProofer {
        ProgressiveProofer::new(self.plugins(config, costs), config.adjudication_rule)
    }
}
