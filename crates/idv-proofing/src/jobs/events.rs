use std::collections::BTreeMap;

use serde::Serialize;

use crate::proofing::{CallbackLogData, Timer};
use crate::result_store::ResultId;

/// Structured records emitted by the proofing jobs.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "name")]
pub enum JobEvent {
    ProofResolution(ProofResolutionEvent),
    ThreatMetrix(ThreatMetrixEvent),
    ShadowModeComparison(ShadowModeComparisonEvent),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProofResolutionEvent {
    pub trace_id: String,
    pub outcome: &'static str,
    pub resolution_success: Option<bool>,
    pub residential_resolution_success: Option<bool>,
    pub state_id_success: Option<bool>,
    pub device_profiling_success: Option<bool>,
    pub timing: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ThreatMetrixEvent {
    pub user_id: String,
    pub threatmetrix_request_id: Option<String>,
    pub threatmetrix_success: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShadowModeComparisonEvent {
    pub result_id: ResultId,
    pub user_uuid: String,
    pub vendor_name: String,
    pub shadow_success: bool,
    pub primary_success: Option<bool>,
    pub agrees: Option<bool>,
    pub timing: BTreeMap<String, f64>,
}

/// Telemetry sink for job events.
pub trait ProofingTelemetry: Send + Sync {
    fn emit(&self, event: JobEvent);
}

/// Writes each event as one `tracing` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTelemetry;

impl ProofingTelemetry for TracingTelemetry {
    fn emit(&self, event: JobEvent) {
        match event {
            JobEvent::ProofResolution(event) => {
                let timing = serde_json::to_string(&event.timing).unwrap_or_default();
                tracing::info!(
                    name = "ProofResolution",
                    trace_id = %event.trace_id,
                    outcome = event.outcome,
                    resolution_success = ?event.resolution_success,
                    residential_resolution_success = ?event.residential_resolution_success,
                    state_id_success = ?event.state_id_success,
                    device_profiling_success = ?event.device_profiling_success,
                    timing = %timing,
                    "proof resolution finished"
                );
            }
            JobEvent::ThreatMetrix(event) => {
                tracing::info!(
                    name = "ThreatMetrix",
                    user_id = %event.user_id,
                    threatmetrix_request_id = ?event.threatmetrix_request_id,
                    threatmetrix_success = event.threatmetrix_success,
                    "device profiling result"
                );
            }
            JobEvent::ShadowModeComparison(event) => {
                let timing = serde_json::to_string(&event.timing).unwrap_or_default();
                tracing::info!(
                    name = "ShadowModeComparison",
                    result_id = %event.result_id,
                    user_uuid = %event.user_uuid,
                    vendor = %event.vendor_name,
                    shadow_success = event.shadow_success,
                    primary_success = ?event.primary_success,
                    agrees = ?event.agrees,
                    timing = %timing,
                    "shadow mode comparison"
                );
            }
        }
    }
}

/// Emits exactly one `ProofResolution` event when dropped, on every exit path of the job
/// body. Holds the attempt's timer so stage timing is always included.
pub(crate) struct ProofResolutionLog<'a> {
    telemetry: &'a dyn ProofingTelemetry,
    trace_id: String,
    timer: Timer,
    callback: Option<CallbackLogData>,
    outcome: &'static str,
}

impl<'a> ProofResolutionLog<'a> {
    pub(crate) fn start(telemetry: &'a dyn ProofingTelemetry, trace_id: &str) -> Self {
        Self {
            telemetry,
            trace_id: trace_id.to_string(),
            timer: Timer::new(),
            callback: None,
            outcome: "failed",
        }
    }

    pub(crate) fn timer(&mut self) -> &mut Timer {
        &mut self.timer
    }

    pub(crate) fn record_callback(&mut self, callback: CallbackLogData) {
        self.callback = Some(callback);
    }

    pub(crate) fn finish(&mut self, outcome: &'static str) {
        self.outcome = outcome;
    }
}

impl Drop for ProofResolutionLog<'_> {
    fn drop(&mut self) {
        let callback = self.callback.as_ref();
        self.telemetry
            .emit(JobEvent::ProofResolution(ProofResolutionEvent {
                trace_id: std::mem::take(&mut self.trace_id),
                outcome: self.outcome,
                resolution_success: callback.map(|data| data.resolution_success),
                residential_resolution_success: callback
                    .map(|data| data.residential_resolution_success),
                state_id_success: callback.map(|data| data.state_id_success),
                device_profiling_success: callback.map(|data| data.device_profiling_success),
                timing: self.timer.results().clone(),
            }));
    }
}
