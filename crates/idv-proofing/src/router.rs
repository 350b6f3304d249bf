//! HTTP intake for proofing jobs and polling of their result slots.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::accounts::UserId;
use crate::error::AppError;
use crate::jobs::{JobEnvelope, JobQueue, QueuedJob, ResolutionProofingJobArgs};
use crate::result_store::{ProofingSlot, ResultId, ResultStore};

/// Shared state behind the proofing routes.
#[derive(Clone)]
pub struct ProofingApi {
    results: Arc<dyn ResultStore>,
    queue: Arc<dyn JobQueue>,
}

impl ProofingApi {
    pub fn new(results: Arc<dyn ResultStore>, queue: Arc<dyn JobQueue>) -> Self {
        Self { results, queue }
    }

    /// Open the slot, then hand the job to the queue.
    pub fn submit(&self, request: ResolutionRequest) -> Result<ResultId, AppError> {
        if request.encrypted_arguments.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "encrypted_arguments must not be empty".to_string(),
            ));
        }
        if request.trace_id.trim().is_empty() {
            return Err(AppError::InvalidInput("trace_id must not be empty".to_string()));
        }

        let result_id = request.result_id.unwrap_or_else(ResultId::generate);
        self.results.create_slot(&result_id)?;

        let args = ResolutionProofingJobArgs {
            result_id: result_id.clone(),
            encrypted_arguments: request.encrypted_arguments,
            trace_id: request.trace_id,
            ipp_enrollment_in_progress: request.ipp_enrollment_in_progress,
            user_id: request.user_id,
            service_provider_issuer: request.service_provider_issuer,
            threatmetrix_session_id: request.threatmetrix_session_id,
            request_ip: request.request_ip,
        };
        self.queue.enqueue(JobEnvelope::new(
            QueuedJob::ResolutionProofing(args),
            Utc::now(),
        ))?;

        tracing::info!(%result_id, "proofing job enqueued");
        Ok(result_id)
    }

    pub fn status(&self, result_id: ResultId) -> Result<ResultView, AppError> {
        let slot = self.results.load(&result_id)?;
        let status = slot.label();
        let result = match slot {
            ProofingSlot::Pending => None,
            ProofingSlot::Complete(map) => Some(map),
        };
        Ok(ResultView {
            result_id,
            status,
            result,
        })
    }
}

impl std::fmt::Debug for ProofingApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProofingApi").finish_non_exhaustive()
    }
}

/// Inbound job payload; `result_id` is optional and generated when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionRequest {
    #[serde(default)]
    pub result_id: Option<ResultId>,
    pub encrypted_arguments: String,
    pub trace_id: String,
    #[serde(default)]
    pub ipp_enrollment_in_progress: bool,
    pub user_id: UserId,
    #[serde(default)]
    pub service_provider_issuer: Option<String>,
    #[serde(default)]
    pub threatmetrix_session_id: Option<String>,
    #[serde(default)]
    pub request_ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultView {
    pub result_id: ResultId,
    pub status: &'static str,
    pub result: Option<Map<String, Value>>,
}

pub fn proofing_router(api: Arc<ProofingApi>) -> Router {
    Router::new()
        .route("/api/v1/proofing/resolution", post(submit_handler))
        .route("/api/v1/proofing/results/:result_id", get(status_handler))
        .with_state(api)
}

pub(crate) async fn submit_handler(
    State(api): State<Arc<ProofingApi>>,
    Json(request): Json<ResolutionRequest>,
) -> Result<Response, AppError> {
    let result_id = api.submit(request)?;
    let payload = ResultView {
        result_id,
        status: ProofingSlot::Pending.label(),
        result: None,
    };
    Ok((StatusCode::ACCEPTED, Json(payload)).into_response())
}

pub(crate) async fn status_handler(
    State(api): State<Arc<ProofingApi>>,
    Path(result_id): Path<String>,
) -> Result<Json<ResultView>, AppError> {
    api.status(ResultId(result_id)).map(Json)
}
