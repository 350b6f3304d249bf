use chrono::Utc;
use idv_proofing::jobs::{JobEnvelope, JobOutcome, JobQueue, JobRunner};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info, warn};

/// What happened to one delivered envelope.
#[derive(Debug)]
pub(crate) enum Disposition {
    Completed(JobOutcome),
    Requeued { attempts: u32 },
    Dropped,
}

/// Drain the queue until every sender is gone.
pub(crate) async fn run_worker(
    runner: Arc<JobRunner>,
    queue: Arc<dyn JobQueue>,
    mut receiver: UnboundedReceiver<JobEnvelope>,
) {
    info!(max_attempts = runner.max_attempts(), "proofing worker started");
    while let Some(envelope) = receiver.recv().await {
        process(runner.clone(), queue.as_ref(), envelope).await;
    }
    info!("proofing worker stopped");
}

pub(crate) async fn process(
    runner: Arc<JobRunner>,
    queue: &dyn JobQueue,
    envelope: JobEnvelope,
) -> Disposition {
    let job = envelope.job.name();
    let blocking_runner = runner.clone();
    let delivered = envelope.clone();
    let joined =
        tokio::task::spawn_blocking(move || blocking_runner.run(&delivered, Utc::now())).await;

    match joined {
        Ok(Ok(outcome)) => {
            info!(job, outcome = outcome.label(), attempts = envelope.attempts, "job finished");
            Disposition::Completed(outcome)
        }
        Ok(Err(err)) if runner.should_retry(&envelope, &err) => {
            let retry = envelope.retry();
            let attempts = retry.attempts;
            warn!(job, attempts, error = %err, "job failed, re-enqueueing");
            match queue.enqueue(retry) {
                Ok(()) => Disposition::Requeued { attempts },
                Err(queue_err) => {
                    error!(job, error = %queue_err, "could not re-enqueue failed job");
                    Disposition::Dropped
                }
            }
        }
        Ok(Err(err)) => {
            error!(
                job,
                attempts = envelope.attempts,
                retryable = err.is_retryable(),
                error = %err,
                "job failed permanently"
            );
            Disposition::Dropped
        }
        Err(join_err) => {
            error!(job, error = %join_err, "job task aborted");
            Disposition::Dropped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::Infrastructure;
    use idv_proofing::accounts::UserId;
    use idv_proofing::config::ProofingConfig;
    use idv_proofing::jobs::{QueuedJob, ResolutionProofingJobArgs, TracingTelemetry};
    use idv_proofing::proofing::mock::MockVendorConfig;
    use idv_proofing::result_store::{ProofingSlot, ResultId, ResultStore};
    use serde_json::json;

    fn infrastructure() -> (Infrastructure, UnboundedReceiver<JobEnvelope>) {
        let (infra, receiver) = Infrastructure::in_memory(
            &ProofingConfig::default(),
            MockVendorConfig::default(),
            Arc::new(TracingTelemetry),
        );
        infra.seed_development_accounts();
        (infra, receiver)
    }

    fn envelope(infra: &Infrastructure, user_id: u64, encrypted_arguments: String) -> JobEnvelope {
        let result_id = ResultId(format!("worker-test-{user_id}"));
        infra.results.create_slot(&result_id).expect("slot created");
        JobEnvelope::new(
            QueuedJob::ResolutionProofing(ResolutionProofingJobArgs {
                result_id,
                encrypted_arguments,
                trace_id: "trace".to_string(),
                ipp_enrollment_in_progress: false,
                user_id: UserId(user_id),
                service_provider_issuer: None,
                threatmetrix_session_id: Some("session".to_string()),
                request_ip: None,
            }),
            Utc::now(),
        )
    }

    fn encrypted_pii(infra: &Infrastructure) -> String {
        let payload = json!({
            "applicant_pii": {
                "first_name": "Fakey",
                "ssn": "900-12-3456",
                "state_id_jurisdiction": "VA",
            }
        });
        infra
            .encryptor
            .encrypt(&payload.to_string())
            .expect("encrypts")
    }

    #[tokio::test]
    async fn completed_job_persists_result() {
        let (infra, _receiver) = infrastructure();
        let envelope = envelope(&infra, 1, encrypted_pii(&infra));
        let result_id = match &envelope.job {
            QueuedJob::ResolutionProofing(args) => args.result_id.clone(),
            QueuedJob::ShadowModeProofing(_) => unreachable!(),
        };

        let disposition = process(infra.runner.clone(), infra.queue.as_ref(), envelope).await;

        assert!(matches!(disposition, Disposition::Completed(JobOutcome::Persisted { .. })));
        assert!(matches!(
            infra.results.load(&result_id).expect("slot exists"),
            ProofingSlot::Complete(_)
        ));
    }

    #[tokio::test]
    async fn retryable_failure_is_requeued_with_attempt_count() {
        let (infra, mut receiver) = infrastructure();
        let envelope = envelope(&infra, 1, "not-base64!".to_string());
        let enqueued_at = envelope.enqueued_at;

        let disposition = process(infra.runner.clone(), infra.queue.as_ref(), envelope).await;

        assert!(matches!(disposition, Disposition::Requeued { attempts: 1 }));
        let retried = receiver.try_recv().expect("job re-enqueued");
        assert_eq!(retried.attempts, 1);
        assert_eq!(retried.enqueued_at, enqueued_at);
    }

    #[tokio::test]
    async fn exhausted_or_permanent_failures_are_dropped() {
        let (infra, mut receiver) = infrastructure();
        let mut exhausted = envelope(&infra, 1, "not-base64!".to_string());
        exhausted.attempts = infra.runner.max_attempts() - 1;
        let unknown_user = envelope(&infra, 99, encrypted_pii(&infra));

        let first = process(infra.runner.clone(), infra.queue.as_ref(), exhausted).await;
        let second = process(infra.runner.clone(), infra.queue.as_ref(), unknown_user).await;

        assert!(matches!(first, Disposition::Dropped));
        assert!(matches!(second, Disposition::Dropped));
        assert!(receiver.try_recv().is_err());
    }
}
