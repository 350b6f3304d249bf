use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::payload::{ResolutionProofingJobArgs, ShadowModeProofingJobArgs};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", content = "args", rename_all = "snake_case")]
pub enum QueuedJob {
    ResolutionProofing(ResolutionProofingJobArgs),
    ShadowModeProofing(ShadowModeProofingJobArgs),
}

impl QueuedJob {
    pub const fn name(&self) -> &'static str {
        match self {
            QueuedJob::ResolutionProofing(_) => "ResolutionProofingJob",
            QueuedJob::ShadowModeProofing(_) => "SocureShadowModeProofingJob",
        }
    }
}

/// A job plus its delivery metadata. `enqueued_at` survives retries so staleness is
/// measured from the first enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobEnvelope {
    pub job: QueuedJob,
    pub enqueued_at: DateTime<Utc>,
    pub attempts: u32,
}

impl JobEnvelope {
    pub fn new(job: QueuedJob, enqueued_at: DateTime<Utc>) -> Self {
        Self {
            job,
            enqueued_at,
            attempts: 0,
        }
    }

    pub fn retry(self) -> Self {
        Self {
            attempts: self.attempts + 1,
            ..self
        }
    }
}

pub trait JobQueue: Send + Sync {
    fn enqueue(&self, envelope: JobEnvelope) -> Result<(), QueueError>;
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("job queue is closed")]
    Closed,
}

/// In-process queue over an unbounded tokio channel. Delivery is at-least-once from the
/// worker's point of view: failed jobs are re-sent through the same sender.
#[derive(Debug, Clone)]
pub struct ChannelJobQueue {
    sender: mpsc::UnboundedSender<JobEnvelope>,
}

impl ChannelJobQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<JobEnvelope>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl JobQueue for ChannelJobQueue {
    fn enqueue(&self, envelope: JobEnvelope) -> Result<(), QueueError> {
        self.sender.send(envelope).map_err(|_| QueueError::Closed)
    }
}
