use idv_proofing::accounts::{ProfileId, ServiceProvider, User, UserId};
use idv_proofing::config::ProofingConfig;
use idv_proofing::jobs::{
    BackgroundProofingArgEncryptor, ChannelJobQueue, JobEnvelope, JobRunner,
    ProofingCollaborators, ProofingTelemetry,
};
use idv_proofing::memory::{
    InMemoryAccountDirectory, InMemoryConfirmationRepository, InMemoryProfileRepository,
    InMemoryResultStore, RecordingCostSink,
};
use idv_proofing::proofing::mock::{MockFixture, MockVendorConfig, MockVendors};
use idv_proofing::router::ProofingApi;
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

pub(crate) const DEVELOPMENT_SP_ISSUER: &str = "urn:gov:idv:sp:development";
pub(crate) const DEVELOPMENT_USER_COUNT: u64 = 3;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// In-process adapters and mock vendors wired into one job runner.
pub(crate) struct Infrastructure {
    pub(crate) encryptor: Arc<BackgroundProofingArgEncryptor>,
    pub(crate) accounts: Arc<InMemoryAccountDirectory>,
    pub(crate) profiles: Arc<InMemoryProfileRepository>,
    pub(crate) confirmations: Arc<InMemoryConfirmationRepository>,
    pub(crate) results: Arc<InMemoryResultStore>,
    pub(crate) queue: Arc<ChannelJobQueue>,
    pub(crate) vendors: MockVendors,
    pub(crate) runner: Arc<JobRunner>,
}

impl Infrastructure {
    pub(crate) fn in_memory(
        config: &ProofingConfig,
        mock: MockVendorConfig,
        telemetry: Arc<dyn ProofingTelemetry>,
    ) -> (Self, UnboundedReceiver<JobEnvelope>) {
        let encryptor = Arc::new(BackgroundProofingArgEncryptor::new(
            config.argument_encryption_key,
        ));
        let accounts = Arc::new(InMemoryAccountDirectory::default());
        let profiles = Arc::new(InMemoryProfileRepository::default());
        let confirmations = Arc::new(InMemoryConfirmationRepository::default());
        let results = Arc::new(InMemoryResultStore::default());
        let (queue, receiver) = ChannelJobQueue::new();
        let queue = Arc::new(queue);
        let vendors = MockVendors::new(mock);

        let collaborators = ProofingCollaborators {
            decryptor: encryptor.clone(),
            accounts: accounts.clone(),
            profiles: profiles.clone(),
            confirmations: confirmations.clone(),
            results: results.clone(),
            queue: queue.clone(),
            telemetry,
            costs: Arc::new(RecordingCostSink::default()),
        };
        let runner = Arc::new(JobRunner::new(collaborators, config, &vendors.vendor_set()));

        let infra = Self {
            encryptor,
            accounts,
            profiles,
            confirmations,
            results,
            queue,
            vendors,
            runner,
        };
        (infra, receiver)
    }

    pub(crate) fn proofing_api(&self) -> Arc<ProofingApi> {
        Arc::new(ProofingApi::new(self.results.clone(), self.queue.clone()))
    }

    /// Users `1..=DEVELOPMENT_USER_COUNT` plus the development partner, so locally
    /// submitted jobs resolve their account lookups.
    pub(crate) fn seed_development_accounts(&self) {
        self.accounts.insert_service_provider(ServiceProvider {
            issuer: DEVELOPMENT_SP_ISSUER.to_string(),
            app_id: Some("idv-development".to_string()),
        });
        for id in 1..=DEVELOPMENT_USER_COUNT {
            self.accounts.insert_user(User {
                id: UserId(id),
                uuid: format!("00000000-0000-4000-8000-{id:012}"),
                last_sign_in_email: format!("applicant{id}@example.com"),
                profile_id: Some(ProfileId(id * 100)),
            });
        }
    }
}

pub(crate) fn parse_mock_fixture(raw: &str) -> Result<MockFixture, String> {
    raw.parse()
}
