use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::accounts::{ProfileId, RepositoryError, ServiceProvider, User, UserId};
use crate::config::ProofingConfig;
use crate::duplicates::{
    ConfirmationError, ConfirmationRepository, DuplicateProfileConfirmation, ProfileRecord,
    ProfileRepository, VersionedConfirmation,
};
use crate::fingerprint::{ssn, Fingerprint, FingerprintKey};
use crate::jobs::{
    BackgroundProofingArgEncryptor, ChannelJobQueue, JobEnvelope, JobQueue, ProofingCollaborators,
    QueueError, ResolutionProofingJob, ResolutionProofingJobArgs,
};
use crate::memory::{
    InMemoryAccountDirectory, InMemoryConfirmationRepository, InMemoryProfileRepository,
    InMemoryResultStore, RecordingCostSink, RecordingTelemetry,
};
use crate::proofing::domain::fields;
use crate::proofing::mock::{MockFixture, MockVendorConfig, MockVendors};
use crate::proofing::ApplicantPii;
use crate::result_store::{ResultId, ResultStore};

pub(super) const SSN: &str = "900-12-3456";
pub(super) const SP_ISSUER: &str = "urn:gov:gsa:openidconnect:sp:test";

pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 15, 30, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn fresh_enqueue() -> DateTime<Utc> {
    now() - Duration::seconds(30)
}

pub(super) fn applicant_pii() -> ApplicantPii {
    ApplicantPii::new()
        .with("first_name", "Fakey")
        .with("last_name", "McFakerson")
        .with("dob", "1938-10-06")
        .with(fields::SSN, SSN)
        .with("address1", "1 Fake Rd")
        .with("city", "Great Falls")
        .with("state", "MT")
        .with("zipcode", "59010")
        .with("identity_doc_address1", "1 Fake Rd")
        .with("identity_doc_city", "Great Falls")
        .with("identity_doc_address_state", "MT")
        .with("identity_doc_zipcode", "59010")
        .with(fields::STATE_ID_JURISDICTION, "MT")
}

pub(super) fn user(id: u64) -> User {
    User {
        id: UserId(id),
        uuid: format!("user-{id}-uuid"),
        last_sign_in_email: format!("user{id}@example.com"),
        profile_id: Some(ProfileId(id * 100)),
    }
}

pub(super) fn service_provider() -> ServiceProvider {
    ServiceProvider {
        issuer: SP_ISSUER.to_string(),
        app_id: Some("app-123".to_string()),
    }
}

pub(super) fn verified_profile(owner: u64, key: &FingerprintKey, raw_ssn: &str) -> ProfileRecord {
    ProfileRecord {
        id: ProfileId(owner * 100),
        user_id: UserId(owner),
        ssn_signature: crate::fingerprint::Fingerprinter::fingerprint(&ssn::format(raw_ssn), key),
        verified: true,
    }
}

pub(super) struct UnavailableProfiles;

impl ProfileRepository for UnavailableProfiles {
    fn verified_profiles_matching(
        &self,
        _signatures: &[Fingerprint],
        _excluding_user: UserId,
    ) -> Result<Vec<ProfileRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("replica down".to_string()))
    }
}

pub(super) struct UnavailableConfirmations;

impl ConfirmationRepository for UnavailableConfirmations {
    fn find_by_profile_id(
        &self,
        _profile_id: ProfileId,
    ) -> Result<Option<VersionedConfirmation>, ConfirmationError> {
        Err(ConfirmationError::Unavailable("primary down".to_string()))
    }

    fn create(
        &self,
        _record: DuplicateProfileConfirmation,
    ) -> Result<VersionedConfirmation, ConfirmationError> {
        Err(ConfirmationError::Unavailable("primary down".to_string()))
    }

    fn update(
        &self,
        _record: DuplicateProfileConfirmation,
        _expected_version: u64,
    ) -> Result<VersionedConfirmation, ConfirmationError> {
        Err(ConfirmationError::Unavailable("primary down".to_string()))
    }
}

pub(super) struct ClosedQueue;

impl JobQueue for ClosedQueue {
    fn enqueue(&self, _envelope: JobEnvelope) -> Result<(), QueueError> {
        Err(QueueError::Closed)
    }
}

/// Every collaborator of the primary job, backed by in-memory adapters and mock vendors.
pub(super) struct Harness {
    pub(super) config: ProofingConfig,
    pub(super) encryptor: Arc<BackgroundProofingArgEncryptor>,
    pub(super) accounts: Arc<InMemoryAccountDirectory>,
    pub(super) profiles: Arc<InMemoryProfileRepository>,
    pub(super) confirmations: Arc<InMemoryConfirmationRepository>,
    pub(super) results: Arc<InMemoryResultStore>,
    pub(super) queue: Arc<ChannelJobQueue>,
    pub(super) receiver: UnboundedReceiver<JobEnvelope>,
    pub(super) telemetry: Arc<RecordingTelemetry>,
    pub(super) costs: Arc<RecordingCostSink>,
    pub(super) vendors: MockVendors,
}

impl Harness {
    pub(super) fn new() -> Self {
        Self::with_config(ProofingConfig {
            eligible_one_account_providers: [SP_ISSUER.to_string()].into_iter().collect(),
            ..ProofingConfig::default()
        })
    }

    pub(super) fn with_config(config: ProofingConfig) -> Self {
        let (queue, receiver) = ChannelJobQueue::new();
        let accounts = Arc::new(InMemoryAccountDirectory::default());
        accounts.insert_user(user(1));
        accounts.insert_user(user(2));
        accounts.insert_service_provider(service_provider());

        Self {
            encryptor: Arc::new(BackgroundProofingArgEncryptor::new(
                config.argument_encryption_key,
            )),
            config,
            accounts,
            profiles: Arc::new(InMemoryProfileRepository::default()),
            confirmations: Arc::new(InMemoryConfirmationRepository::default()),
            results: Arc::new(InMemoryResultStore::default()),
            queue: Arc::new(queue),
            receiver,
            telemetry: Arc::new(RecordingTelemetry::default()),
            costs: Arc::new(RecordingCostSink::default()),
            vendors: MockVendors::new(MockVendorConfig::with_fixture(MockFixture::Pass)),
        }
    }

    pub(super) fn collaborators(&self) -> ProofingCollaborators {
        ProofingCollaborators {
            decryptor: self.encryptor.clone(),
            accounts: self.accounts.clone(),
            profiles: self.profiles.clone(),
            confirmations: self.confirmations.clone(),
            results: self.results.clone(),
            queue: self.queue.clone(),
            telemetry: self.telemetry.clone(),
            costs: self.costs.clone(),
        }
    }

    pub(super) fn job(&self) -> ResolutionProofingJob {
        self.job_with(self.collaborators())
    }

    pub(super) fn job_with(&self, collaborators: ProofingCollaborators) -> ResolutionProofingJob {
        ResolutionProofingJob::new(collaborators, &self.config, &self.vendors.vendor_set())
    }

    pub(super) fn encrypt(&self, pii: &ApplicantPii) -> String {
        let plaintext = serde_json::json!({
            "applicant_pii": pii,
            "document_capture_session_uuid": "dcs-uuid",
        })
        .to_string();
        self.encryptor.encrypt(&plaintext).expect("encrypts")
    }

    /// Job payload for `user_id` with an open result slot.
    pub(super) fn args(
        &self,
        user_id: u64,
        pii: &ApplicantPii,
        ipp_enrollment_in_progress: bool,
    ) -> ResolutionProofingJobArgs {
        let result_id = ResultId(format!("result-for-user-{user_id}"));
        self.results.create_slot(&result_id).expect("slot created");
        ResolutionProofingJobArgs {
            result_id,
            encrypted_arguments: self.encrypt(pii),
            trace_id: format!("trace-{user_id}"),
            ipp_enrollment_in_progress,
            user_id: UserId(user_id),
            service_provider_issuer: Some(SP_ISSUER.to_string()),
            threatmetrix_session_id: Some("tmx-session".to_string()),
            request_ip: Some("192.0.2.10".to_string()),
        }
    }

    pub(super) fn total_vendor_calls(&self) -> usize {
        self.vendors.threatmetrix.calls()
            + self.vendors.instant_verify.calls()
            + self.vendors.socure_id_plus.calls()
            + self.vendors.aamva.calls()
    }
}
