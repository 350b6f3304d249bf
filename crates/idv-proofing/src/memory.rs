//! In-process adapters for every persistence port. The worker runs on these in
//! development and demo mode; tests use them as fixtures.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use crate::accounts::{AccountDirectory, ProfileId, RepositoryError, ServiceProvider, User, UserId};
use crate::duplicates::{
    ConfirmationError, ConfirmationRepository, DuplicateProfileConfirmation, ProfileRecord,
    ProfileRepository, VersionedConfirmation,
};
use crate::fingerprint::Fingerprint;
use crate::jobs::{JobEvent, ProofingTelemetry};
use crate::proofing::{CostError, CostRecorder, SpCostEntry};
use crate::result_store::{ProofingSlot, ResultId, ResultStore, ResultStoreError, StoreOutcome};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryResultStore {
    slots: Arc<Mutex<HashMap<ResultId, ProofingSlot>>>,
    writes: Arc<Mutex<HashMap<ResultId, usize>>>,
}

impl InMemoryResultStore {
    /// Number of writes that actually filled the slot (0 or 1).
    pub fn write_count(&self, result_id: &ResultId) -> usize {
        lock(&self.writes).get(result_id).copied().unwrap_or(0)
    }
}

impl ResultStore for InMemoryResultStore {
    fn create_slot(&self, result_id: &ResultId) -> Result<(), ResultStoreError> {
        lock(&self.slots)
            .entry(result_id.clone())
            .or_insert(ProofingSlot::Pending);
        Ok(())
    }

    fn store_proofing_result(
        &self,
        result_id: &ResultId,
        result: Map<String, Value>,
    ) -> Result<StoreOutcome, ResultStoreError> {
        let mut slots = lock(&self.slots);
        let slot = slots
            .get_mut(result_id)
            .ok_or_else(|| ResultStoreError::SlotNotFound(result_id.clone()))?;

        match slot {
            ProofingSlot::Complete(_) => Ok(StoreOutcome::AlreadyStored),
            ProofingSlot::Pending => {
                *slot = ProofingSlot::Complete(result);
                *lock(&self.writes).entry(result_id.clone()).or_insert(0) += 1;
                Ok(StoreOutcome::Stored)
            }
        }
    }

    fn load(&self, result_id: &ResultId) -> Result<ProofingSlot, ResultStoreError> {
        lock(&self.slots)
            .get(result_id)
            .cloned()
            .ok_or_else(|| ResultStoreError::SlotNotFound(result_id.clone()))
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryProfileRepository {
    profiles: Arc<Mutex<Vec<ProfileRecord>>>,
}

impl InMemoryProfileRepository {
    pub fn insert(&self, record: ProfileRecord) {
        lock(&self.profiles).push(record);
    }
}

impl ProfileRepository for InMemoryProfileRepository {
    fn verified_profiles_matching(
        &self,
        signatures: &[Fingerprint],
        excluding_user: UserId,
    ) -> Result<Vec<ProfileRecord>, RepositoryError> {
        let wanted: HashSet<&Fingerprint> = signatures.iter().collect();
        Ok(lock(&self.profiles)
            .iter()
            .filter(|profile| profile.verified && profile.user_id != excluding_user)
            .filter(|profile| wanted.contains(&profile.ssn_signature))
            .cloned()
            .collect())
    }
}

/// Confirmation rows keyed by profile, with a version bumped on every write.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConfirmationRepository {
    records: Arc<Mutex<HashMap<ProfileId, VersionedConfirmation>>>,
}

impl InMemoryConfirmationRepository {
    pub fn all(&self) -> Vec<DuplicateProfileConfirmation> {
        let mut records: Vec<_> = lock(&self.records)
            .values()
            .map(|stored| stored.record.clone())
            .collect();
        records.sort_by_key(|record| record.profile_id);
        records
    }
}

impl ConfirmationRepository for InMemoryConfirmationRepository {
    fn find_by_profile_id(
        &self,
        profile_id: ProfileId,
    ) -> Result<Option<VersionedConfirmation>, ConfirmationError> {
        Ok(lock(&self.records).get(&profile_id).cloned())
    }

    fn create(
        &self,
        record: DuplicateProfileConfirmation,
    ) -> Result<VersionedConfirmation, ConfirmationError> {
        let mut records = lock(&self.records);
        if records.contains_key(&record.profile_id) {
            return Err(ConfirmationError::Conflict(record.profile_id));
        }
        let stored = VersionedConfirmation { record, version: 1 };
        records.insert(stored.record.profile_id, stored.clone());
        Ok(stored)
    }

    fn update(
        &self,
        record: DuplicateProfileConfirmation,
        expected_version: u64,
    ) -> Result<VersionedConfirmation, ConfirmationError> {
        let mut records = lock(&self.records);
        let profile_id = record.profile_id;
        match records.get(&profile_id) {
            Some(existing) if existing.version == expected_version => {
                let stored = VersionedConfirmation {
                    record,
                    version: expected_version + 1,
                };
                records.insert(profile_id, stored.clone());
                Ok(stored)
            }
            _ => Err(ConfirmationError::StaleVersion(profile_id)),
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct InMemoryAccountDirectory {
    users: Arc<Mutex<HashMap<UserId, User>>>,
    service_providers: Arc<Mutex<HashMap<String, ServiceProvider>>>,
}

impl InMemoryAccountDirectory {
    pub fn insert_user(&self, user: User) {
        lock(&self.users).insert(user.id, user);
    }

    pub fn insert_service_provider(&self, sp: ServiceProvider) {
        lock(&self.service_providers).insert(sp.issuer.clone(), sp);
    }
}

impl AccountDirectory for InMemoryAccountDirectory {
    fn find_user(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        Ok(lock(&self.users).get(&id).cloned())
    }

    fn find_service_provider(
        &self,
        issuer: &str,
    ) -> Result<Option<ServiceProvider>, RepositoryError> {
        Ok(lock(&self.service_providers).get(issuer).cloned())
    }
}

/// Cost ledger that drops repeated `(attempt_id, cost_token, transaction_id)` triples, so
/// redelivered jobs are billed once while each new attempt is billed again.
#[derive(Debug, Default, Clone)]
pub struct RecordingCostSink {
    entries: Arc<Mutex<Vec<SpCostEntry>>>,
}

impl RecordingCostSink {
    pub fn entries(&self) -> Vec<SpCostEntry> {
        lock(&self.entries).clone()
    }
}

impl CostRecorder for RecordingCostSink {
    fn record(&self, entry: SpCostEntry) -> Result<(), CostError> {
        let mut entries = lock(&self.entries);
        let duplicate = entry.transaction_id.is_some()
            && entries.iter().any(|existing| {
                existing.attempt_id == entry.attempt_id
                    && existing.cost_token == entry.cost_token
                    && existing.transaction_id == entry.transaction_id
            });
        if !duplicate {
            entries.push(entry);
        }
        Ok(())
    }
}

/// Keeps emitted job events in memory and forwards nothing.
#[derive(Debug, Default, Clone)]
pub struct RecordingTelemetry {
    events: Arc<Mutex<Vec<JobEvent>>>,
}

impl RecordingTelemetry {
    pub fn events(&self) -> Vec<JobEvent> {
        lock(&self.events).clone()
    }

    pub fn proof_resolution_events(&self) -> Vec<crate::jobs::ProofResolutionEvent> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                JobEvent::ProofResolution(event) => Some(event.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ProofingTelemetry for RecordingTelemetry {
    fn emit(&self, event: JobEvent) {
        lock(&self.events).push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proofing::SpCostToken;
    use chrono::Utc;

    #[test]
    fn result_slot_is_write_once() {
        let store = InMemoryResultStore::default();
        let id = ResultId("slot".to_string());
        store.create_slot(&id).expect("slot created");

        let mut first = Map::new();
        first.insert("success".to_string(), Value::Bool(true));
        let mut second = Map::new();
        second.insert("success".to_string(), Value::Bool(false));

        assert_eq!(
            store.store_proofing_result(&id, first.clone()).unwrap(),
            StoreOutcome::Stored
        );
        assert_eq!(
            store.store_proofing_result(&id, second).unwrap(),
            StoreOutcome::AlreadyStored
        );
        assert_eq!(store.load(&id).unwrap(), ProofingSlot::Complete(first));
        assert_eq!(store.write_count(&id), 1);
    }

    #[test]
    fn storing_into_unknown_slot_fails() {
        let store = InMemoryResultStore::default();
        let id = ResultId("missing".to_string());
        let err = store
            .store_proofing_result(&id, Map::new())
            .expect_err("slot missing");
        assert!(matches!(err, ResultStoreError::SlotNotFound(_)));
    }

    #[test]
    fn confirmation_update_requires_current_version() {
        let repo = InMemoryConfirmationRepository::default();
        let record = DuplicateProfileConfirmation {
            profile_id: ProfileId(9),
            confirmed_at: Utc::now(),
            confirmed_all: false,
            duplicate_profile_ids: vec![ProfileId(1)],
        };
        let stored = repo.create(record.clone()).expect("created");
        assert!(matches!(
            repo.create(record.clone()),
            Err(ConfirmationError::Conflict(_))
        ));

        let updated = repo.update(record.clone(), stored.version).expect("updated");
        assert_eq!(updated.version, 2);
        assert!(matches!(
            repo.update(record, stored.version),
            Err(ConfirmationError::StaleVersion(_))
        ));
    }

    #[test]
    fn cost_sink_drops_repeated_transactions() {
        let sink = RecordingCostSink::default();
        let entry = SpCostEntry {
            issuer: Some("urn:gov:sp:test".to_string()),
            app_id: None,
            attempt_id: Some("result-1".to_string()),
            cost_token: SpCostToken::Aamva,
            transaction_id: Some("tx-1".to_string()),
        };
        sink.record(entry.clone()).unwrap();
        sink.record(entry).unwrap();
        sink.record(SpCostEntry {
            issuer: None,
            app_id: None,
            attempt_id: None,
            cost_token: SpCostToken::Aamva,
            transaction_id: None,
        })
        .unwrap();
        assert_eq!(sink.entries().len(), 2);
    }

    #[test]
    fn cost_sink_bills_each_attempt_separately() {
        let sink = RecordingCostSink::default();
        let first = SpCostEntry {
            issuer: Some("urn:gov:sp:test".to_string()),
            app_id: None,
            attempt_id: Some("result-1".to_string()),
            cost_token: SpCostToken::LexisNexisResolution,
            transaction_id: Some("tx-1".to_string()),
        };
        let second = SpCostEntry {
            attempt_id: Some("result-2".to_string()),
            ..first.clone()
        };
        sink.record(first).unwrap();
        sink.record(second).unwrap();
        assert_eq!(sink.entries().len(), 2);
    }
}
