use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::accounts::{ProfileId, ServiceProvider, User};

const MAX_UPDATE_ATTEMPTS: usize = 3;

/// Record that a profile was found to share its SSN with other profiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateProfileConfirmation {
    pub profile_id: ProfileId,
    pub confirmed_at: DateTime<Utc>,
    pub confirmed_all: bool,
    /// Sorted, without repeats.
    pub duplicate_profile_ids: Vec<ProfileId>,
}

/// A confirmation together with the row version used for optimistic updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedConfirmation {
    pub record: DuplicateProfileConfirmation,
    pub version: u64,
}

/// Storage for confirmations, unique by `profile_id`.
pub trait ConfirmationRepository: Send + Sync {
    fn find_by_profile_id(
        &self,
        profile_id: ProfileId,
    ) -> Result<Option<VersionedConfirmation>, ConfirmationError>;

    /// Fails with [`ConfirmationError::Conflict`] if a record for the profile exists.
    fn create(
        &self,
        record: DuplicateProfileConfirmation,
    ) -> Result<VersionedConfirmation, ConfirmationError>;

    /// Fails with [`ConfirmationError::StaleVersion`] if the stored version moved on.
    fn update(
        &self,
        record: DuplicateProfileConfirmation,
        expected_version: u64,
    ) -> Result<VersionedConfirmation, ConfirmationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ConfirmationError {
    #[error("confirmation already exists for profile {0:?}")]
    Conflict(ProfileId),
    #[error("confirmation for profile {0:?} was modified concurrently")]
    StaleVersion(ProfileId),
    #[error("confirmation store unavailable: {0}")]
    Unavailable(String),
    #[error("gave up recording confirmation for profile {0:?} after concurrent updates")]
    Contended(ProfileId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    Created(DuplicateProfileConfirmation),
    Updated(DuplicateProfileConfirmation),
    Unchanged(DuplicateProfileConfirmation),
}

/// Decides whether duplicate findings are recorded and keeps the record current.
#[derive(Clone)]
pub struct DuplicateProfileChecker {
    confirmations: std::sync::Arc<dyn ConfirmationRepository>,
    eligible_providers: HashSet<String>,
}

impl DuplicateProfileChecker {
    pub fn new(
        confirmations: std::sync::Arc<dyn ConfirmationRepository>,
        eligible_providers: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            confirmations,
            eligible_providers: eligible_providers.into_iter().collect(),
        }
    }

    /// Only partners enrolled in one-account enforcement get confirmations.
    pub fn sp_eligible(&self, current_sp: Option<&ServiceProvider>) -> bool {
        current_sp.is_some_and(|sp| self.eligible_providers.contains(&sp.issuer))
    }

    /// Record `duplicates` for the user's profile when the partner is eligible.
    /// Returns `None` when nothing was recorded.
    pub fn check_for_duplicate_profiles(
        &self,
        user: &User,
        current_sp: Option<&ServiceProvider>,
        duplicates: &BTreeSet<ProfileId>,
        now: DateTime<Utc>,
    ) -> Result<Option<ConfirmationOutcome>, ConfirmationError> {
        if duplicates.is_empty() || !self.sp_eligible(current_sp) {
            return Ok(None);
        }
        let Some(profile_id) = user.profile_id else {
            return Ok(None);
        };
        self.record_duplicates(profile_id, duplicates, now).map(Some)
    }

    /// Create the confirmation on first sight, or replace the duplicate set (resetting
    /// `confirmed_all`) when it changed. Concurrent writers are retried a bounded number
    /// of times.
    pub fn record_duplicates(
        &self,
        profile_id: ProfileId,
        duplicates: &BTreeSet<ProfileId>,
        now: DateTime<Utc>,
    ) -> Result<ConfirmationOutcome, ConfirmationError> {
        let duplicate_profile_ids: Vec<ProfileId> = duplicates.iter().copied().collect();

        for _ in 0..MAX_UPDATE_ATTEMPTS {
            match self.confirmations.find_by_profile_id(profile_id)? {
                None => {
                    let record = DuplicateProfileConfirmation {
                        profile_id,
                        confirmed_at: now,
                        confirmed_all: false,
                        duplicate_profile_ids: duplicate_profile_ids.clone(),
                    };
                    match self.confirmations.create(record) {
                        Ok(stored) => return Ok(ConfirmationOutcome::Created(stored.record)),
                        Err(ConfirmationError::Conflict(_)) => continue,
                        Err(other) => return Err(other),
                    }
                }
                Some(existing) if existing.record.duplicate_profile_ids == duplicate_profile_ids => {
                    return Ok(ConfirmationOutcome::Unchanged(existing.record));
                }
                Some(existing) => {
                    let record = DuplicateProfileConfirmation {
                        profile_id,
                        confirmed_at: now,
                        confirmed_all: false,
                        duplicate_profile_ids: duplicate_profile_ids.clone(),
                    };
                    match self.confirmations.update(record, existing.version) {
                        Ok(stored) => return Ok(ConfirmationOutcome::Updated(stored.record)),
                        Err(ConfirmationError::StaleVersion(_)) => continue,
                        Err(other) => return Err(other),
                    }
                }
            }
        }

        Err(ConfirmationError::Contended(profile_id))
    }
}

impl std::fmt::Debug for DuplicateProfileChecker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DuplicateProfileChecker")
            .field("eligible_providers", &self.eligible_providers)
            .finish_non_exhaustive()
    }
}
