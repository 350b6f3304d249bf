use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::accounts::{ProfileId, RepositoryError, UserId};
use crate::fingerprint::{Fingerprint, Fingerprinter};

/// Persisted profile as seen by the duplicate search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: ProfileId,
    pub user_id: UserId,
    pub ssn_signature: Fingerprint,
    pub verified: bool,
}

pub trait ProfileRepository: Send + Sync {
    /// Verified profiles whose signature is any of `signatures`, excluding `user_id`'s own.
    fn verified_profiles_matching(
        &self,
        signatures: &[Fingerprint],
        excluding_user: UserId,
    ) -> Result<Vec<ProfileRecord>, RepositoryError>;
}

/// Searches verified profiles for another account carrying the same SSN.
pub struct DuplicateSsnFinder<'a> {
    fingerprinter: &'a Fingerprinter,
    profiles: &'a dyn ProfileRepository,
}

impl<'a> DuplicateSsnFinder<'a> {
    pub fn new(fingerprinter: &'a Fingerprinter, profiles: &'a dyn ProfileRepository) -> Self {
        Self {
            fingerprinter,
            profiles,
        }
    }

    pub fn is_unique(&self, user_id: UserId, ssn: &str) -> Result<bool, RepositoryError> {
        Ok(self.associated_matches(user_id, ssn)?.is_empty())
    }

    pub fn associated_matches(
        &self,
        user_id: UserId,
        ssn: &str,
    ) -> Result<BTreeSet<ProfileId>, RepositoryError> {
        let signatures = self.fingerprinter.ssn_signatures(ssn);
        let matches = self
            .profiles
            .verified_profiles_matching(&signatures, user_id)?;
        Ok(matches
            .into_iter()
            .filter(|profile| profile.verified && profile.user_id != user_id)
            .map(|profile| profile.id)
            .collect())
    }
}
