//! Account-side records the proofing pipeline reads: users, their profiles, and the
//! service providers that initiated verification.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProfileId(pub u64);

/// Minimal user snapshot needed during a proofing attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub uuid: String,
    /// Address the user last signed in with; vendors receive it for risk scoring.
    pub last_sign_in_email: String,
    /// Active or pending profile the attempt will be attached to, if one exists.
    pub profile_id: Option<ProfileId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceProvider {
    pub issuer: String,
    pub app_id: Option<String>,
}

/// Lookup seam over user and service-provider persistence.
pub trait AccountDirectory: Send + Sync {
    fn find_user(&self, id: UserId) -> Result<Option<User>, RepositoryError>;
    fn find_service_provider(
        &self,
        issuer: &str,
    ) -> Result<Option<ServiceProvider>, RepositoryError>;
}

/// A user, service provider, or profile lookup could not reach its backing store.
/// Missing rows are `Ok(None)`, not errors; the job surfaces this as a retryable failure.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}
