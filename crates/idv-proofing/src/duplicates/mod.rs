//! Duplicate-identity detection: read-only SSN fingerprint search plus the separate
//! bookkeeping of confirmations for profiles found to share an SSN.

mod confirmation;
mod finder;

pub use confirmation::{
    ConfirmationError, ConfirmationOutcome, ConfirmationRepository,
    DuplicateProfileChecker, DuplicateProfileConfirmation, VersionedConfirmation,
};
pub use finder::{DuplicateSsnFinder, ProfileRecord, ProfileRepository};
