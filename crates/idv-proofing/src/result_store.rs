//! Write-once slots where a proofing attempt's verdict becomes visible to the session
//! that requested it.

use std::fmt;

use rand::RngCore;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Opaque identifier of one result slot.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResultId(pub String);

impl ResultId {
    /// Random, unguessable id for a new slot.
    pub fn generate() -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(hex::encode(bytes))
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a reader sees when polling a slot.
#[derive(Debug, Clone, PartialEq)]
pub enum ProofingSlot {
    Pending,
    Complete(Map<String, Value>),
}

impl ProofingSlot {
    pub const fn label(&self) -> &'static str {
        match self {
            ProofingSlot::Pending => "pending",
            ProofingSlot::Complete(_) => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    /// The slot already held a result; the earlier value was kept.
    AlreadyStored,
}

pub trait ResultStore: Send + Sync {
    /// Create an empty slot. Creating an existing slot leaves it untouched.
    fn create_slot(&self, result_id: &ResultId) -> Result<(), ResultStoreError>;

    /// Fill the slot once; later writes report [`StoreOutcome::AlreadyStored`].
    fn store_proofing_result(
        &self,
        result_id: &ResultId,
        result: Map<String, Value>,
    ) -> Result<StoreOutcome, ResultStoreError>;

    fn load(&self, result_id: &ResultId) -> Result<ProofingSlot, ResultStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ResultStoreError {
    #[error("no result slot for id {0}")]
    SlotNotFound(ResultId),
    #[error("result store unavailable: {0}")]
    Unavailable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_distinct_hex() {
        let a = ResultId::generate();
        let b = ResultId::generate();
        assert_ne!(a, b);
        assert_eq!(a.0.len(), 32);
        assert!(a.0.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
