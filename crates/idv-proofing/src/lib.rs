pub mod accounts;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod fingerprint;
pub mod jobs;
pub mod memory;
pub mod proofing;
pub mod result_store;
pub mod router;
pub mod telemetry;
