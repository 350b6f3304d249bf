//! Configurable stand-in vendors for development runs and tests.
//!
//! Fixture selection is an explicit [`MockVendorConfig`] handed to each mock at
//! construction (and swappable through [`MockProofer::configure`]), so two runs in the
//! same process never see each other's selection.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::domain::{fields, ApplicantPii, ProofingResult};
use super::plugins::threatmetrix::{REVIEW_STATUS_PASS, REVIEW_STATUS_REJECT};
use super::vendor::{Proofer, ProoferError};

pub const MOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MockFixture {
    #[default]
    Pass,
    Fail,
    /// Device profiling only: the vendor answers but flags the session for review.
    Review,
    Timeout,
    Unavailable,
}

impl FromStr for MockFixture {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pass" => Ok(Self::Pass),
            "fail" => Ok(Self::Fail),
            "review" => Ok(Self::Review),
            "timeout" => Ok(Self::Timeout),
            "unavailable" => Ok(Self::Unavailable),
            other => Err(format!("unknown mock fixture '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MockVendorConfig {
    pub enabled: bool,
    pub fixture: MockFixture,
}

impl Default for MockVendorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fixture: MockFixture::Pass,
        }
    }
}

impl MockVendorConfig {
    pub fn with_fixture(fixture: MockFixture) -> Self {
        Self {
            enabled: true,
            fixture,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MockKind {
    Resolution,
    DeviceProfiling,
}

#[derive(Debug)]
pub struct MockProofer {
    vendor_name: String,
    kind: MockKind,
    config: RwLock<MockVendorConfig>,
    calls: AtomicUsize,
    requests: Mutex<Vec<ApplicantPii>>,
}

impl MockProofer {
    pub fn resolution(vendor_name: impl Into<String>, config: MockVendorConfig) -> Self {
        Self::build(vendor_name.into(), MockKind::Resolution, config)
    }

    pub fn device_profiling(vendor_name: impl Into<String>, config: MockVendorConfig) -> Self {
        Self::build(vendor_name.into(), MockKind::DeviceProfiling, config)
    }

    fn build(vendor_name: String, kind: MockKind, config: MockVendorConfig) -> Self {
        Self {
            vendor_name,
            kind,
            config: RwLock::new(config),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn configure(&self, config: MockVendorConfig) {
        let mut guard = self.config.write().unwrap_or_else(|e| e.into_inner());
        *guard = config;
    }

    pub fn config(&self) -> MockVendorConfig {
        *self.config.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_request(&self) -> Option<ApplicantPii> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .last()
            .cloned()
    }

    /// Stable for identical requests, distinct whenever the submitted PII differs.
    fn transaction_id(&self, pii: &ApplicantPii) -> String {
        let body = serde_json::to_vec(pii).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(self.vendor_name.as_bytes());
        hasher.update(b":");
        hasher.update(&body);
        format!("mock-{}", &hex::encode(hasher.finalize())[..16])
    }

    fn answer(&self, fixture: MockFixture, pii: &ApplicantPii) -> ProofingResult {
        let transaction_id = self.transaction_id(pii);
        let mut result = match fixture {
            MockFixture::Pass | MockFixture::Review => {
                let mut result = ProofingResult::passed(&self.vendor_name);
                if self.kind == MockKind::Resolution {
                    result.verified_attributes = [fields::SSN, "address", "dob", "name"]
                        .into_iter()
                        .map(str::to_string)
                        .collect();
                }
                result
            }
            _ => {
                let mut errors = BTreeMap::new();
                let key = match self.kind {
                    MockKind::Resolution => fields::SSN,
                    MockKind::DeviceProfiling => "review_status",
                };
                errors.insert(key.to_string(), vec!["unverified".to_string()]);
                ProofingResult::failed(&self.vendor_name, errors)
            }
        };

        if self.kind == MockKind::DeviceProfiling {
            result.review_status = Some(
                match fixture {
                    MockFixture::Pass => REVIEW_STATUS_PASS,
                    MockFixture::Review => "review",
                    _ => REVIEW_STATUS_REJECT,
                }
                .to_string(),
            );
        }

        result.reference = Some(format!("{}-reference", self.vendor_name));
        result.with_transaction_id(transaction_id)
    }
}

impl Proofer for MockProofer {
    fn vendor_name(&self) -> &str {
        &self.vendor_name
    }

    fn proof(&self, applicant_pii: &ApplicantPii) -> Result<ProofingResult, ProoferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(applicant_pii.clone());

        let config = self.config();
        if !config.enabled {
            return Err(ProoferError::Unavailable {
                vendor: self.vendor_name.clone(),
                detail: "mock vendor disabled".to_string(),
            });
        }

        match config.fixture {
            MockFixture::Timeout => Err(ProoferError::Timeout {
                vendor: self.vendor_name.clone(),
                after: MOCK_TIMEOUT,
            }),
            MockFixture::Unavailable => Err(ProoferError::Http {
                vendor: self.vendor_name.clone(),
                status: 503,
            }),
            fixture => Ok(self.answer(fixture, applicant_pii)),
        }
    }
}

pub mod vendor_names {
    pub const THREATMETRIX: &str = "lexisnexis:threatmetrix";
    pub const INSTANT_VERIFY: &str = "lexisnexis:instant_verify";
    pub const SOCURE_ID_PLUS: &str = "socure_kyc";
    pub const AAMVA: &str = "aamva:state_id";
}

/// One mock per vendor slot, kept as concrete handles so callers can inspect call counts.
#[derive(Debug, Clone)]
pub struct MockVendors {
    pub threatmetrix: std::sync::Arc<MockProofer>,
    pub instant_verify: std::sync::Arc<MockProofer>,
    pub socure_id_plus: std::sync::Arc<MockProofer>,
    pub aamva: std::sync::Arc<MockProofer>,
}

impl MockVendors {
    pub fn new(config: MockVendorConfig) -> Self {
        use std::sync::Arc;

        Self {
            threatmetrix: Arc::new(MockProofer::device_profiling(
                vendor_names::THREATMETRIX,
                config,
            )),
            instant_verify: Arc::new(MockProofer::resolution(
                vendor_names::INSTANT_VERIFY,
                config,
            )),
            socure_id_plus: Arc::new(MockProofer::resolution(
                vendor_names::SOCURE_ID_PLUS,
                config,
            )),
            aamva: Arc::new(MockProofer::resolution(vendor_names::AAMVA, config)),
        }
    }

    pub fn vendor_set(&self) -> super::VendorSet {
        super::VendorSet {
            threatmetrix: self.threatmetrix.clone(),
            lexis_nexis_instant_verify: self.instant_verify.clone(),
            socure_id_plus: self.socure_id_plus.clone(),
            aamva: self.aamva.clone(),
        }
    }
}
