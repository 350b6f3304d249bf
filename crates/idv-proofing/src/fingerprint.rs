//! Keyed, rotation-aware fingerprints for sensitive identifiers.
//!
//! A fingerprint is the hex HMAC-SHA256 of a value under a secret key. Stored rows only
//! ever carry the digest, so equality search has to recompute every digest a row could
//! have been written with: every key still in the rotation queue, and every formatting
//! convention the value may have been saved under.

use std::fmt;

use hmac::digest::{Key, KeyInit};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

type HmacSha256 = Hmac<Sha256>;

/// Secret key material for fingerprinting.
#[derive(Clone, PartialEq, Eq)]
pub struct FingerprintKey(String);

impl FingerprintKey {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// The secret as a full HMAC block: hashed when longer than a block, zero-padded
    /// otherwise. Same digest as keying HMAC with the raw bytes.
    fn block(&self) -> Key<HmacSha256> {
        let secret = self.0.as_bytes();
        let mut block = Key::<HmacSha256>::default();
        if secret.len() > block.len() {
            let digest = Sha256::digest(secret);
            block[..digest.len()].copy_from_slice(&digest);
        } else {
            block[..secret.len()].copy_from_slice(secret);
        }
        block
    }
}

impl fmt::Debug for FingerprintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FingerprintKey([redacted])")
    }
}

/// Hex digest produced by [`Fingerprinter::fingerprint`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub String);

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Holds the active key plus the queue of previously active keys.
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    current: FingerprintKey,
    rotated: Vec<FingerprintKey>,
}

impl Fingerprinter {
    pub fn new(current: FingerprintKey, rotated: Vec<FingerprintKey>) -> Self {
        Self { current, rotated }
    }

    /// Deterministic digest of `value` under `key`.
    pub fn fingerprint(value: &str, key: &FingerprintKey) -> Fingerprint {
        let mut mac = <HmacSha256 as KeyInit>::new(&key.block());
        mac.update(value.as_bytes());
        Fingerprint(hex::encode(mac.finalize().into_bytes()))
    }

    /// Digest under the active key; used when writing new rows.
    pub fn fingerprint_current(&self, value: &str) -> Fingerprint {
        Self::fingerprint(value, &self.current)
    }

    /// Active key first, then the rotation queue in configured order.
    pub fn keys(&self) -> impl Iterator<Item = &FingerprintKey> {
        std::iter::once(&self.current).chain(self.rotated.iter())
    }

    /// Every digest `value` could be stored under across the rotation queue.
    pub fn candidate_fingerprints(&self, value: &str) -> Vec<Fingerprint> {
        dedup_in_order(self.keys().map(|key| Self::fingerprint(value, key)))
    }

    /// Candidate digests for an SSN across both the dashed and the digits-only form.
    pub fn ssn_signatures(&self, raw_ssn: &str) -> Vec<Fingerprint> {
        let variants = [ssn::format(raw_ssn), ssn::normalize(raw_ssn)];
        dedup_in_order(self.keys().flat_map(|key| {
            variants
                .iter()
                .map(move |variant| Self::fingerprint(variant, key))
        }))
    }
}

fn dedup_in_order(items: impl Iterator<Item = Fingerprint>) -> Vec<Fingerprint> {
    let mut out: Vec<Fingerprint> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

/// SSN formatting conventions. Both are applied identically on write and on search.
pub mod ssn {
    /// Strip everything but ASCII digits.
    pub fn normalize(raw: &str) -> String {
        raw.chars().filter(|c| c.is_ascii_digit()).collect()
    }

    /// `XXX-XX-XXXX` for nine-digit values, otherwise the normalized digits.
    pub fn format(raw: &str) -> String {
        let digits = normalize(raw);
        if digits.len() != 9 {
            return digits;
        }
        format!("{}-{}-{}", &digits[0..3], &digits[3..5], &digits[5..9])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(secret: &str) -> FingerprintKey {
        FingerprintKey::new(secret)
    }

    #[test]
    fn fingerprint_is_deterministic_per_key() {
        let a = Fingerprinter::fingerprint("900-12-3456", &key("alpha"));
        let b = Fingerprinter::fingerprint("900-12-3456", &key("alpha"));
        let c = Fingerprinter::fingerprint("900-12-3456", &key("beta"));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.0.len(), 64);
    }

    #[test]
    fn fingerprint_matches_hmac_sha256_for_any_key_length() {
        let cases = [
            (
                String::new(),
                "2b85a10a727e132c91eb2ea0e61b60a97921f4e3672caa7e8e7e69d1af1df8b1",
            ),
            (
                "fingerprint-key".to_string(),
                "da22ad969c2bab57e51257bf2ed25994c8569f72aaf2e7a084a39ec62893ed52",
            ),
            (
                "k".repeat(64),
                "9f09793defd68c73cb24ddb2cdc7aac37da3e3802c9fb47d188691a24ea2fd6e",
            ),
            (
                "k".repeat(100),
                "46369929abd72b5c18d552cce216d9ad71afcb9a88899a5789f9de2a687a2b82",
            ),
        ];
        for (secret, expected) in cases {
            assert_eq!(
                Fingerprinter::fingerprint("123-45-6789", &key(&secret)).0,
                expected,
                "key of {} bytes",
                secret.len()
            );
        }
    }

    #[test]
    fn ssn_formatting_round_trips_common_inputs() {
        assert_eq!(ssn::normalize(" 900 12-3456 "), "900123456");
        assert_eq!(ssn::format("900123456"), "900-12-3456");
        assert_eq!(ssn::format("900-12-3456"), "900-12-3456");
        assert_eq!(ssn::format("12-34"), "1234");
    }

    #[test]
    fn ssn_signatures_cover_every_key_and_both_conventions() {
        let fingerprinter = Fingerprinter::new(key("current"), vec![key("old-1"), key("old-2")]);
        let signatures = fingerprinter.ssn_signatures("900123456");

        assert_eq!(signatures.len(), 6);
        assert_eq!(
            signatures[0],
            Fingerprinter::fingerprint("900-12-3456", &key("current"))
        );
        assert!(signatures.contains(&Fingerprinter::fingerprint("900123456", &key("old-2"))));
    }

    #[test]
    fn duplicate_keys_do_not_duplicate_signatures() {
        let fingerprinter = Fingerprinter::new(key("same"), vec![key("same")]);
        assert_eq!(fingerprinter.ssn_signatures("900-12-3456").len(), 2);
        assert_eq!(fingerprinter.candidate_fingerprints("x").len(), 1);
    }

    #[test]
    fn debug_output_hides_key_material() {
        let rendered = format!("{:?}", key("super-secret"));
        assert!(!rendered.contains("super-secret"));
    }
}
