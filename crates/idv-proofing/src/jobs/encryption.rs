//! Default at-rest protection for job arguments: AES-256-GCM with a random 96-bit nonce,
//! transported as base64 of `nonce || ciphertext`.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

const NONCE_LEN: usize = 12;

/// Decryption seam used by the jobs.
pub trait ArgumentDecryptor: Send + Sync {
    fn decrypt(&self, ciphertext: &str) -> Result<String, EncryptionError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EncryptionError {
    #[error("ciphertext is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("ciphertext is too short to hold a nonce")]
    Truncated,
    #[error("argument cryptographic operation failed")]
    Crypto,
    #[error("decrypted arguments are not valid UTF-8")]
    Utf8,
}

#[derive(Clone)]
pub struct BackgroundProofingArgEncryptor {
    key: [u8; 32],
}

impl BackgroundProofingArgEncryptor {
    pub fn new(key: [u8; 32]) -> Self {
        Self { key }
    }

    fn cipher(&self) -> Result<Aes256Gcm, EncryptionError> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|_| EncryptionError::Crypto)
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, EncryptionError> {
        let cipher = self.cipher()?;
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| EncryptionError::Crypto)?;

        let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        framed.extend_from_slice(&nonce_bytes);
        framed.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(framed))
    }
}

impl ArgumentDecryptor for BackgroundProofingArgEncryptor {
    fn decrypt(&self, ciphertext: &str) -> Result<String, EncryptionError> {
        let framed = BASE64.decode(ciphertext.trim().as_bytes())?;
        if framed.len() <= NONCE_LEN {
            return Err(EncryptionError::Truncated);
        }
        let (nonce, body) = framed.split_at(NONCE_LEN);
        let plaintext = self
            .cipher()?
            .decrypt(Nonce::from_slice(nonce), body)
            .map_err(|_| EncryptionError::Crypto)?;
        String::from_utf8(plaintext).map_err(|_| EncryptionError::Utf8)
    }
}

impl std::fmt::Debug for BackgroundProofingArgEncryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("BackgroundProofingArgEncryptor([redacted])")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrypt_reverses_encrypt() {
        let encryptor = BackgroundProofingArgEncryptor::new([3u8; 32]);
        let sealed = encryptor
            .encrypt(r#"{"applicant_pii":{"ssn":"900-12-3456"}}"#)
            .expect("encrypts");
        assert!(!sealed.contains("900-12-3456"));
        let opened = encryptor.decrypt(&sealed).expect("decrypts");
        assert!(opened.contains("900-12-3456"));
    }

    #[test]
    fn wrong_key_fails_closed() {
        let sealed = BackgroundProofingArgEncryptor::new([3u8; 32])
            .encrypt("secret")
            .expect("encrypts");
        let result = BackgroundProofingArgEncryptor::new([4u8; 32]).decrypt(&sealed);
        assert!(matches!(result, Err(EncryptionError::Crypto)));
    }

    #[test]
    fn rejects_garbage_input() {
        let encryptor = BackgroundProofingArgEncryptor::new([3u8; 32]);
        assert!(matches!(
            encryptor.decrypt("not base64!"),
            Err(EncryptionError::Decode(_))
        ));
        assert!(matches!(
            encryptor.decrypt(&BASE64.encode([0u8; 4])),
            Err(EncryptionError::Truncated)
        ));
    }
}
