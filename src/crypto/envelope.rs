//! Subject-bound AES-256-GCM envelopes.

use aes_gcm::aead::consts::U16;
use aes_gcm::aead::generic_array::GenericArray;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::aes::Aes256;
use aes_gcm::AesGcm;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;
use zeroize::Zeroizing;

/// Environment variable holding the server secret.
pub const SECRET_ENV_VAR: &str = "XFUNDER_ENCRYPTION_SECRET";

/// Minimum server secret length in bytes.
pub const MIN_SECRET_LEN: usize = 32;

const IV_LEN: usize = 16;
const TAG_LEN: usize = 16;

type HmacSha256 = Hmac<Sha256>;

/// AES-256-GCM with a 128-bit IV.
type Aes256Gcm16 = AesGcm<Aes256, U16>;

/// Errors raised while sealing or opening envelopes.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The tag did not verify: tampered ciphertext or wrong subject.
    #[error("envelope authentication failed")]
    Authentication,

    /// The server secret is missing or too short.
    #[error("configuration error: {0}")]
    Config(String),

    /// The envelope is not valid base64 or is truncated.
    #[error("malformed envelope: {0}")]
    Malformed(String),
}

/// Result type for envelope operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Seals and opens secrets under keys derived from the server secret.
#[derive(Clone)]
pub struct Envelope {
    server_secret: Zeroizing<Vec<u8>>,
}

impl Envelope {
    /// Build an envelope from the raw server secret.
    pub fn new(server_secret: impl Into<Vec<u8>>) -> CryptoResult<Self> {
        let server_secret = Zeroizing::new(server_secret.into());
        if server_secret.len() < MIN_SECRET_LEN {
            return Err(CryptoError::Config(format!(
                "{} must be at least {} bytes",
                SECRET_ENV_VAR, MIN_SECRET_LEN
            )));
        }
        Ok(Self { server_secret })
    }

    /// Read the server secret from `XFUNDER_ENCRYPTION_SECRET`.
    pub fn from_env() -> CryptoResult<Self> {
        let secret = std::env::var(SECRET_ENV_VAR)
            .map_err(|_| CryptoError::Config(format!("{} not set", SECRET_ENV_VAR)))?;
        Self::new(secret.into_bytes())
    }

    /// Derive the 32-byte key for a subject.
    pub fn derive_key(&self, subject: &str) -> CryptoResult<Zeroizing<[u8; 32]>> {
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.server_secret)
            .map_err(|e| CryptoError::Config(format!("invalid server secret: {}", e)))?;
        mac.update(subject.as_bytes());
        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(&mac.finalize().into_bytes());
        Ok(key)
    }

    /// Encrypt `plaintext` for `subject`. Output is `base64(iv || tag || ciphertext)`.
    pub fn seal(&self, plaintext: &[u8], subject: &str) -> CryptoResult<String> {
        let key = self.derive_key(subject)?;
        let cipher = Aes256Gcm16::new(GenericArray::from_slice(key.as_slice()));

        let mut iv = [0u8; IV_LEN];
        OsRng.fill_bytes(&mut iv);

        let mut buffer = plaintext.to_vec();
        let tag = cipher
            .encrypt_in_place_detached(GenericArray::from_slice(&iv), b"", buffer.as_mut_slice())
            .map_err(|_| CryptoError::Malformed("encryption failed".to_string()))?;

        let mut combined = Vec::with_capacity(IV_LEN + TAG_LEN + buffer.len());
        combined.extend_from_slice(&iv);
        combined.extend_from_slice(tag.as_slice());
        combined.extend_from_slice(&buffer);
        Ok(BASE64.encode(combined))
    }

    /// Decrypt an envelope produced by [`Envelope::seal`] for the same subject.
    pub fn open(&self, envelope: &str, subject: &str) -> CryptoResult<Zeroizing<Vec<u8>>> {
        let combined = BASE64
            .decode(envelope)
            .map_err(|e| CryptoError::Malformed(e.to_string()))?;
        if combined.len() < IV_LEN + TAG_LEN {
            return Err(CryptoError::Malformed(format!(
                "expected at least {} bytes, got {}",
                IV_LEN + TAG_LEN,
                combined.len()
            )));
        }

        let (iv, rest) = combined.split_at(IV_LEN);
        let (tag, ciphertext) = rest.split_at(TAG_LEN);

        let key = self.derive_key(subject)?;
        let cipher = Aes256Gcm16::new(GenericArray::from_slice(key.as_slice()));

        let mut buffer = Zeroizing::new(ciphertext.to_vec());
        cipher
            .decrypt_in_place_detached(
                GenericArray::from_slice(iv),
                b"",
                buffer.as_mut_slice(),
                GenericArray::from_slice(tag),
            )
            .map_err(|_| CryptoError::Authentication)?;
        Ok(buffer)
    }

    /// Open an envelope whose plaintext is UTF-8.
    pub fn open_string(&self, envelope: &str, subject: &str) -> CryptoResult<Zeroizing<String>> {
        let bytes = self.open(envelope, subject)?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|e| CryptoError::Malformed(format!("plaintext is not UTF-8: {}", e)))?;
        Ok(Zeroizing::new(text.to_string()))
    }
}

impl std::fmt::Debug for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn envelope() -> Envelope {
        Envelope::new(SECRET).unwrap()
    }

    #[test]
    fn test_round_trip() {
        let env = envelope();
        let sealed = env.seal(b"wallet secret", "user-1").unwrap();
        assert_eq!(env.open(&sealed, "user-1").unwrap().as_slice(), b"wallet secret");
    }

    #[test]
    fn test_layout_is_iv_tag_ciphertext() {
        let env = envelope();
        let sealed = env.seal(b"abc", "s").unwrap();
        let raw = BASE64.decode(sealed).unwrap();
        assert_eq!(raw.len(), IV_LEN + TAG_LEN + 3);
    }

    #[test]
    fn test_fresh_iv_per_seal() {
        let env = envelope();
        let a = env.seal(b"same", "s").unwrap();
        let b = env.seal(b"same", "s").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_subject_fails_authentication() {
        let env = envelope();
        let sealed = env.seal(b"secret", "account-a").unwrap();
        let err = env.open(&sealed, "account-b").unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn test_tampered_ciphertext_fails_authentication() {
        let env = envelope();
        let sealed = env.seal(b"secret", "s").unwrap();
        let mut raw = BASE64.decode(sealed).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        let err = env.open(&BASE64.encode(raw), "s").unwrap_err();
        assert!(matches!(err, CryptoError::Authentication));
    }

    #[test]
    fn test_different_server_secret_fails() {
        let sealed = envelope().seal(b"secret", "s").unwrap();
        let other = Envelope::new("ffffffffffffffffffffffffffffffff").unwrap();
        assert!(matches!(other.open(&sealed, "s"), Err(CryptoError::Authentication)));
    }

    #[test]
    fn test_short_secret_is_config_error() {
        let err = Envelope::new("too-short").unwrap_err();
        assert!(matches!(err, CryptoError::Config(_)));
        assert!(err.to_string().contains(SECRET_ENV_VAR));
    }

    #[test]
    fn test_truncated_envelope_is_malformed() {
        let env = envelope();
        let short = BASE64.encode([0u8; 20]);
        assert!(matches!(env.open(&short, "s"), Err(CryptoError::Malformed(_))));
        assert!(matches!(env.open("not base64!!", "s"), Err(CryptoError::Malformed(_))));
    }

    #[test]
    fn test_derive_key_is_deterministic_per_subject() {
        let env = envelope();
        assert_eq!(*env.derive_key("a").unwrap(), *env.derive_key("a").unwrap());
        assert_ne!(*env.derive_key("a").unwrap(), *env.derive_key("b").unwrap());
    }

    proptest! {
        #[test]
        fn prop_open_inverts_seal(plaintext in proptest::collection::vec(any::<u8>(), 0..256), subject in "[a-zA-Z0-9-]{1,40}") {
            let env = envelope();
            let sealed = env.seal(&plaintext, &subject).unwrap();
            let opened = env.open(&sealed, &subject).unwrap();
            prop_assert_eq!(opened.as_slice(), plaintext.as_slice());
        }
    }
}
