//! Custodial ed25519 keypairs.
//!
//! # Security
//! - Secret material is only ever handed out base-58 encoded for sealing
//! - Keys are never logged; `Debug` shows the public key only

use ed25519_dalek::{Signer, SigningKey};
use rand::rngs::OsRng;
use zeroize::Zeroizing;

use crate::chain::types::{ChainError, ChainResult};

/// An ed25519 keypair in Solana's 64-byte `secret || public` layout.
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair from the OS RNG.
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    /// Decode a base-58 64-byte keypair. The embedded public half must match the secret.
    pub fn from_base58(encoded: &str) -> ChainResult<Self> {
        let bytes = Zeroizing::new(
            bs58::decode(encoded.trim())
                .into_vec()
                .map_err(|e| ChainError::Keypair(format!("invalid base58: {}", e)))?,
        );
        let raw: &[u8; 64] = bytes.as_slice().try_into().map_err(|_| {
            ChainError::Keypair(format!("expected 64 bytes, got {}", bytes.len()))
        })?;
        let signing = SigningKey::from_keypair_bytes(raw)
            .map_err(|e| ChainError::Keypair(format!("inconsistent keypair: {}", e)))?;
        Ok(Self { signing })
    }

    /// Base-58 of the 64-byte keypair. This is what gets sealed and exported.
    pub fn to_base58(&self) -> Zeroizing<String> {
        let raw = Zeroizing::new(self.signing.to_keypair_bytes());
        Zeroizing::new(bs58::encode(raw.as_slice()).into_string())
    }

    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing.verifying_key().to_bytes()
    }

    /// Base-58 public key (the wallet address).
    pub fn public_key(&self) -> String {
        bs58::encode(self.public_key_bytes()).into_string()
    }

    pub fn sign(&self, message: &[u8]) -> [u8; 64] {
        self.signing.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Decode a base-58 public key into its 32 bytes.
pub fn decode_public_key(address: &str) -> ChainResult<[u8; 32]> {
    let bytes = bs58::decode(address)
        .into_vec()
        .map_err(|e| ChainError::InvalidAddress(format!("{}: {}", address, e)))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| ChainError::InvalidAddress(format!("{}: expected 32 bytes", address)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signature, Verifier, VerifyingKey};

    #[test]
    fn test_base58_round_trip() {
        let keypair = Keypair::generate();
        let encoded = keypair.to_base58();
        let decoded = Keypair::from_base58(&encoded).unwrap();
        assert_eq!(decoded.public_key(), keypair.public_key());
    }

    #[test]
    fn test_public_key_decodes_to_32_bytes() {
        let keypair = Keypair::generate();
        assert_eq!(decode_public_key(&keypair.public_key()).unwrap(), keypair.public_key_bytes());
    }

    #[test]
    fn test_rejects_bad_keypairs() {
        assert!(matches!(Keypair::from_base58("0OIl"), Err(ChainError::Keypair(_))));

        let short = bs58::encode([7u8; 32]).into_string();
        assert!(matches!(Keypair::from_base58(&short), Err(ChainError::Keypair(_))));

        // Public half that does not belong to the secret half
        let a = Keypair::generate();
        let b = Keypair::generate();
        let mut mixed = a.signing.to_keypair_bytes();
        mixed[32..].copy_from_slice(&b.public_key_bytes());
        let encoded = bs58::encode(mixed).into_string();
        assert!(matches!(Keypair::from_base58(&encoded), Err(ChainError::Keypair(_))));
    }

    #[test]
    fn test_signature_verifies() {
        let keypair = Keypair::generate();
        let sig = keypair.sign(b"message");
        let verifying = VerifyingKey::from_bytes(&keypair.public_key_bytes()).unwrap();
        assert!(verifying.verify(b"message", &Signature::from_bytes(&sig)).is_ok());
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(decode_public_key("not-base58!").is_err());
        assert!(decode_public_key("1111").is_err());
        assert!(decode_public_key("11111111111111111111111111111111").is_ok());
    }

    #[test]
    fn test_debug_hides_secret() {
        let keypair = Keypair::generate();
        let debug = format!("{:?}", keypair);
        assert!(debug.contains(&keypair.public_key()));
        assert!(!debug.contains(keypair.to_base58().as_str()));
    }
}
