//! Secrets at rest.
//!
//! # Data Flow
//! ```text
//! XFUNDER_ENCRYPTION_SECRET (environment, never persisted)
//!     → envelope.rs derive_key(subject) = HMAC-SHA256(secret, subject)
//!     → seal(plaintext, subject)  → base64(iv || tag || ciphertext)
//!     → open(envelope, subject)   → plaintext
//! ```
//!
//! # Security Constraints
//! - The subject (account id or campaign id) is part of the key, so an envelope
//!   copied onto another row cannot be opened under that row's id
//! - Opened secrets are zeroized on drop
//! - Nothing in this module logs key material

pub mod envelope;

pub use envelope::{CryptoError, CryptoResult, Envelope, SECRET_ENV_VAR};
