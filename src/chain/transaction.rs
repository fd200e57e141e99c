//! Transfer building, signing, and confirmation monitoring.
//!
//! # Responsibilities
//! - Encode a legacy message with a single System Program transfer
//! - Sign and broadcast it
//! - Poll the signature until it reaches the configured commitment

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use std::time::Duration;
use tokio::time::{sleep, timeout};

use async_trait::async_trait;

use crate::chain::client::SolanaRpc;
use crate::chain::keypair::{decode_public_key, Keypair};
use crate::chain::types::{ChainError, ChainResult, ConfirmationStatus, Lamports, Receipt};
use crate::chain::Settlement;
use crate::resilience::backoff::Backoff;

/// The System Program id is the all-zero key.
const SYSTEM_PROGRAM_ID: [u8; 32] = [0u8; 32];

/// System Program instruction index for `Transfer`.
const SYSTEM_TRANSFER: u32 = 2;

const CONFIRM_POLL_BASE: Duration = Duration::from_millis(500);
const CONFIRM_POLL_MAX: Duration = Duration::from_secs(4);

/// Append a compact-u16 length.
fn push_short_vec_len(buf: &mut Vec<u8>, mut len: usize) {
    loop {
        let mut byte = (len & 0x7f) as u8;
        len >>= 7;
        if len == 0 {
            buf.push(byte);
            return;
        }
        byte |= 0x80;
        buf.push(byte);
    }
}

/// Serialize the message for a `from -> to` transfer of `lamports`.
pub fn transfer_message(
    from: &[u8; 32],
    to: &[u8; 32],
    lamports: Lamports,
    recent_blockhash: &[u8; 32],
) -> Vec<u8> {
    let mut msg = Vec::with_capacity(150);

    // Header: one signer, no read-only signers, one read-only unsigned (the program)
    msg.extend_from_slice(&[1, 0, 1]);

    push_short_vec_len(&mut msg, 3);
    msg.extend_from_slice(from);
    msg.extend_from_slice(to);
    msg.extend_from_slice(&SYSTEM_PROGRAM_ID);

    msg.extend_from_slice(recent_blockhash);

    push_short_vec_len(&mut msg, 1);
    msg.push(2); // program id index
    push_short_vec_len(&mut msg, 2);
    msg.extend_from_slice(&[0, 1]);

    let mut data = Vec::with_capacity(12);
    data.extend_from_slice(&SYSTEM_TRANSFER.to_le_bytes());
    data.extend_from_slice(&lamports.0.to_le_bytes());
    push_short_vec_len(&mut msg, data.len());
    msg.extend_from_slice(&data);

    msg
}

/// Build and sign a transfer. Returns the wire bytes and the base-58 signature.
pub fn signed_transfer(
    from: &Keypair,
    to: &str,
    lamports: Lamports,
    recent_blockhash: &[u8; 32],
) -> ChainResult<(Vec<u8>, String)> {
    let to_bytes = decode_public_key(to)?;
    let from_bytes = from.public_key_bytes();
    if to_bytes == from_bytes {
        return Err(ChainError::InvalidAddress(format!(
            "{}: cannot transfer to the sending wallet",
            to
        )));
    }

    let message = transfer_message(&from_bytes, &to_bytes, lamports, recent_blockhash);
    let signature = from.sign(&message);

    let mut wire = Vec::with_capacity(1 + 64 + message.len());
    push_short_vec_len(&mut wire, 1);
    wire.extend_from_slice(&signature);
    wire.extend_from_slice(&message);

    Ok((wire, bs58::encode(signature).into_string()))
}

/// Settlement over a Solana cluster.
#[derive(Debug, Clone)]
pub struct SolanaSettlement {
    rpc: SolanaRpc,
}

impl SolanaSettlement {
    pub fn new(rpc: SolanaRpc) -> Self {
        Self { rpc }
    }

    pub fn rpc(&self) -> &SolanaRpc {
        &self.rpc
    }

    /// Wait for a signature to reach the configured commitment.
    pub async fn wait_for_confirmation(&self, signature: &str) -> ChainResult<()> {
        let timeout_secs = self.rpc.config().confirmation_timeout_secs;

        let result = timeout(Duration::from_secs(timeout_secs), async {
            let mut backoff = Backoff::new(CONFIRM_POLL_BASE, CONFIRM_POLL_MAX);
            loop {
                sleep(backoff.next_delay()).await;

                match self.rpc.get_signature_status(signature).await {
                    Ok(ConfirmationStatus::Confirmed) => return Ok(()),
                    Ok(ConfirmationStatus::Failed(err)) => return Err(ChainError::Failed(err)),
                    Ok(ConfirmationStatus::Pending) => {
                        tracing::debug!(signature, "Transaction pending");
                    }
                    // A flaky status read is not a failed transfer; keep polling
                    Err(e) => tracing::debug!(signature, error = %e, "Status poll failed"),
                }
            }
        })
        .await;

        match result {
            Ok(outcome) => outcome,
            Err(_) => Err(ChainError::ConfirmationTimeout {
                signature: signature.to_string(),
                secs: timeout_secs,
            }),
        }
    }
}

#[async_trait]
impl Settlement for SolanaSettlement {
    async fn balance(&self, public_key: &str) -> ChainResult<Lamports> {
        self.rpc.get_balance(public_key).await
    }

    async fn transfer(&self, from: &Keypair, to: &str, amount: Lamports) -> ChainResult<Receipt> {
        let blockhash = self.rpc.get_latest_blockhash().await?;
        let (wire, signature) = signed_transfer(from, to, amount, &blockhash)?;

        let submitted = self.rpc.send_transaction(&BASE64.encode(&wire)).await?;
        if submitted != signature {
            tracing::warn!(expected = %signature, returned = %submitted, "RPC returned unexpected signature");
        }

        tracing::info!(
            from = %from.public_key(),
            to,
            lamports = amount.0,
            signature = %signature,
            "Transfer submitted"
        );

        self.wait_for_confirmation(&signature).await?;
        Ok(Receipt { signature })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_vec_encoding() {
        let cases: [(usize, &[u8]); 5] = [
            (0, &[0x00]),
            (1, &[0x01]),
            (127, &[0x7f]),
            (128, &[0x80, 0x01]),
            (16_384, &[0x80, 0x80, 0x01]),
        ];
        for (len, expected) in cases {
            let mut buf = Vec::new();
            push_short_vec_len(&mut buf, len);
            assert_eq!(buf, expected, "len {}", len);
        }
    }

    #[test]
    fn test_transfer_message_layout() {
        let from = [1u8; 32];
        let to = [2u8; 32];
        let blockhash = [3u8; 32];
        let msg = transfer_message(&from, &to, Lamports(5_000), &blockhash);

        assert_eq!(&msg[0..3], &[1, 0, 1]);
        assert_eq!(msg[3], 3);
        assert_eq!(&msg[4..36], &from);
        assert_eq!(&msg[36..68], &to);
        assert_eq!(&msg[68..100], &SYSTEM_PROGRAM_ID);
        assert_eq!(&msg[100..132], &blockhash);
        // one instruction: program 2, accounts [0, 1], 12 data bytes
        assert_eq!(&msg[132..137], &[1, 2, 2, 0, 1]);
        assert_eq!(msg[137], 12);
        assert_eq!(&msg[138..142], &2u32.to_le_bytes());
        assert_eq!(&msg[142..150], &5_000u64.to_le_bytes());
        assert_eq!(msg.len(), 150);
    }

    #[test]
    fn test_signed_transfer_signature_covers_message() {
        use ed25519_dalek::{Signature, Verifier, VerifyingKey};

        let from = Keypair::generate();
        let to = Keypair::generate();
        let (wire, signature) =
            signed_transfer(&from, &to.public_key(), Lamports(1), &[9u8; 32]).unwrap();

        assert_eq!(wire[0], 1);
        let sig_bytes: [u8; 64] = wire[1..65].try_into().unwrap();
        assert_eq!(bs58::encode(sig_bytes).into_string(), signature);

        let verifying = VerifyingKey::from_bytes(&from.public_key_bytes()).unwrap();
        assert!(verifying
            .verify(&wire[65..], &Signature::from_bytes(&sig_bytes))
            .is_ok());
    }

    #[test]
    fn test_self_transfer_rejected() {
        let from = Keypair::generate();
        let err = signed_transfer(&from, &from.public_key(), Lamports(1), &[0u8; 32]).unwrap_err();
        assert!(matches!(err, ChainError::InvalidAddress(_)));
    }
}
