//! Challenge-response engine.
//!
//! # Data Flow
//! ```text
//! client  ── begin(subject, handle, payload) ──▶ Challenge {code, delivery_key}
//! user    ── posts "<FLOW> <code>" ──▶ poller ── verify(code, author)
//!                                        └─▶ Flow::execute
//!                                              ├─ Deliver(content) → deliveries/{delivery_key}
//!                                              └─ MarkVerified     → challenge kept, verified
//! client  ── collect(delivery_key) ──▶ content, deleted in the same call
//! ```
//!
//! # Design Decisions
//! - One engine, three flows; a flow supplies its payload, validation and side effect
//! - Codes are scoped per flow and claimed with a conditional insert
//! - A delivery is readable once and only until its own short expiry

pub mod engine;
pub mod flows;
pub mod types;

pub use engine::{ChallengeEngine, Flow};
pub use flows::{ExportFlow, UpdateFlow, UpdatePayload, WithdrawFlow, WithdrawPayload};
pub use types::{
    Challenge, ChallengeError, ChallengeResult, DeliveredContent, DeliveredSecret, Issued,
    Resolution, UpdateStatus, VerifyOutcome,
};
