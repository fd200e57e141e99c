//! Resilience helpers.
//!
//! # Data Flow
//! ```text
//! Settlement confirmation polling:
//!     → backoff.rs (growing delay between status reads)
//!     → bounded overall by the confirmation timeout
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Jitter spreads polls from concurrent transfers

pub mod backoff;
