//! Post ingestion.
//!
//! # Data Flow
//! ```text
//! ticker (poller.interval_secs)
//!     → SocialFeed::mentions(handle, since = last seen id)
//!     → for each post, oldest first:
//!         processed_events row exists? → skip
//!         command::parse(text) is None? → skip, no row
//!         insert processed_events row (processing)
//!         resolve author account → none? abandon, row stays processing
//!         dispatch → ledger (CREATE, FUND) or challenge engine (EXPORT, WITHDRAW, UPDATE)
//!         merge row status (completed / failed + detail)
//!         advance cursor
//! ```
//!
//! # Design Decisions
//! - The processing row is written before anything executes: a crash mid-command
//!   loses the command rather than running it twice
//! - Failed commands are recorded, never retried
//! - The cursor is explicit state owned by the run loop, not a global
//! - A busy flag makes an overlapping tick a no-op

pub mod event;
pub mod worker;

pub use event::{EventStatus, ProcessedEvent};
pub use worker::{Poller, PollerError, PollerState, TickSummary};
