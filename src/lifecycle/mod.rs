//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     Signal received → broadcast to poller, sweeper, HTTP server → flush store → exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Background loops finish their current tick before exiting
//! - The store is flushed after every loop has stopped

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
