//! HTTP surface.
//!
//! # Data Flow
//! ```text
//! client request
//!     → request id, trace, timeout, body limit layers
//!     → handlers.rs (parse body / path / query)
//!     → Accounts, Ledger, ChallengeEngine
//!     → views.rs (public shapes, no sealed secrets)
//!     → JSON response, errors via error.rs
//! ```
//!
//! # Design Decisions
//! - Handlers are thin pass-throughs; no business rules live here
//! - Status polling endpoints answer "not ready" instead of 404 so clients can
//!   poll without distinguishing absence from pending

pub mod error;
pub mod handlers;
pub mod server;
pub mod views;

pub use error::ApiError;
pub use server::{AppState, HttpServer};
