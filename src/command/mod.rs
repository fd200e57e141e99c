//! Post text → structured command.
//!
//! # Data Flow
//! ```text
//! feed Post.text
//!     → grammar.rs parse() (first matching pattern wins)
//!     → Option<Command>
//!     → poller dispatch (None is silently ignored)
//! ```
//!
//! # Design Decisions
//! - Stateless and infallible: unrecognized text is `None`, never an error
//! - Patterns are unanchored so leading mentions and hashtags are tolerated
//! - Keywords are case-insensitive; base-58 operands are not

pub mod grammar;

pub use grammar::{is_valid_address, parse, Command, CommandKind};
