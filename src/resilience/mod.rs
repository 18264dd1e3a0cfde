//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Participant teardown:
//!     → timeouts.rs (race a blocking close against the phase deadline)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable for bounded phases; every close has a deadline
//! - The coordinator stops waiting on a hung close, it never kills it

pub mod timeouts;
