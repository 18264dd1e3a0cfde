//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (registry.rs):
//!     Server / Listener / Client / IdentityProvider / Cleanup → typed bins
//!
//! Shutdown (shutdown.rs → phases.rs):
//!     Trigger → freeze registry → phases 1+2 → 3 → 4 → 5 → aggregated result
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Coordinator::shutdown with an overall deadline
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accepting, then dependents, then credentials, then cleanup
//! - Every bounded phase derives its deadline from the caller's context
//! - Shutdown runs once; later callers observe the same outcome
//! - Failures never abort the sequence; they are collected and returned together

pub mod context;
pub mod errors;
pub mod participant;
pub mod phases;
pub mod registry;
pub mod shutdown;
pub mod signals;
pub mod worker;

pub use context::{CancelCause, ShutdownContext};
pub use errors::{CloseError, ErrorAggregator, ShutdownError};
pub use participant::{stoppable_fn, BoxError, ParticipantKind, Stoppable};
pub use phases::Phase;
pub use registry::ParticipantCounts;
pub use shutdown::{Coordinator, ShutdownConfig};
pub use signals::{shutdown_on, shutdown_on_signal, wait_for_shutdown_signal, SignalError};
pub use worker::BackgroundTask;
