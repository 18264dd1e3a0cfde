//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits, close signal)
//!     → echo.rs (per-connection handler)
//!
//! Shutdown:
//!     ListenerCloser::close → accept() returns Closed → accept loop exits
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Closing a listener stops new connections; accepted ones run to completion

pub mod echo;
pub mod listener;

pub use listener::{BoundedListener, ConnectionPermit, ListenerCloser, ListenerError};
