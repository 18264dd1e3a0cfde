//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Coordinator and adapters produce:
//!     → logging.rs (structured log events, one span per shutdown run)
//!     → metrics.rs (run outcomes, phase durations, close failures)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Each shutdown run carries a UUID correlation id on its span
//! - Metrics are cheap (atomic increments); recording without an installed
//!   exporter is a no-op

pub mod logging;
pub mod metrics;
