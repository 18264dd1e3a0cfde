//! Graceful shutdown coordination library.
//!
//! Services register their servers, listeners, outbound clients, identity
//! providers and cleanup callbacks with a [`Coordinator`]. On shutdown the
//! coordinator tears them down in a fixed five-phase order, bounds each
//! bounded phase by its configured budget, and reports every failure in one
//! composite error.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;

pub use config::schema::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::{Coordinator, ShutdownConfig, ShutdownContext, ShutdownError, Stoppable};
