//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request tracing)
//!     → handlers (/health, /slow)
//!
//! Shutdown:
//!     ServerHandle::close → axum graceful shutdown → in-flight requests finish → serve loop returns
//! ```

pub mod server;

pub use server::{HttpServer, ServerHandle};
