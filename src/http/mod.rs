//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, in-flight limit)
//!     → relay engine (spawned per request)
//!     → sink.rs (head over oneshot, body over bounded channel)
//!     → Send to client
//! ```

pub mod server;
pub mod sink;

pub use server::HttpServer;
pub use sink::{ChannelSink, PendingResponse};
