//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Relay operations produce:
//!     → logging.rs (structured tracing events, request id on every line)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (text or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```

pub mod logging;
pub mod metrics;
