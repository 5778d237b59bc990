//! HTTP forwarding relay library.
//!
//! A client names a target URL in a query parameter; the relay forwards the
//! request there and streams the answer back, rewriting upstream redirects
//! so they route through the relay again.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod relay;

pub use config::schema::RelayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use relay::{RelayEngine, RelayError};
