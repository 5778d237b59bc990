//! Request/response relay core.
//!
//! # Data Flow
//! ```text
//! inbound request
//!     → target.rs (Target Resolver, policy.rs)
//!     → outbound.rs (Outbound Request Builder, headers.rs)
//!     → transport.rs (Transport trait; reqwest in production)
//!     → redirect.rs if 3xx, else response.rs
//!     → sink.rs (caller-facing response channel)
//! ```
//!
//! engine.rs ties the stages together for a single request. Nothing in this
//! module knows about axum routing; the HTTP adapter lives in `crate::http`.

pub mod context;
pub mod engine;
pub mod error;
pub mod headers;
pub mod message;
pub mod method;
pub mod outbound;
pub mod policy;
pub mod redirect;
pub mod response;
pub mod sink;
pub mod target;
pub mod transport;

pub use context::RelayContext;
pub use engine::{EngineError, RelayEngine, RelayOutcome};
pub use error::{RelayError, RelayResult};
pub use message::{OutboundRequest, ProxyRequest, ProxyResponse, ResponseHead};
pub use method::RelayMethod;
pub use sink::ResponseSink;
pub use transport::{HttpTransport, Transport, TransportError};
