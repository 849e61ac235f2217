//! # Tessera Core
//!
//! Request and outcome model shared by every layer of the Tessera gateway.
//!
//! This crate provides:
//! - **Requests**: the buffered client request and its addressing mode
//! - **Backends**: the per-backend call wrapper with maintenance handling
//! - **Outcomes**: per-backend results and the client-facing pick
//! - **Rings**: the fan-out abstraction a region is served through
//! - **Metrics**: the sink backends and the divergence logger report to
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            Region Resolver              │
//! ├─────────────────────────────────────────┤
//! │       Ring (fan-out + reconcile)        │
//! ├─────────────────────────────────────────┤
//! │   Backend   │   Backend   │   Backend   │
//! ├─────────────┴─────────────┴─────────────┤
//! │          RoundTrip transport            │
//! └─────────────────────────────────────────┘
//! ```

pub mod backend;
pub mod error;
pub mod metrics;
pub mod outcome;
pub mod request;
pub mod ring;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use backend::{Backend, RoundTrip};
pub use error::{BackendError, CoreError, Result, TransportError};
pub use metrics::{InMemoryMetrics, MetricsFacade, MetricsSink};
pub use outcome::{
    synthesized_response, synthesized_response_with_headers, Outcome, OutcomeDigest,
    OutcomeStream, Picked,
};
pub use request::{strip_port, Addressing, ProxyRequest};
pub use ring::{Fanout, Ring};
