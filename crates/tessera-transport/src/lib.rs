//! # Tessera Transport
//!
//! Backend HTTP transports selected per request by ordered transport rules.
//!
//! A rule declares up to three regular-expression triggers (method, path and
//! raw query string) and the client tuning they select. Rules are compiled
//! once at startup; a malformed pattern is a configuration error, never a
//! per-request one.
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_transport::{HttpTransport, TransportRule, Triggers};
//!
//! let transport = HttpTransport::new(vec![
//!     TransportRule::new("listing", Triggers::method("GET")),
//!     TransportRule::new("default", Triggers::default()),
//! ])?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod matcher;

pub use client::{HttpTransport, FALLBACK_TRANSPORT};
pub use config::{TransportRule, Triggers, TuningProfile};
pub use error::{Result, TransportConfigError};
pub use matcher::{CompiledRule, TransportMatcher};
