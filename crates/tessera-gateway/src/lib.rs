//! # Tessera Gateway
//!
//! HTTP front end of the Tessera gateway: one S3 endpoint in front of several
//! regional replica clusters.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              S3 Clients                 │
//! └─────────────────┬───────────────────────┘
//!                   │ HTTP
//! ┌─────────────────▼───────────────────────┐
//! │     axum router (request id, logs)      │
//! ├─────────────────────────────────────────┤
//! │   RegionResolver (host → region ring)   │
//! ├─────────────────────────────────────────┤
//! │   Cluster fan-out, pickers, merger      │
//! └─────────────────┬───────────────────────┘
//!                   │ HttpTransport
//! ┌─────────────────▼───────────────────────┐
//! │        Regional storage backends        │
//! └─────────────────────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod middleware;
pub mod regions;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{BackendConfig, GatewayConfig, RegionConfig, SyncLogConfig};
pub use error::{ApiError, ConfigError, S3ErrorCode};
pub use regions::{RegionResolver, NO_REGION_BODY};
pub use routes::create_router;
pub use server::{run_server, run_server_with_shutdown, serve};
pub use state::AppState;
