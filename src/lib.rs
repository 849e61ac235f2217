//! # Tessera
//!
//! Multi-region S3 routing gateway. A request is routed to a region by the
//! host it addresses, sent to every replica backend of that region, and the
//! replicas' answers are reconciled into one response.
//!
//! The work is split across the workspace crates re-exported here:
//! - `tessera_core`: request and outcome model, backend adapter, ring traits
//! - `tessera_transport`: rule-matched HTTP clients
//! - `tessera_storages`: cluster fan-out, pickers, listing merge, divergence log
//! - `tessera_gateway`: configuration, region resolver, HTTP server

pub use tessera_core::{Backend, CoreError, Picked, ProxyRequest, Ring};
pub use tessera_gateway::{
    create_router, run_server, run_server_with_shutdown, AppState, ConfigError, GatewayConfig,
    RegionResolver,
};
pub use tessera_storages::{Cluster, SyncSender};
