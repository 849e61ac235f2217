//! Ring abstraction: how a region's backends are reached

use crate::error::Result;
use crate::outcome::{OutcomeStream, Picked};
use crate::request::ProxyRequest;
use async_trait::async_trait;
use std::sync::Arc;

/// Sends one request to every member backend concurrently
#[async_trait]
pub trait Fanout: Send + Sync {
    /// Start the fan-out and return the channel the outcomes arrive on
    async fn fan_out(&self, request: Arc<ProxyRequest>) -> OutcomeStream;
}

/// Serves a client request from a region's backends
#[async_trait]
pub trait Ring: Send + Sync {
    /// Fan `request` out and reconcile the outcomes into one response
    async fn do_request(&self, request: ProxyRequest) -> Result<Picked>;
}
