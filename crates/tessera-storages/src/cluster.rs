//! Replicating cluster
//!
//! Every backend of a cluster holds a full replica. A request is sent to all
//! of them at once and the outcomes are reconciled by the strategy the
//! request classifies as.

use crate::merger::ListingMerger;
use crate::picker::{DeletePicker, ObjectPicker};
use crate::strategy::Strategy;
use crate::synclog::SyncSender;
use async_trait::async_trait;
use std::sync::Arc;
use tessera_core::{Backend, Fanout, OutcomeStream, Picked, ProxyRequest, Result, Ring};
use tokio::sync::mpsc;
use tracing::debug;

/// A region's set of replica backends
#[derive(Debug)]
pub struct Cluster {
    name: String,
    backends: Vec<Arc<Backend>>,
    sync: Arc<SyncSender>,
}

impl Cluster {
    pub fn new(name: impl Into<String>, backends: Vec<Arc<Backend>>, sync: Arc<SyncSender>) -> Self {
        Self {
            name: name.into(),
            backends,
            sync,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backends(&self) -> &[Arc<Backend>] {
        &self.backends
    }
}

#[async_trait]
impl Fanout for Cluster {
    async fn fan_out(&self, request: Arc<ProxyRequest>) -> OutcomeStream {
        // One slot per backend: no sender ever waits on the consumer
        let (tx, rx) = mpsc::channel(self.backends.len().max(1));
        for backend in &self.backends {
            let backend = Arc::clone(backend);
            let request = Arc::clone(&request);
            let tx = tx.clone();
            tokio::spawn(async move {
                let outcome = backend.call(request).await;
                if let Err(mpsc::error::SendError(outcome)) = tx.send(outcome).await {
                    outcome.discard_body().await;
                }
            });
        }
        rx
    }
}

#[async_trait]
impl Ring for Cluster {
    async fn do_request(&self, request: ProxyRequest) -> Result<Picked> {
        let strategy = Strategy::classify(&request);
        debug!(
            "cluster {} serving {} {} as {:?}",
            self.name, request.method, request.uri, strategy
        );

        let request = Arc::new(request);
        let stream = self.fan_out(Arc::clone(&request)).await;
        match strategy {
            Strategy::Object => ObjectPicker::new(Arc::clone(&self.sync)).pick(stream).await,
            Strategy::Delete => DeletePicker::new(Arc::clone(&self.sync)).pick(stream).await,
            Strategy::Listing => ListingMerger.pick(&request, stream).await,
        }
    }
}
