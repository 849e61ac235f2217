//! Backend adapter
//!
//! A [`Backend`] is one storage node behind the gateway. [`Backend::call`]
//! addresses a client request to the node, short-circuits when the node is in
//! maintenance mode, wraps transport failures with the node's identity and
//! records per-backend timers exactly once per call.

use crate::error::{BackendError, TransportError};
use crate::metrics::{MetricsFacade, MetricsSink};
use crate::outcome::Outcome;
use crate::request::ProxyRequest;
use async_trait::async_trait;
use http::{Method, StatusCode};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;
use url::Url;

/// Transport used by a backend to perform the actual HTTP exchange
#[async_trait]
pub trait RoundTrip: Send + Sync {
    /// Send `request` to `target` and return the backend's response
    async fn round_trip(
        &self,
        request: &ProxyRequest,
        target: Url,
    ) -> Result<reqwest::Response, TransportError>;
}

/// One storage node behind the gateway
pub struct Backend {
    name: String,
    endpoint: Url,
    host: String,
    maintenance: AtomicBool,
    transport: Arc<dyn RoundTrip>,
    metrics: Arc<dyn MetricsSink>,
}

impl Backend {
    /// Create a backend reporting to the global metrics facade
    pub fn new(name: impl Into<String>, endpoint: Url, transport: Arc<dyn RoundTrip>) -> Self {
        let host = match (endpoint.host_str(), endpoint.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => String::new(),
        };
        Self {
            name: name.into(),
            endpoint,
            host,
            maintenance: AtomicBool::new(false),
            transport,
            metrics: Arc::new(MetricsFacade),
        }
    }

    /// Report metrics to `metrics` instead of the global facade
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Set the initial maintenance flag
    pub fn with_maintenance(self, maintenance: bool) -> Self {
        self.set_maintenance(maintenance);
        self
    }

    /// Backend name from configuration
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Endpoint the backend is reached at
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// `host[:port]` of the endpoint
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Whether the backend is drained for maintenance
    pub fn is_in_maintenance(&self) -> bool {
        self.maintenance.load(Ordering::Acquire)
    }

    /// Drain the backend or bring it back
    pub fn set_maintenance(&self, maintenance: bool) {
        self.maintenance.store(maintenance, Ordering::Release);
    }

    /// Request target rewritten onto this backend's scheme and host
    pub fn target_url(&self, request: &ProxyRequest) -> Url {
        let mut target = self.endpoint.clone();
        target.set_path(request.path());
        target.set_query(request.query());
        target
    }

    /// Perform `request` against this backend
    pub async fn call(self: &Arc<Self>, request: Arc<ProxyRequest>) -> Outcome {
        let mut metrics = CallMetrics::start(self, &request.method);

        if self.is_in_maintenance() {
            debug!(
                "request {} blocked, {} is in maintenance mode",
                request.request_id, self.host
            );
            metrics.failed();
            let error = BackendError::Unavailable {
                host: self.host.clone(),
            };
            return Outcome::from_error(Arc::clone(self), request, error);
        }

        let target = self.target_url(&request);
        match self.transport.round_trip(&request, target).await {
            Ok(response) => {
                debug!(
                    "response for request {} from {} with status {}",
                    request.request_id,
                    self.host,
                    response.status()
                );
                metrics.responded(response.status());
                Outcome::from_response(Arc::clone(self), request, response)
            }
            Err(source) => {
                debug!(
                    "request {} to {} failed: {}",
                    request.request_id, self.host, source
                );
                metrics.failed();
                let error = BackendError::Transport {
                    host: self.host.clone(),
                    source,
                };
                Outcome::from_error(Arc::clone(self), request, error)
            }
        }
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("name", &self.name)
            .field("endpoint", &self.endpoint.as_str())
            .field("maintenance", &self.is_in_maintenance())
            .finish()
    }
}

/// Records the per-backend timers when dropped, whatever path the call took
struct CallMetrics<'a> {
    sink: &'a dyn MetricsSink,
    prefix: String,
    method: Method,
    since: Instant,
    status: Option<StatusCode>,
    failed: bool,
}

impl<'a> CallMetrics<'a> {
    fn start(backend: &'a Backend, method: &Method) -> Self {
        Self {
            sink: backend.metrics.as_ref(),
            prefix: format!("reqs.backend.{}", backend.name),
            method: method.clone(),
            since: Instant::now(),
            status: None,
            failed: false,
        }
    }

    fn responded(&mut self, status: StatusCode) {
        self.status = Some(status);
    }

    fn failed(&mut self) {
        self.failed = true;
    }
}

impl Drop for CallMetrics<'_> {
    fn drop(&mut self) {
        self.sink.update_since(&format!("{}.all", self.prefix), self.since);
        if self.failed {
            self.sink.update_since(&format!("{}.err", self.prefix), self.since);
        }
        if let Some(status) = self.status {
            self.sink.update_since(
                &format!("{}.status_{}", self.prefix, status.as_u16()),
                self.since,
            );
        }
        self.sink.update_since(
            &format!("{}.method_{}", self.prefix, self.method),
            self.since,
        );
    }
}
