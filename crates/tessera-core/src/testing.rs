//! Fixtures for exercising pickers, mergers and routing without a network

use crate::backend::{Backend, RoundTrip};
use crate::error::{BackendError, TransportError};
use crate::outcome::{synthesized_response, Outcome};
use crate::request::ProxyRequest;
use async_trait::async_trait;
use bytes::Bytes;
use http::StatusCode;
use std::sync::Arc;
use url::Url;

/// Transport answering every request with the same canned response
#[derive(Clone, Debug)]
pub struct StaticTransport {
    status: StatusCode,
    body: Bytes,
    fail: bool,
}

impl StaticTransport {
    /// 200 with `body`
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::with_status(StatusCode::OK, body)
    }

    /// Canned status and body
    pub fn with_status(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            body: body.into(),
            fail: false,
        }
    }

    /// Every call fails at the transport level
    pub fn failing() -> Self {
        Self {
            status: StatusCode::OK,
            body: Bytes::new(),
            fail: true,
        }
    }
}

#[async_trait]
impl RoundTrip for StaticTransport {
    async fn round_trip(
        &self,
        _request: &ProxyRequest,
        target: Url,
    ) -> Result<reqwest::Response, TransportError> {
        if self.fail {
            return Err(TransportError::InvalidTarget(format!(
                "connection refused: {}",
                target
            )));
        }
        Ok(synthesized_response(self.status, self.body.clone()))
    }
}

/// Backend named `name` reachable at `http://<name>.internal:9000`
pub fn test_backend(name: &str) -> Arc<Backend> {
    test_backend_with(name, StaticTransport::ok(""))
}

/// Backend named `name` using `transport`
pub fn test_backend_with(name: &str, transport: impl RoundTrip + 'static) -> Arc<Backend> {
    let endpoint = Url::parse(&format!("http://{}.internal:9000", name))
        .unwrap_or_else(|_| Url::parse("http://localhost:9000").expect("static url"));
    Arc::new(Backend::new(name, endpoint, Arc::new(transport)))
}

/// Outcome holding a response with `status` and `body` from backend `name`
pub fn outcome_with_status(
    request: &Arc<ProxyRequest>,
    name: &str,
    status: StatusCode,
    body: impl Into<Bytes>,
) -> Outcome {
    let body: Bytes = body.into();
    Outcome::from_response(
        test_backend(name),
        Arc::clone(request),
        synthesized_response(status, body),
    )
}

/// Outcome failed by the maintenance short-circuit of backend `name`
pub fn failed_outcome(request: &Arc<ProxyRequest>, name: &str) -> Outcome {
    let backend = test_backend(name);
    let error = BackendError::Unavailable {
        host: backend.host().to_string(),
    };
    Outcome::from_error(backend, Arc::clone(request), error)
}

/// Successful outcome when `good`, maintenance failure otherwise
pub fn outcome(request: &Arc<ProxyRequest>, name: &str, good: bool) -> Outcome {
    if good {
        outcome_with_status(request, name, StatusCode::OK, "ok")
    } else {
        failed_outcome(request, name)
    }
}
