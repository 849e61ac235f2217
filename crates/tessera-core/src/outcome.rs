//! Per-backend outcomes and the result handed back to the client

use crate::backend::Backend;
use crate::error::BackendError;
use crate::request::ProxyRequest;
use http::{header, HeaderMap, StatusCode};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Channel carrying the outcomes of one fan-out to its single consumer
pub type OutcomeStream = mpsc::Receiver<Outcome>;

/// One backend's result for one client request
///
/// An outcome is consumed exactly once. Whoever drops it without handing the
/// response on must call [`Outcome::discard_body`] so the backend connection
/// can be reused.
pub struct Outcome {
    /// Backend that produced this outcome
    pub backend: Arc<Backend>,
    /// Originating request
    pub request: Arc<ProxyRequest>,
    /// Backend response, if one was received
    pub response: Option<reqwest::Response>,
    /// Error, if the call failed before a response was received
    pub error: Option<BackendError>,
}

impl Outcome {
    /// Outcome carrying a backend response
    pub fn from_response(
        backend: Arc<Backend>,
        request: Arc<ProxyRequest>,
        response: reqwest::Response,
    ) -> Self {
        Self {
            backend,
            request,
            response: Some(response),
            error: None,
        }
    }

    /// Outcome carrying an error
    pub fn from_error(backend: Arc<Backend>, request: Arc<ProxyRequest>, error: BackendError) -> Self {
        Self {
            backend,
            request,
            response: None,
            error: Some(error),
        }
    }

    /// No error, a response, and a status below 400
    pub fn is_successful(&self) -> bool {
        self.error.is_none()
            && self
                .response
                .as_ref()
                .is_some_and(|r| r.status().as_u16() < 400)
    }

    /// Status of the response, if any
    pub fn status(&self) -> Option<StatusCode> {
        self.response.as_ref().map(|r| r.status())
    }

    /// Body-less snapshot used for divergence logging
    pub fn digest(&self) -> OutcomeDigest {
        OutcomeDigest {
            backend: Arc::clone(&self.backend),
            request: Arc::clone(&self.request),
            status: self.status(),
            content_length: self.response.as_ref().and_then(content_length),
            error: self.error.as_ref().map(|e| e.to_string()),
        }
    }

    /// Take the response, leaving nothing behind to drain
    pub fn into_response(self) -> Option<reqwest::Response> {
        self.response
    }

    /// Drain and drop the response body so the connection is released
    pub async fn discard_body(self) {
        let request_id = self.request.request_id.clone();
        let Some(response) = self.response else {
            debug!("response body for request {} is empty, nothing to discard", request_id);
            return;
        };
        match drain_body(response).await {
            Ok(drained) => debug!(
                "discarded {} bytes of response body from {} for request {}",
                drained,
                self.backend.host(),
                request_id
            ),
            Err(e) => warn!(
                "discard body error from {} for request {}: {}",
                self.backend.host(),
                request_id,
                e
            ),
        }
    }
}

/// Read `response` to its end one chunk at a time, keeping nothing
async fn drain_body(mut response: reqwest::Response) -> reqwest::Result<u64> {
    let mut drained = 0u64;
    while let Some(chunk) = response.chunk().await? {
        drained += chunk.len() as u64;
    }
    Ok(drained)
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Outcome")
            .field("backend", &self.backend.name())
            .field("request_id", &self.request.request_id)
            .field("status", &self.status())
            .field("error", &self.error)
            .finish()
    }
}

fn content_length(response: &reqwest::Response) -> Option<u64> {
    response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .or_else(|| response.content_length())
}

/// Snapshot of an outcome taken before its body is consumed
#[derive(Clone, Debug)]
pub struct OutcomeDigest {
    /// Backend that produced the outcome
    pub backend: Arc<Backend>,
    /// Originating request
    pub request: Arc<ProxyRequest>,
    /// Response status, if a response was received
    pub status: Option<StatusCode>,
    /// Response content length, if known
    pub content_length: Option<u64>,
    /// Error text, if the call failed
    pub error: Option<String>,
}

impl OutcomeDigest {
    /// Same success predicate as [`Outcome::is_successful`]
    pub fn is_successful(&self) -> bool {
        self.error.is_none() && self.status.is_some_and(|s| s.as_u16() < 400)
    }
}

/// Client-facing result of a fan-out
#[derive(Debug)]
pub struct Picked {
    /// Response to return to the client
    pub response: reqwest::Response,
    /// Completes once outcomes still in flight when the response was chosen
    /// have been drained and their divergences recorded
    pub settled: Option<JoinHandle<()>>,
}

impl Picked {
    /// Result with nothing left in flight
    pub fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            settled: None,
        }
    }

    /// Result whose remaining outcomes are drained by `settled`
    pub fn with_settlement(response: reqwest::Response, settled: JoinHandle<()>) -> Self {
        Self {
            response,
            settled: Some(settled),
        }
    }

    /// Wait for background draining, then return the response
    pub async fn settle(self) -> reqwest::Response {
        if let Some(handle) = self.settled {
            if let Err(e) = handle.await {
                warn!("draining task failed: {}", e);
            }
        }
        self.response
    }
}

/// Build a response that did not come from any backend
pub fn synthesized_response(status: StatusCode, body: impl Into<reqwest::Body>) -> reqwest::Response {
    synthesized_response_with_headers(status, HeaderMap::new(), body)
}

/// Build a gateway-generated response with the given headers
pub fn synthesized_response_with_headers(
    status: StatusCode,
    headers: HeaderMap,
    body: impl Into<reqwest::Body>,
) -> reqwest::Response {
    let mut response = http::Response::new(body.into());
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    reqwest::Response::from(response)
}
