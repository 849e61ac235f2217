//! Listing merger
//!
//! Bucket listings are served by every replica; the merger unions their
//! entries, drops duplicates and cuts one correctly paginated page.

pub mod container;
pub mod list_v1;
pub mod list_v2;
pub mod s3types;
pub mod versions;

use crate::picker::drain_remaining;
use crate::strategy::is_mergable;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use serde::de::DeserializeOwned;
use tessera_core::{
    synthesized_response, synthesized_response_with_headers, CoreError, OutcomeStream, Picked,
    ProxyRequest, Result,
};
use tracing::{debug, warn};

pub use list_v1::merge_list_v1;
pub use list_v2::merge_list_v2;
pub use versions::merge_versions;

/// Page size used when `max-keys` is absent or unparsable
pub const DEFAULT_MAX_KEYS: usize = 1000;

/// One backend's raw listing document
#[derive(Clone, Debug)]
pub struct ListingBody {
    /// Host of the backend that produced it
    pub backend: String,
    pub body: Bytes,
}

impl ListingBody {
    pub fn new(backend: impl Into<String>, body: impl Into<Bytes>) -> Self {
        Self {
            backend: backend.into(),
            body: body.into(),
        }
    }
}

/// Parse a listing; an unreadable one is logged and skipped
pub(crate) fn parse_listing<T: DeserializeOwned>(listing: &ListingBody) -> Option<T> {
    match s3types::from_xml(&listing.body) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!("cannot parse listing from {}: {}", listing.backend, e);
            None
        }
    }
}

/// Listing API a request uses
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListingKind {
    /// ListObjects
    V1,
    /// ListObjectsV2 (`list-type=2`)
    V2,
    /// ListObjectVersions (`versions`)
    Versions,
}

impl ListingKind {
    pub fn of(request: &ProxyRequest) -> Self {
        if request.query_param("list-type").as_deref() == Some("2") {
            Self::V2
        } else if request.has_query_param("versions") {
            Self::Versions
        } else {
            Self::V1
        }
    }
}

/// Page size requested by the client
pub fn max_keys(request: &ProxyRequest) -> usize {
    request
        .query_param("max-keys")
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MAX_KEYS)
}

/// Merge listing documents of one kind into one serialized page
pub fn merge(kind: ListingKind, bodies: &[ListingBody], max_keys: usize) -> Result<String> {
    match kind {
        ListingKind::V1 => merge_list_v1(bodies, max_keys),
        ListingKind::V2 => merge_list_v2(bodies, max_keys),
        ListingKind::Versions => merge_versions(bodies, max_keys),
    }
}

/// Reconciles listing fan-outs
#[derive(Clone, Copy, Debug, Default)]
pub struct ListingMerger;

impl ListingMerger {
    /// Consume every outcome and answer with the merged listing
    ///
    /// Requests the merger cannot serve get a 501; their outcomes are drained
    /// in the background.
    pub async fn pick(&self, request: &ProxyRequest, mut stream: OutcomeStream) -> Result<Picked> {
        if !is_mergable(&request.method, &request.bucket_path(), request.query()) {
            debug!(
                "request {} is not a mergable listing, answering 501",
                request.request_id
            );
            let settled = tokio::spawn(async move {
                drain_remaining(stream).await;
            });
            return Ok(Picked::with_settlement(
                synthesized_response(StatusCode::NOT_IMPLEMENTED, ""),
                settled,
            ));
        }

        let mut head: Option<(StatusCode, HeaderMap)> = None;
        let mut bodies = Vec::new();
        let mut last_status = None;

        while let Some(outcome) = stream.recv().await {
            if !outcome.is_successful() {
                last_status = outcome.status().or(last_status);
                outcome.discard_body().await;
                continue;
            }
            let backend = outcome.backend.host().to_string();
            let Some(response) = outcome.into_response() else {
                continue;
            };
            head.get_or_insert_with(|| (response.status(), response.headers().clone()));
            match response.bytes().await {
                Ok(body) => bodies.push(ListingBody::new(backend, body)),
                Err(e) => warn!("cannot read listing from {}: {}", backend, e),
            }
        }

        let Some((status, headers)) = head else {
            return Err(CoreError::NoSuccessfulResponses { last_status });
        };

        let kind = ListingKind::of(request);
        debug!(
            "merging {} {:?} listings for request {}",
            bodies.len(),
            kind,
            request.request_id
        );
        let xml = merge(kind, &bodies, max_keys(request))?;
        Ok(Picked::new(listing_response(status, headers, xml)))
    }
}

/// First success's response with the merged document as its body
fn listing_response(status: StatusCode, mut headers: HeaderMap, xml: String) -> reqwest::Response {
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::TRANSFER_ENCODING);
    headers.remove(header::CONTENT_ENCODING);
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/xml"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(xml.len()));
    synthesized_response_with_headers(status, headers, xml)
}
