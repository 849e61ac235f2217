//! HTTP transport with one tuned client per transport rule

use crate::config::{TransportRule, TuningProfile};
use crate::error::{Result, TransportConfigError};
use crate::matcher::TransportMatcher;
use async_trait::async_trait;
use http::{header, HeaderMap, Method};
use tessera_core::{ProxyRequest, RoundTrip, TransportError};
use tracing::{debug, instrument};
use url::Url;

/// Name reported for requests no rule matched
pub const FALLBACK_TRANSPORT: &str = "fallback";

/// Headers that belong to one hop and must not be forwarded
const HOP_BY_HOP: [header::HeaderName; 7] = [
    header::CONNECTION,
    header::PROXY_AUTHORIZATION,
    header::TE,
    header::TRAILER,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::CONTENT_LENGTH,
];

/// Backend transport choosing its HTTP client per request
#[derive(Clone, Debug)]
pub struct HttpTransport {
    matcher: TransportMatcher,
    clients: Vec<reqwest::Client>,
    fallback: reqwest::Client,
}

impl HttpTransport {
    /// Compile `rules` and build one client per rule
    pub fn new(rules: impl IntoIterator<Item = TransportRule>) -> Result<Self> {
        Self::from_matcher(TransportMatcher::new(rules)?)
    }

    /// Build clients for an already compiled matcher
    pub fn from_matcher(matcher: TransportMatcher) -> Result<Self> {
        let clients = matcher
            .rules()
            .iter()
            .map(|rule| build_client(rule.name(), rule.tuning()))
            .collect::<Result<Vec<_>>>()?;
        let fallback = build_client(FALLBACK_TRANSPORT, &TuningProfile::default())?;
        Ok(Self {
            matcher,
            clients,
            fallback,
        })
    }

    /// Rule matcher in use
    pub fn matcher(&self) -> &TransportMatcher {
        &self.matcher
    }

    /// Client and rule name selected for a request
    pub fn client_for(&self, method: &Method, path: &str, query: &str) -> (&str, &reqwest::Client) {
        match self.matcher.position(method.as_str(), path, query) {
            Some(index) => (self.matcher.rules()[index].name(), &self.clients[index]),
            None => (FALLBACK_TRANSPORT, &self.fallback),
        }
    }
}

fn build_client(rule: &str, tuning: &TuningProfile) -> Result<reqwest::Client> {
    tuning
        .client_builder()
        .build()
        .map_err(|source| TransportConfigError::ClientBuild {
            rule: rule.to_string(),
            source,
        })
}

/// Client headers minus hop-by-hop ones; `Host` is kept for request signatures
fn forwarded_headers(headers: &HeaderMap) -> HeaderMap {
    let mut forwarded = headers.clone();
    for name in HOP_BY_HOP.iter() {
        forwarded.remove(name);
    }
    forwarded.remove("keep-alive");
    forwarded.remove("proxy-connection");
    forwarded
}

#[async_trait]
impl RoundTrip for HttpTransport {
    #[instrument(skip(self, request), fields(request_id = %request.request_id, method = %request.method))]
    async fn round_trip(
        &self,
        request: &ProxyRequest,
        target: Url,
    ) -> std::result::Result<reqwest::Response, TransportError> {
        let (rule, client) = self.client_for(
            &request.method,
            request.path(),
            request.query().unwrap_or(""),
        );
        debug!("sending to {} using transport {}", target, rule);

        let mut builder = client
            .request(request.method.clone(), target)
            .headers(forwarded_headers(&request.headers));
        if !request.body.is_empty() || request.method == Method::PUT || request.method == Method::POST {
            builder = builder.body(request.body.clone());
        }
        Ok(builder.send().await?)
    }
}
