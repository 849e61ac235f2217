//! Buffered client request shared by every backend call of one fan-out

use bytes::Bytes;
use http::{header, HeaderMap, Method, Uri};
use std::borrow::Cow;

/// How the bucket name is carried by a request
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Addressing {
    /// Not yet resolved against the region table
    #[default]
    Unresolved,
    /// Bucket name is the first path segment
    PathStyle,
    /// Bucket name was taken from the host
    VirtualHosted { bucket: String },
}

/// A client request as received by the gateway
#[derive(Clone, Debug)]
pub struct ProxyRequest {
    /// HTTP method
    pub method: Method,
    /// Request target as sent by the client
    pub uri: Uri,
    /// Client headers, forwarded to backends unchanged
    pub headers: HeaderMap,
    /// Fully buffered request body
    pub body: Bytes,
    /// Gateway-assigned request id
    pub request_id: String,
    /// Addressing mode, set by the region resolver
    pub addressing: Addressing,
}

impl ProxyRequest {
    /// Create a request with a fresh request id
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            method,
            uri,
            headers,
            body: body.into(),
            request_id: uuid::Uuid::new_v4().to_string(),
            addressing: Addressing::Unresolved,
        }
    }

    /// Bodiless request, mostly useful in tests
    pub fn empty(method: Method, uri: &str) -> Self {
        let uri: Uri = uri.parse().unwrap_or_else(|_| Uri::from_static("/"));
        Self::new(method, uri, HeaderMap::new(), Bytes::new())
    }

    /// Replace the request id
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    /// Set a header, replacing existing values
    pub fn with_header(mut self, name: header::HeaderName, value: &str) -> Self {
        if let Ok(value) = header::HeaderValue::from_str(value) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Host the client addressed, from the `Host` header or the URI authority
    pub fn host(&self) -> Option<&str> {
        self.headers
            .get(header::HOST)
            .and_then(|v| v.to_str().ok())
            .or_else(|| self.uri.authority().map(|a| a.as_str()))
    }

    /// Request path
    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Raw query string
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    /// Path including the bucket segment, regardless of addressing style
    pub fn bucket_path(&self) -> Cow<'_, str> {
        match &self.addressing {
            Addressing::VirtualHosted { bucket } => {
                Cow::Owned(format!("/{}{}", bucket, self.path()))
            }
            _ => Cow::Borrowed(self.path()),
        }
    }

    /// True when the query string carries `name`, with or without a value
    pub fn has_query_param(&self, name: &str) -> bool {
        self.query_pairs().any(|(k, _)| k == name)
    }

    /// First value of a query parameter
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    fn query_pairs(&self) -> url::form_urlencoded::Parse<'_> {
        url::form_urlencoded::parse(self.query().unwrap_or("").as_bytes())
    }

    /// `User-Agent` header, empty when absent
    pub fn user_agent(&self) -> &str {
        self.headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    /// Access key of the requester, from the signature header or a presigned query
    pub fn access_key(&self) -> Option<String> {
        if let Some(auth) = self
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
        {
            return access_key_from_authorization(auth);
        }
        if let Some(credential) = self.query_param("X-Amz-Credential") {
            return credential
                .split('/')
                .next()
                .filter(|k| !k.is_empty())
                .map(str::to_string);
        }
        self.query_param("AWSAccessKeyId").filter(|k| !k.is_empty())
    }
}

/// Extract the access key from a V2 (`AWS key:sig`) or V4 authorization header
fn access_key_from_authorization(auth: &str) -> Option<String> {
    if let Some(rest) = auth.strip_prefix("AWS4-HMAC-SHA256") {
        let credential = rest
            .split(',')
            .map(str::trim)
            .find_map(|part| part.strip_prefix("Credential="))?;
        return credential
            .split('/')
            .next()
            .filter(|k| !k.is_empty())
            .map(str::to_string);
    }
    let rest = auth.strip_prefix("AWS ")?;
    let (key, _) = rest.split_once(':')?;
    Some(key.trim().to_string()).filter(|k| !k.is_empty())
}

/// Strip an optional `:port` suffix from a host, unwrapping IPv6 literals
pub fn strip_port(host: &str) -> &str {
    if let Some(inner) = host.strip_prefix('[') {
        return match inner.find(']') {
            Some(end) => &inner[..end],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port))
            if !name.contains(':') && !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) =>
        {
            name
        }
        _ => host,
    }
}
