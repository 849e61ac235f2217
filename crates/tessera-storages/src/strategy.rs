//! Reconciliation strategy selection

use http::Method;
use tessera_core::ProxyRequest;

/// Bucket sub-resources whose answers cannot be merged across backends
pub const UNMERGABLE_QUERY_PARAMS: &[&str] = &[
    "acl",
    "uploads",
    "tags",
    "tagging",
    "requestPayment",
    "replication",
    "policy",
    "policyStatus",
    "notification",
    "metrics",
    "logging",
    "location",
    "lifecycle",
    "inventory",
    "encryption",
    "cors",
    "analytics",
    "accelerate",
    "website",
    "versioning",
    "object-lock",
    "publicAccessBlock",
    "ownershipControls",
    "intelligent-tiering",
];

/// How the outcomes of one fan-out are turned into a response
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Strategy {
    /// First successful outcome wins
    Object,
    /// Every outcome must succeed
    Delete,
    /// Outcomes are merged into one listing
    Listing,
}

impl Strategy {
    /// Pick the strategy for a request
    pub fn classify(request: &ProxyRequest) -> Self {
        if request.method == Method::DELETE {
            Self::Delete
        } else if request.method == Method::GET && is_bucket_path(&request.bucket_path()) {
            Self::Listing
        } else {
            Self::Object
        }
    }
}

/// Path naming a bucket and nothing else
pub fn is_bucket_path(path: &str) -> bool {
    let trimmed = path.trim_matches('/');
    !trimmed.is_empty() && !trimmed.contains('/')
}

/// Whether a listing request can be answered by merging backend listings
pub fn is_mergable(method: &Method, bucket_path: &str, query: Option<&str>) -> bool {
    let unsupported = url::form_urlencoded::parse(query.unwrap_or("").as_bytes())
        .any(|(name, _)| UNMERGABLE_QUERY_PARAMS.contains(&&*name));
    !unsupported && method == Method::GET && is_bucket_path(bucket_path)
}
