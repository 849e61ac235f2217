//! Region resolver
//!
//! Maps the host a client addressed to the ring of the region serving it.
//! A host is either one of a region's domains (path-style addressing) or a
//! bucket name followed by one of them (virtual-hosted addressing).

use http::StatusCode;
use std::collections::HashMap;
use std::sync::Arc;
use tessera_core::{
    strip_port, synthesized_response, Addressing, Picked, ProxyRequest, Result, Ring,
};
use tracing::{debug, warn};

/// Body of the response sent for hosts no region serves
pub const NO_REGION_BODY: &str = "No region found for this domain";

#[derive(Clone)]
struct RegionBinding {
    region: String,
    ring: Arc<dyn Ring>,
}

/// Domain table built once at startup and read-only thereafter
#[derive(Clone, Default)]
pub struct RegionResolver {
    domains: HashMap<String, RegionBinding>,
}

impl RegionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `domain` from `ring`; a later binding of the same domain wins
    pub fn bind(&mut self, region: &str, domain: &str, ring: Arc<dyn Ring>) {
        let domain = domain.to_ascii_lowercase();
        let binding = RegionBinding {
            region: region.to_string(),
            ring,
        };
        if let Some(previous) = self.domains.insert(domain.clone(), binding) {
            warn!(
                "domain {} declared by regions {} and {}, using {}",
                domain, previous.region, region, region
            );
        }
    }

    /// Number of bound domains
    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// Region serving `host` and how the request addresses its bucket
    ///
    /// `host` may carry a port and may be an IPv6 literal.
    pub fn resolve(&self, host: &str) -> Option<(&str, Arc<dyn Ring>, Addressing)> {
        let host = strip_port(host).to_ascii_lowercase();

        if let Some(binding) = self.domains.get(&host) {
            return Some((
                binding.region.as_str(),
                Arc::clone(&binding.ring),
                Addressing::PathStyle,
            ));
        }

        // Peel labels off the right until the suffix is a known domain
        let mut remaining = host.as_str();
        let mut domain = String::new();
        while let Some(dot) = remaining.rfind('.') {
            domain.insert_str(0, &remaining[dot + 1..]);
            remaining = &remaining[..dot];
            if let Some(binding) = self.domains.get(&domain) {
                if remaining.is_empty() {
                    return None;
                }
                return Some((
                    binding.region.as_str(),
                    Arc::clone(&binding.ring),
                    Addressing::VirtualHosted {
                        bucket: remaining.to_string(),
                    },
                ));
            }
            domain.insert(0, '.');
        }

        None
    }

    /// Hand `request` to the ring of its region
    ///
    /// Hosts no region serves get a 404 without any backend being contacted.
    pub async fn route(&self, mut request: ProxyRequest) -> Result<Picked> {
        let host = request.host().unwrap_or("").to_string();
        match self.resolve(&host) {
            Some((region, ring, addressing)) => {
                debug!(
                    "request {} for {} routed to region {} ({:?})",
                    request.request_id, host, region, addressing
                );
                request.addressing = addressing;
                ring.do_request(request).await
            }
            None => {
                debug!("no region for host {:?}", host);
                Ok(Picked::new(synthesized_response(
                    StatusCode::NOT_FOUND,
                    NO_REGION_BODY,
                )))
            }
        }
    }
}

impl std::fmt::Debug for RegionResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut domains: Vec<_> = self
            .domains
            .iter()
            .map(|(domain, binding)| (domain.as_str(), binding.region.as_str()))
            .collect();
        domains.sort();
        f.debug_struct("RegionResolver")
            .field("domains", &domains)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use http::{header, Method};
    use parking_lot::Mutex;
    use rstest::rstest;

    /// Ring that answers with its own name and remembers what it was given
    struct RecordingRing {
        name: String,
        seen: Mutex<Vec<Addressing>>,
    }

    impl RecordingRing {
        fn named(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Ring for RecordingRing {
        async fn do_request(&self, request: ProxyRequest) -> Result<Picked> {
            self.seen.lock().push(request.addressing.clone());
            Ok(Picked::new(synthesized_response(
                StatusCode::OK,
                self.name.clone(),
            )))
        }
    }

    fn resolver() -> RegionResolver {
        let mut resolver = RegionResolver::new();
        resolver.bind("eu", "example.com", RecordingRing::named("eu"));
        resolver.bind("us", "s3.us.example.net", RecordingRing::named("us"));
        resolver
    }

    fn request_for(host: &str) -> ProxyRequest {
        ProxyRequest::empty(Method::GET, "/key").with_header(header::HOST, host)
    }

    #[rstest]
    #[case("example.com")]
    #[case("example.com:8080")]
    #[case("EXAMPLE.com")]
    fn test_exact_domain_is_path_style(#[case] host: &str) {
        let resolver = resolver();
        let (region, _, addressing) = resolver.resolve(host).unwrap();
        assert_eq!(region, "eu");
        assert_eq!(addressing, Addressing::PathStyle);
    }

    #[rstest]
    #[case("mybucket.example.com", "eu", "mybucket")]
    #[case("my.dotted.bucket.example.com:443", "eu", "my.dotted.bucket")]
    #[case("logs.s3.us.example.net", "us", "logs")]
    fn test_virtual_hosted_bucket(
        #[case] host: &str,
        #[case] expected_region: &str,
        #[case] bucket: &str,
    ) {
        let resolver = resolver();
        let (region, _, addressing) = resolver.resolve(host).unwrap();
        assert_eq!(region, expected_region);
        assert_eq!(
            addressing,
            Addressing::VirtualHosted {
                bucket: bucket.to_string()
            }
        );
    }

    #[rstest]
    #[case("other.org")]
    #[case("com")]
    #[case(".example.com")]
    #[case("example.com.evil.org")]
    #[case("[::1]:8080")]
    #[case("")]
    fn test_unknown_host(#[case] host: &str) {
        assert!(resolver().resolve(host).is_none());
    }

    #[test]
    fn test_ipv6_literal_domain() {
        let mut resolver = RegionResolver::new();
        resolver.bind("local", "::1", RecordingRing::named("local"));
        let (region, _, addressing) = resolver.resolve("[::1]:9000").unwrap();
        assert_eq!(region, "local");
        assert_eq!(addressing, Addressing::PathStyle);
    }

    #[test]
    fn test_last_binding_wins() {
        let mut resolver = RegionResolver::new();
        resolver.bind("first", "example.com", RecordingRing::named("first"));
        resolver.bind("second", "example.com", RecordingRing::named("second"));
        assert_eq!(resolver.len(), 1);
        assert_eq!(resolver.resolve("example.com").unwrap().0, "second");
    }

    #[tokio::test]
    async fn test_route_sets_addressing() {
        let ring = RecordingRing::named("eu");
        let mut resolver = RegionResolver::new();
        resolver.bind("eu", "example.com", Arc::clone(&ring) as Arc<dyn Ring>);

        let picked = resolver
            .route(request_for("photos.example.com"))
            .await
            .unwrap();
        assert_eq!(picked.response.text().await.unwrap(), "eu");
        assert_eq!(
            ring.seen.lock().as_slice(),
            &[Addressing::VirtualHosted {
                bucket: "photos".to_string()
            }]
        );
    }

    #[tokio::test]
    async fn test_route_falls_back_to_uri_authority() {
        let picked = resolver()
            .route(ProxyRequest::empty(Method::GET, "http://example.com/bucket"))
            .await
            .unwrap();
        assert_eq!(picked.response.text().await.unwrap(), "eu");
    }

    #[tokio::test]
    async fn test_unmatched_host_is_404() {
        let ring = RecordingRing::named("eu");
        let mut resolver = RegionResolver::new();
        resolver.bind("eu", "example.com", Arc::clone(&ring) as Arc<dyn Ring>);

        let picked = resolver.route(request_for("unknown.org")).await.unwrap();
        assert!(picked.settled.is_none());
        assert_eq!(picked.response.status(), StatusCode::NOT_FOUND);
        assert_eq!(picked.response.text().await.unwrap(), NO_REGION_BODY);
        assert!(ring.seen.lock().is_empty());
    }
}
