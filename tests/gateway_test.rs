//! End-to-end tests for the Tessera gateway
//!
//! Regions are backed by wiremock servers and requests are driven through the
//! axum router.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tessera::{create_router, AppState, GatewayConfig};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOMAIN: &str = "s3.example.com";

/// Configuration with one region whose replicas are `servers`
fn config_for(servers: &[&MockServer], sync_log: Option<&Path>) -> GatewayConfig {
    let mut yaml = String::from("backends:\n");
    for (i, server) in servers.iter().enumerate() {
        yaml.push_str(&format!(
            "  - name: node-{i}\n    endpoint: \"{}\"\n",
            server.uri()
        ));
    }
    yaml.push_str(&format!(
        "regions:\n  - name: eu\n    domains: [\"{DOMAIN}\"]\n    backends: [{}]\n",
        (0..servers.len())
            .map(|i| format!("\"node-{i}\""))
            .collect::<Vec<_>>()
            .join(", ")
    ));
    if let Some(log) = sync_log {
        yaml.push_str(&format!(
            "sync_log:\n  methods: [\"PUT\", \"DELETE\"]\n  path: \"{}\"\n",
            log.display()
        ));
    }
    GatewayConfig::from_yaml(&yaml).unwrap()
}

fn app(config: GatewayConfig) -> axum::Router {
    create_router(Arc::new(AppState::new(config).unwrap()))
}

fn request(method: Method, host: &str, uri: &str, body: &'static str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, host)
        .body(Body::from(body))
        .unwrap()
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn listing_v2(keys: &[&str]) -> String {
    let contents: String = keys
        .iter()
        .map(|k| {
            format!(
                "<Contents><Key>{k}</Key><LastModified>2024-01-01T00:00:00.000Z</LastModified>\
                 <ETag>\"e\"</ETag><Size>3</Size><StorageClass>STANDARD</StorageClass></Contents>"
            )
        })
        .collect();
    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
         <ListBucketResult xmlns=\"http://s3.amazonaws.com/doc/2006-03-01/\">\
         <Name>photos</Name><Prefix></Prefix><KeyCount>{}</KeyCount><MaxKeys>1000</MaxKeys>\
         <IsTruncated>false</IsTruncated>{contents}</ListBucketResult>",
        keys.len()
    )
}

/// Wait for the background settlement of an answered request to reach the log
async fn wait_for_lines(path: &Path, count: usize) -> Vec<String> {
    for _ in 0..50 {
        let lines: Vec<String> = std::fs::read_to_string(path)
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect();
        if lines.len() >= count {
            return lines;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("sync log never reached {count} lines");
}

#[tokio::test]
async fn test_object_get_served_by_healthy_replica() {
    let broken = MockServer::start().await;
    let healthy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photos/cat.jpg"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&broken)
        .await;
    Mock::given(method("GET"))
        .and(path("/photos/cat.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_string("meow"))
        .expect(1)
        .mount(&healthy)
        .await;

    let response = app(config_for(&[&broken, &healthy], None))
        .oneshot(request(Method::GET, DOMAIN, "/photos/cat.jpg", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "meow");
}

#[tokio::test]
async fn test_virtual_hosted_request_keeps_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cat.jpg"))
        .respond_with(ResponseTemplate::new(200).set_body_string("vhost"))
        .expect(1)
        .mount(&server)
        .await;

    let response = app(config_for(&[&server], None))
        .oneshot(request(Method::GET, "photos.s3.example.com:8080", "/cat.jpg", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_text(response).await, "vhost");

    let received = server.received_requests().await.unwrap();
    assert_eq!(received[0].headers["host"], "photos.s3.example.com:8080");
}

#[tokio::test]
async fn test_listing_merged_across_replicas() {
    let a = MockServer::start().await;
    let b = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/photos"))
        .and(query_param("list-type", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_v2(&["a.jpg", "b.jpg"])))
        .mount(&a)
        .await;
    Mock::given(method("GET"))
        .and(path("/photos"))
        .and(query_param("list-type", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(listing_v2(&["b.jpg", "c.jpg"])))
        .mount(&b)
        .await;

    let response = app(config_for(&[&a, &b], None))
        .oneshot(request(Method::GET, DOMAIN, "/photos?list-type=2&max-keys=2", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "application/xml");
    let body = body_text(response).await;
    assert!(body.contains("<Key>a.jpg</Key>"));
    assert!(body.contains("<Key>b.jpg</Key>"));
    assert!(!body.contains("<Key>c.jpg</Key>"));
    assert!(body.contains("<IsTruncated>true</IsTruncated>"));
    assert!(body.contains("<NextContinuationToken>b.jpg</NextContinuationToken>"));
    assert!(body.contains("<KeyCount>2</KeyCount>"));
}

#[tokio::test]
async fn test_unknown_domain_contacts_no_backend() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let response = app(config_for(&[&server], None))
        .oneshot(request(Method::GET, "s3.other.org", "/photos/cat.jpg", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_text(response).await, tessera_gateway::NO_REGION_BODY);
}

#[tokio::test]
async fn test_partial_put_is_logged_for_repair() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("sync.log");
    let ok = MockServer::start().await;
    let failing = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/photos/new.jpg"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&ok)
        .await;
    Mock::given(method("PUT"))
        .and(path("/photos/new.jpg"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&failing)
        .await;

    let response = app(config_for(&[&ok, &failing], Some(&log)))
        .oneshot(request(Method::PUT, DOMAIN, "/photos/new.jpg", "data"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let lines = wait_for_lines(&log, 1).await;
    let record: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(record["method"], "PUT");
    assert_eq!(record["path"], "/photos/new.jpg");
    assert!(!record["request_id"].as_str().unwrap().is_empty());
    assert_eq!(
        record["failed_host"],
        failing.uri().trim_start_matches("http://")
    );
    assert_eq!(record["success_host"], ok.uri().trim_start_matches("http://"));
}

#[tokio::test]
async fn test_partial_delete_fails() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("sync.log");
    let ok = MockServer::start().await;
    let failing = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&ok)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&failing)
        .await;

    let response = app(config_for(&[&ok, &failing], Some(&log)))
        .oneshot(request(Method::DELETE, DOMAIN, "/photos/old.jpg", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.headers()["x-amz-error-code"], "InternalError");
    assert_eq!(wait_for_lines(&log, 1).await.len(), 1);
}

#[tokio::test]
async fn test_all_replicas_down() {
    // Nothing listens on port 1
    let yaml = format!(
        "backends:\n  - name: gone\n    endpoint: \"http://127.0.0.1:1\"\n\
         regions:\n  - name: eu\n    domains: [\"{DOMAIN}\"]\n    backends: [\"gone\"]\n"
    );
    let response = app(GatewayConfig::from_yaml(&yaml).unwrap())
        .oneshot(request(Method::GET, DOMAIN, "/photos/cat.jpg", ""))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_text(response).await;
    assert!(body.contains("<Code>ServiceUnavailable</Code>"));
}
