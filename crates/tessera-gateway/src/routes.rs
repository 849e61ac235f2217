//! HTTP routes
//!
//! Every method and path is proxied: the gateway has no routes of its own,
//! only a fallback handler that buffers the request and hands it to the
//! region resolver.

use crate::error::{ApiError, S3ErrorCode};
use crate::middleware::{self, RequestId};
use crate::state::AppState;
use axum::{
    body::{Body, Bytes},
    extract::{rejection::BytesRejection, DefaultBodyLimit, State},
    http::{header, HeaderMap, Method, StatusCode, Uri},
    middleware as axum_middleware,
    response::Response,
    Extension, Router,
};
use std::sync::Arc;
use tessera_core::ProxyRequest;
use tower_http::trace::TraceLayer;
use tracing::debug;

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(proxy_handler)
        .layer(axum_middleware::from_fn(middleware::logging_middleware))
        .layer(axum_middleware::from_fn(middleware::request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(state.config.body_limit()))
        .with_state(state)
}

async fn proxy_handler(
    State(state): State<Arc<AppState>>,
    Extension(request_id): Extension<RequestId>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            return body_error(rejection).into_response_with_id(Some(&request_id.0));
        }
    };

    let request = ProxyRequest::new(method, uri, headers, body).with_request_id(&request_id.0);
    match state.resolver.route(request).await {
        // The client is answered right away; late outcomes settle in the background
        Ok(picked) => client_response(picked.response),
        Err(err) => {
            let err = ApiError::from(err);
            debug!("request {} failed: {}", request_id.0, err);
            err.into_response_with_id(Some(&request_id.0))
        }
    }
}

fn body_error(rejection: BytesRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::s3(
            S3ErrorCode::EntityTooLarge,
            "Your proposed upload exceeds the maximum allowed size",
        )
    } else {
        ApiError::s3(
            S3ErrorCode::IncompleteBody,
            format!("Failed to read request body: {}", rejection.body_text()),
        )
    }
}

/// Stream a backend response to the client
fn client_response(backend: reqwest::Response) -> Response {
    let status = backend.status();
    let mut headers = backend.headers().clone();
    headers.remove(header::CONNECTION);
    headers.remove(header::TRANSFER_ENCODING);

    let mut response = Response::new(Body::from_stream(backend.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewayConfig;
    use crate::middleware::REQUEST_ID_HEADER;
    use crate::regions::{RegionResolver, NO_REGION_BODY};
    use axum::http::Request;
    use tessera_core::testing::{test_backend_with, StaticTransport};
    use tessera_core::Ring;
    use tessera_storages::{Cluster, SyncSender};
    use tower::ServiceExt;

    fn router_with(transports: Vec<StaticTransport>, max_body_size: u64) -> Router {
        let backends = transports
            .into_iter()
            .enumerate()
            .map(|(i, transport)| test_backend_with(&format!("node-{i}"), transport))
            .collect();
        let ring: Arc<dyn Ring> = Arc::new(Cluster::new(
            "eu",
            backends,
            Arc::new(SyncSender::disabled()),
        ));
        let mut resolver = RegionResolver::new();
        resolver.bind("eu", "s3.example.com", ring);

        let config = GatewayConfig {
            max_body_size,
            ..Default::default()
        };
        create_router(Arc::new(AppState::with_resolver(config, resolver)))
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

    #[tokio::test]
    async fn test_object_get_is_proxied() {
        let app = router_with(
            vec![StaticTransport::failing(), StaticTransport::ok("object data")],
            1024,
        );
        let response = app
            .oneshot(request(Method::GET, "s3.example.com", "/bucket/key", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        assert_eq!(body_text(response).await, "object data");
    }

    #[tokio::test]
    async fn test_unknown_domain() {
        let app = router_with(vec![StaticTransport::ok("unused")], 1024);
        let response = app
            .oneshot(request(Method::GET, "elsewhere.org", "/bucket/key", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, NO_REGION_BODY);
    }

    #[tokio::test]
    async fn test_all_backends_down() {
        let app = router_with(
            vec![StaticTransport::failing(), StaticTransport::failing()],
            1024,
        );
        let response = app
            .oneshot(request(Method::GET, "s3.example.com", "/bucket/key", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.headers()["x-amz-error-code"], "ServiceUnavailable");
        let request_id = response.headers()[REQUEST_ID_HEADER]
            .to_str()
            .unwrap()
            .to_string();
        let body = body_text(response).await;
        assert!(body.contains(&format!("<RequestId>{request_id}</RequestId>")));
    }

    #[tokio::test]
    async fn test_backend_status_is_mirrored() {
        let app = router_with(
            vec![
                StaticTransport::with_status(StatusCode::NOT_FOUND, ""),
                StaticTransport::with_status(StatusCode::NOT_FOUND, ""),
            ],
            1024,
        );
        let response = app
            .oneshot(request(Method::GET, "s3.example.com", "/bucket/missing", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.headers()["x-amz-error-code"], "NoSuchKey");
    }

    #[tokio::test]
    async fn test_unmergable_listing() {
        let app = router_with(vec![StaticTransport::ok("<ListBucketResult/>")], 1024);
        let response = app
            .oneshot(request(Method::GET, "s3.example.com", "/bucket?uploads", ""))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_body_over_limit() {
        let app = router_with(vec![StaticTransport::ok("")], 4);
        let response = app
            .oneshot(request(Method::PUT, "s3.example.com", "/bucket/key", "too large"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(response.headers()["x-amz-error-code"], "EntityTooLarge");
    }
}
