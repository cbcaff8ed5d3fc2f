//! Access log for development and test environments

use std::time::Instant;

use axum::{
    body::Body,
    extract::MatchedPath,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, info, warn};

const REDACTED: &str = "[REDACTED]";

/// One line per request: `METHOD uri status - N ms`.
/// Header detail goes out at debug level with credentials masked.
pub async fn logging_middleware(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let uri = request.uri().clone();
    let path = request
        .extensions()
        .get::<MatchedPath>()
        .map(|matched| matched.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let request_id = request_id(request.headers());

    debug!(request_id = %request_id, headers = %loggable_headers(request.headers()), "{} {}", method, uri);

    let response = next.run(request).await;
    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis();

    if status.is_server_error() {
        warn!(request_id = %request_id, path = %path, "{} {} {} - {} ms", method, uri, status.as_u16(), elapsed_ms);
    } else {
        info!(request_id = %request_id, path = %path, "{} {} {} - {} ms", method, uri, status.as_u16(), elapsed_ms);
    }

    response
}

fn request_id(headers: &HeaderMap) -> String {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string()
}

fn loggable_headers(headers: &HeaderMap) -> String {
    let mut pairs: Vec<String> = headers
        .iter()
        .filter(|(name, _)| is_loggable(name.as_str()))
        .map(|(name, value)| {
            let shown = if is_credential(name.as_str()) {
                REDACTED
            } else {
                value.to_str().unwrap_or("<binary>")
            };
            format!("{}={}", name, shown)
        })
        .collect();

    pairs.sort();
    pairs.join(" ")
}

fn is_credential(name: &str) -> bool {
    matches!(name, "authorization" | "cookie" | "proxy-authorization")
}

fn is_loggable(name: &str) -> bool {
    is_credential(name)
        || matches!(
            name,
            "content-type" | "content-length" | "user-agent" | "x-forwarded-for"
        )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credentials_are_masked() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer abc.def".parse().unwrap());
        headers.insert("content-type", "application/json".parse().unwrap());
        headers.insert("etag", "xyz".parse().unwrap());

        let logged = loggable_headers(&headers);

        assert_eq!(logged, "authorization=[REDACTED] content-type=application/json");
    }

    #[test]
    fn test_request_id_falls_back_to_dash() {
        let mut headers = HeaderMap::new();
        assert_eq!(request_id(&headers), "-");

        headers.insert("x-request-id", "req-1".parse().unwrap());
        assert_eq!(request_id(&headers), "req-1");
    }
}
