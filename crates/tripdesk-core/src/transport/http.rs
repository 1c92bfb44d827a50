//! HTTP transport for the hosted CRM backend.
//!
//! Every request disables intermediary caching (request headers plus a
//! cache-busting query parameter) so the sync layer's TTL is the only cache
//! that decides freshness.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, warn};

use super::{FetchError, Transport};
use crate::cache::ResourceKey;

/// Query parameter carrying the cache-busting timestamp.
const CACHE_BUST_PARAM: &str = "_ts";

/// HTTP transport. Clone is cheap - reqwest::Client uses Arc internally
/// for connection pooling.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    /// Create a transport for `base_url`, e.g. `https://api.example.com/rest/v1`.
    ///
    /// No request timeout is configured; reqwest's default applies.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self::with_client(client, base_url))
    }

    /// Create a transport sharing an existing connection pool.
    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn resource_url(&self, key: &ResourceKey) -> String {
        let path = key.as_str();
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    fn request_headers(token: Option<&str>) -> Result<header::HeaderMap, FetchError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::ACCEPT, header::HeaderValue::from_static("application/json"));
        headers.insert(
            header::CACHE_CONTROL,
            header::HeaderValue::from_static("no-cache, no-store"),
        );
        headers.insert(header::PRAGMA, header::HeaderValue::from_static("no-cache"));
        if let Some(token) = token {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token))?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, FetchError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::from_status(status, &body))
        }
    }

    /// Parse a response body, accepting only arrays and objects.
    fn parse_document(body: &str) -> Result<Value, FetchError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| FetchError::InvalidResponse(format!("Malformed JSON: {}", e)))?;
        match value {
            Value::Array(_) | Value::Object(_) => Ok(value),
            other => Err(FetchError::InvalidResponse(format!(
                "Expected array or object, got {}",
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, key: &ResourceKey, token: Option<&str>) -> Result<Value, FetchError> {
        let url = self.resource_url(key);
        if token.is_none() {
            debug!(key = %key, "Fetching without credentials");
        }

        let response = self
            .client
            .get(&url)
            .headers(Self::request_headers(token)?)
            .query(&[(CACHE_BUST_PARAM, Utc::now().timestamp_millis().to_string())])
            .send()
            .await?;

        let response = Self::check_response(response).await.inspect_err(|e| {
            warn!(key = %key, error = %e, "Backend rejected request");
        })?;

        let body = response.text().await?;
        Self::parse_document(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    fn transport(base: &str) -> HttpTransport {
        HttpTransport::with_client(Client::new(), base)
    }

    /// Accept one connection, answer it with `status` and `body`, and return
    /// the raw request head that was received.
    async fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
        let addr = listener.local_addr().expect("listener address");
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept connection");
            let mut head = Vec::new();
            let mut chunk = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut chunk).await.expect("read request");
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&chunk[..n]);
            }
            let response = format!(
                "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.expect("write response");
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&head).to_lowercase()
        });
        (format!("http://{}/api", addr), handle)
    }

    fn local_transport(base: &str) -> HttpTransport {
        let client = Client::builder().no_proxy().build().expect("Failed to build HTTP client");
        HttpTransport::with_client(client, base)
    }

    fn cache_bust_millis(request: &str) -> i64 {
        let line = request.lines().next().expect("request line");
        let query = line
            .split_whitespace()
            .nth(1)
            .and_then(|target| target.split_once('?'))
            .map(|(_, query)| query)
            .expect("query string");
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("_ts="))
            .and_then(|ts| ts.parse().ok())
            .expect("numeric _ts parameter")
    }

    #[tokio::test]
    async fn test_fetch_sends_fresh_authenticated_request() {
        let (base, server) = serve_once("200 OK", r#"[{"id": 1}]"#).await;
        let before = Utc::now().timestamp_millis();

        let value = local_transport(&base)
            .fetch(&ResourceKey::from("/queries"), Some("tok-1"))
            .await
            .expect("fetch succeeds");
        assert_eq!(value, json!([{"id": 1}]));

        let request = server.await.expect("server task");
        assert!(request.starts_with("get /api/queries?_ts="), "{}", request);
        let ts = cache_bust_millis(&request);
        assert!(ts >= before && ts <= Utc::now().timestamp_millis());
        assert!(request.contains("authorization: bearer tok-1"));
        assert!(request.contains("cache-control: no-cache, no-store"));
        assert!(request.contains("pragma: no-cache"));
    }

    #[tokio::test]
    async fn test_fetch_without_token_sends_no_authorization() {
        let (base, server) = serve_once("200 OK", r#"{"id": 2}"#).await;

        let value = local_transport(&base)
            .fetch(&ResourceKey::from("hotels"), None)
            .await
            .expect("fetch succeeds");
        assert_eq!(value["id"], 2);

        let request = server.await.expect("server task");
        assert!(request.starts_with("get /api/hotels?_ts="));
        assert!(!request.contains("authorization:"));
    }

    #[tokio::test]
    async fn test_fetch_maps_error_statuses() {
        let (base, server) = serve_once("401 Unauthorized", r#"{"message": "expired"}"#).await;
        let result = local_transport(&base).fetch(&ResourceKey::from("/queries"), Some("old")).await;
        assert!(matches!(result, Err(FetchError::Unauthorized)));
        server.await.expect("server task");

        let (base, server) = serve_once("503 Service Unavailable", "maintenance").await;
        let result = local_transport(&base).fetch(&ResourceKey::from("/queries"), Some("tok")).await;
        assert!(matches!(result, Err(FetchError::ServerError(body)) if body == "maintenance"));
        server.await.expect("server task");
    }

    #[tokio::test]
    async fn test_fetch_rejects_scalar_body() {
        let (base, server) = serve_once("200 OK", "42").await;
        let result = local_transport(&base).fetch(&ResourceKey::from("/queries"), Some("tok")).await;
        assert!(matches!(result, Err(FetchError::InvalidResponse(_))));
        server.await.expect("server task");
    }

    #[test]
    fn test_resource_url_joins_paths() {
        let t = transport("https://crm.example.com/api/");
        assert_eq!(t.base_url(), "https://crm.example.com/api");
        assert_eq!(t.resource_url(&ResourceKey::from("/queries")), "https://crm.example.com/api/queries");
        assert_eq!(t.resource_url(&ResourceKey::from("hotels")), "https://crm.example.com/api/hotels");
    }

    #[test]
    fn test_headers_with_token() {
        let headers = HttpTransport::request_headers(Some("abc123")).expect("valid headers");
        assert_eq!(headers[header::AUTHORIZATION], "Bearer abc123");
        assert!(headers[header::AUTHORIZATION].is_sensitive());
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-store");
        assert_eq!(headers[header::PRAGMA], "no-cache");
    }

    #[test]
    fn test_headers_without_token() {
        let headers = HttpTransport::request_headers(None).expect("valid headers");
        assert!(!headers.contains_key(header::AUTHORIZATION));
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache, no-store");
    }

    #[test]
    fn test_token_with_control_characters_is_rejected() {
        let result = HttpTransport::request_headers(Some("bad\ntoken"));
        assert!(matches!(result, Err(FetchError::InvalidHeader(_))));
    }

    #[test]
    fn test_parse_document_accepts_collections_and_records() {
        let list = HttpTransport::parse_document(r#"[{"id": 1}, {"id": 2}]"#).expect("array");
        assert_eq!(list.as_array().map(Vec::len), Some(2));

        let record = HttpTransport::parse_document(r#"{"id": 1, "status": "open"}"#).expect("object");
        assert_eq!(record["status"], "open");
    }

    #[test]
    fn test_parse_document_rejects_scalars_and_garbage() {
        assert!(matches!(
            HttpTransport::parse_document("42"),
            Err(FetchError::InvalidResponse(msg)) if msg.contains("number")
        ));
        assert!(matches!(
            HttpTransport::parse_document("null"),
            Err(FetchError::InvalidResponse(_))
        ));
        assert!(matches!(
            HttpTransport::parse_document("<html>"),
            Err(FetchError::InvalidResponse(msg)) if msg.starts_with("Malformed JSON")
        ));
    }
}
