//! Turns an inbound HTTP request into a [`CapturedRequest`].
//!
//! # Flow
//! ```text
//! POST/PUT?
//!   ├─ multipart/form-data           → first value per text field
//!   ├─ application/x-www-form-urlencoded → first value per key
//!   └─ anything else                 → no parameters
//! no parameters && Content-Length > 0 → body written as blob, link recorded
//! ```
//!
//! Nothing in here fails the capture. Every sub-failure is logged and
//! leaves the record with fewer details.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::{Body, Bytes},
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::FormRejection,
        FromRequest, Multipart,
    },
    http::{header, HeaderMap, Method, Request},
    Form,
};
use chrono::Utc;

use crate::capture::blob::{extension_for, BlobStore};
use crate::capture::model::{new_id, CapturedRequest};
use crate::config::CaptureConfig;
use crate::observability::metrics;

const MULTIPART: &str = "multipart/form-data";
const URLENCODED: &str = "application/x-www-form-urlencoded";

#[derive(Debug, thiserror::Error)]
enum FormError {
    #[error(transparent)]
    Request(#[from] axum::http::Error),
    #[error(transparent)]
    MultipartRejection(#[from] MultipartRejection),
    #[error(transparent)]
    Multipart(#[from] MultipartError),
    #[error(transparent)]
    Form(#[from] FormRejection),
}

/// Builds records from raw requests.
pub struct RequestNormalizer {
    blobs: Arc<dyn BlobStore>,
    public_base_url: String,
    max_body_bytes: usize,
    trust_forwarded_headers: bool,
}

impl RequestNormalizer {
    pub fn new(config: &CaptureConfig, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            public_base_url: config.public_base_url.clone(),
            max_body_bytes: config.max_body_bytes,
            trust_forwarded_headers: config.trust_forwarded_headers,
        }
    }

    /// Capture `request`, received from `peer`.
    ///
    /// Writes at most one blob.
    pub async fn normalize(&self, request: Request<Body>, peer: SocketAddr) -> CapturedRequest {
        let (parts, body) = request.into_parts();
        let content_type = header_string(&parts.headers, header::CONTENT_TYPE);

        let mut record = CapturedRequest {
            id: new_id(),
            method: parts.method.to_string(),
            url: parts.uri.to_string(),
            timestamp: Utc::now(),
            remote_address: self.client_address(&parts.headers, peer),
            user_agent: header_string(&parts.headers, header::USER_AGENT),
            content_type,
            body_parameters: BTreeMap::new(),
            file_link: None,
        };

        if parts.method == Method::POST || parts.method == Method::PUT {
            let declared_length = declared_length(&parts.headers);
            self.inspect_body(&mut record, declared_length, body).await;
        }

        record
    }

    async fn inspect_body(&self, record: &mut CapturedRequest, declared_length: u64, body: Body) {
        let bytes = match axum::body::to_bytes(body, self.max_body_bytes).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "Failed to read request body");
                metrics::record_capture_failure("body");
                None
            }
        };

        if let Some(bytes) = &bytes {
            let content_type = record.content_type.as_str();
            let parsed = if content_type.starts_with(MULTIPART) {
                Some(parse_multipart(content_type, bytes.clone()).await)
            } else if content_type.starts_with(URLENCODED) {
                Some(parse_urlencoded(content_type, bytes.clone()).await)
            } else {
                None
            };

            match parsed {
                Some(Ok(params)) => record.body_parameters = params,
                Some(Err(e)) => {
                    tracing::warn!(id = %record.id, content_type, error = %e, "Failed to parse form body");
                    metrics::record_capture_failure("form");
                }
                None => {}
            }
        }

        // Fallback is keyed on the outcome only, not on why parameters are empty.
        if record.body_parameters.is_empty() && declared_length > 0 {
            if let Some(bytes) = bytes {
                record.file_link = self.store_blob(record, &bytes).await;
            }
        }
    }

    async fn store_blob(&self, record: &CapturedRequest, bytes: &[u8]) -> Option<String> {
        let extension = extension_for(&record.content_type).unwrap_or_else(|| {
            tracing::warn!(
                id = %record.id,
                content_type = %record.content_type,
                "No file extension known for content type"
            );
            String::new()
        });
        let name = format!("{}{}", new_id().simple(), extension);

        match self.blobs.write_blob(&name, bytes).await {
            Ok(()) => {
                metrics::record_blob_written();
                tracing::debug!(id = %record.id, blob = %name, size = bytes.len(), "Body stored as blob");
                Some(format!("{}/static/{}", self.public_base_url, name))
            }
            Err(e) => {
                tracing::warn!(id = %record.id, error = %e, "Failed to store body blob");
                metrics::record_capture_failure("blob");
                None
            }
        }
    }

    fn client_address(&self, headers: &HeaderMap, peer: SocketAddr) -> String {
        if self.trust_forwarded_headers {
            let forwarded = headers
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.split(',').next())
                .or_else(|| headers.get("x-real-ip").and_then(|v| v.to_str().ok()))
                .map(str::trim)
                .filter(|v| !v.is_empty());
            if let Some(addr) = forwarded {
                return addr.to_string();
            }
        }
        peer.ip().to_string()
    }
}

fn header_string(headers: &HeaderMap, name: header::HeaderName) -> String {
    headers
        .get(name)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}

fn declared_length(headers: &HeaderMap) -> u64 {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

fn form_request(content_type: &str, body: Bytes) -> Result<Request<Body>, FormError> {
    Ok(Request::builder()
        .method(Method::POST)
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(body))?)
}

async fn parse_multipart(
    content_type: &str,
    body: Bytes,
) -> Result<BTreeMap<String, String>, FormError> {
    let request = form_request(content_type, body)?;
    let mut multipart = Multipart::from_request(request, &()).await?;

    let mut params = BTreeMap::new();
    while let Some(field) = multipart.next_field().await? {
        if field.file_name().is_some() {
            continue;
        }
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };
        let value = field.text().await?;
        params.entry(name).or_insert(value);
    }
    Ok(params)
}

async fn parse_urlencoded(
    content_type: &str,
    body: Bytes,
) -> Result<BTreeMap<String, String>, FormError> {
    let request = form_request(content_type, body)?;
    let Form(pairs) = Form::<Vec<(String, String)>>::from_request(request, &()).await?;

    let mut params = BTreeMap::new();
    for (key, value) in pairs {
        params.entry(key).or_insert(value);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::blob::memory::MemoryBlobStore;

    const PEER: &str = "192.0.2.10:51000";

    fn normalizer(blobs: Arc<MemoryBlobStore>) -> RequestNormalizer {
        RequestNormalizer::new(&CaptureConfig::default(), blobs)
    }

    fn post(content_type: &str, body: impl Into<Vec<u8>>) -> Request<Body> {
        let body = body.into();
        Request::builder()
            .method(Method::POST)
            .uri("/submit?source=test")
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CONTENT_LENGTH, body.len())
            .header(header::USER_AGENT, "unit/1.0")
            .body(Body::from(body))
            .unwrap()
    }

    fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &str)]) -> String {
        let mut body = String::new();
        for (name, file_name, value) in parts {
            body.push_str(&format!("--{boundary}\r\n"));
            match file_name {
                Some(file) => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )),
                None => body.push_str(&format!(
                    "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
                )),
            }
            body.push_str(value);
            body.push_str("\r\n");
        }
        body.push_str(&format!("--{boundary}--\r\n"));
        body
    }

    #[tokio::test]
    async fn get_copies_request_line_and_headers() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let request = Request::builder()
            .method(Method::GET)
            .uri("/some/path?q=1")
            .header(header::USER_AGENT, "curl/8.4.0")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::empty())
            .unwrap();

        let record = normalizer(blobs.clone())
            .normalize(request, PEER.parse().unwrap())
            .await;

        assert_eq!(record.method, "GET");
        assert_eq!(record.url, "/some/path?q=1");
        assert_eq!(record.remote_address, "192.0.2.10");
        assert_eq!(record.user_agent, "curl/8.4.0");
        assert_eq!(record.content_type, "text/plain");
        assert!(record.body_parameters.is_empty());
        assert!(record.file_link.is_none());
        assert!(blobs.blobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn urlencoded_body_becomes_parameters() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let record = normalizer(blobs.clone())
            .normalize(post(URLENCODED, "a=1&b=2&a=3"), PEER.parse().unwrap())
            .await;

        let expected: BTreeMap<String, String> =
            [("a".to_string(), "1".to_string()), ("b".to_string(), "2".to_string())].into();
        assert_eq!(record.body_parameters, expected);
        assert!(record.file_link.is_none());
        assert!(blobs.blobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn multipart_text_fields_become_parameters() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let body = multipart_body(
            "XyZ",
            &[
                ("name", None, "Ada"),
                ("upload", Some("notes.bin"), "binary-ish"),
                ("name", None, "Grace"),
                ("lang", None, "rust"),
            ],
        );

        let record = normalizer(blobs.clone())
            .normalize(
                post("multipart/form-data; boundary=XyZ", body),
                PEER.parse().unwrap(),
            )
            .await;

        assert_eq!(record.body_parameters.len(), 2);
        assert_eq!(record.body_parameters["name"], "Ada");
        assert_eq!(record.body_parameters["lang"], "rust");
        assert!(record.file_link.is_none());
    }

    #[tokio::test]
    async fn multipart_without_text_fields_falls_back_to_blob() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let body = multipart_body("B1", &[("upload", Some("a.bin"), "payload")]);

        let record = normalizer(blobs.clone())
            .normalize(post("multipart/form-data; boundary=B1", body.clone()), PEER.parse().unwrap())
            .await;

        assert!(record.body_parameters.is_empty());
        let link = record.file_link.expect("blob link");
        let stored = blobs.blobs.lock().unwrap();
        assert_eq!(stored.len(), 1);
        let (name, bytes) = stored.iter().next().unwrap();
        assert!(link.ends_with(&format!("/static/{name}")));
        assert_eq!(bytes, body.as_bytes());
    }

    #[tokio::test]
    async fn broken_multipart_degrades_to_blob() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let record = normalizer(blobs.clone())
            .normalize(post(MULTIPART, "no boundary here"), PEER.parse().unwrap())
            .await;

        assert!(record.body_parameters.is_empty());
        assert!(record.file_link.is_some());
    }

    #[tokio::test]
    async fn binary_body_is_stored_with_extension() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let png = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0x00, 0xff];

        let record = normalizer(blobs.clone())
            .normalize(post("image/png", png.clone()), PEER.parse().unwrap())
            .await;

        assert!(record.body_parameters.is_empty());
        let link = record.file_link.expect("blob link");
        assert!(link.starts_with("http://localhost:8080/static/"));
        assert!(link.ends_with(".png"));

        let name = link.rsplit('/').next().unwrap();
        assert_eq!(name.len(), 32 + ".png".len());
        assert_eq!(blobs.blobs.lock().unwrap()[name], png);
    }

    #[tokio::test]
    async fn unknown_type_is_stored_without_extension() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let record = normalizer(blobs.clone())
            .normalize(post("application/x-made-up", "opaque"), PEER.parse().unwrap())
            .await;

        let link = record.file_link.expect("blob link");
        let name = link.rsplit('/').next().unwrap();
        assert!(!name.contains('.'));
    }

    #[tokio::test]
    async fn blob_write_failure_leaves_link_unset() {
        let blobs = Arc::new(MemoryBlobStore::failing());
        let record = normalizer(blobs)
            .normalize(post("image/png", vec![1, 2, 3]), PEER.parse().unwrap())
            .await;

        assert!(record.file_link.is_none());
        assert_eq!(record.method, "POST");
    }

    #[tokio::test]
    async fn empty_body_writes_nothing() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let record = normalizer(blobs.clone())
            .normalize(post("image/png", Vec::new()), PEER.parse().unwrap())
            .await;

        assert!(record.file_link.is_none());
        assert!(blobs.blobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_body_still_captured() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let config = CaptureConfig {
            max_body_bytes: 4,
            ..CaptureConfig::default()
        };
        let record = RequestNormalizer::new(&config, blobs.clone())
            .normalize(post(URLENCODED, "a=1&b=2"), PEER.parse().unwrap())
            .await;

        assert!(record.body_parameters.is_empty());
        assert!(record.file_link.is_none());
    }

    #[tokio::test]
    async fn put_body_is_inspected() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let mut request = post(URLENCODED, "k=v&k=w");
        *request.method_mut() = Method::PUT;

        let record = normalizer(blobs.clone())
            .normalize(request, PEER.parse().unwrap())
            .await;

        assert_eq!(record.method, "PUT");
        assert_eq!(record.body_parameters.get("k").map(String::as_str), Some("v"));
        assert_eq!(record.body_parameters.len(), 1);
        assert!(record.file_link.is_none());
        assert!(blobs.blobs.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn put_opaque_body_becomes_blob() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let mut request = post("image/png", vec![0x89, b'P', b'N', b'G']);
        *request.method_mut() = Method::PUT;

        let record = normalizer(blobs.clone())
            .normalize(request, PEER.parse().unwrap())
            .await;

        assert!(record.body_parameters.is_empty());
        let link = record.file_link.expect("blob link");
        assert!(link.ends_with(".png"));
        assert_eq!(blobs.blobs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn patch_body_is_not_inspected() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let mut request = post(URLENCODED, "a=1");
        *request.method_mut() = Method::PATCH;

        let record = normalizer(blobs.clone())
            .normalize(request, PEER.parse().unwrap())
            .await;

        assert_eq!(record.method, "PATCH");
        assert!(record.body_parameters.is_empty());
        assert!(record.file_link.is_none());
    }

    #[tokio::test]
    async fn forwarded_headers_only_when_trusted() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let request = || {
            Request::builder()
                .uri("/")
                .header("x-forwarded-for", "203.0.113.5, 10.0.0.1")
                .body(Body::empty())
                .unwrap()
        };

        let untrusted = normalizer(blobs.clone())
            .normalize(request(), PEER.parse().unwrap())
            .await;
        assert_eq!(untrusted.remote_address, "192.0.2.10");

        let config = CaptureConfig {
            trust_forwarded_headers: true,
            ..CaptureConfig::default()
        };
        let trusted = RequestNormalizer::new(&config, blobs)
            .normalize(request(), PEER.parse().unwrap())
            .await;
        assert_eq!(trusted.remote_address, "203.0.113.5");
    }

    #[tokio::test]
    async fn ids_differ_per_capture() {
        let blobs = Arc::new(MemoryBlobStore::default());
        let normalizer = normalizer(blobs);
        let a = normalizer
            .normalize(Request::new(Body::empty()), PEER.parse().unwrap())
            .await;
        let b = normalizer
            .normalize(Request::new(Body::empty()), PEER.parse().unwrap())
            .await;
        assert_ne!(a.id, b.id);
        assert!(b.timestamp >= a.timestamp);
    }
}
