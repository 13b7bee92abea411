//! Responses delivered to the requester and their cache snapshots.

use bytes::Bytes;
use reqwest::StatusCode;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tether_core::{CachedEntry, Error};
use url::Url;

/// Body of the placeholder page returned for offline navigations.
pub const OFFLINE_BODY: &str = "Application offline - Please check your internet connection";

/// Content type of the placeholder page.
pub const OFFLINE_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// How a response relates to the application origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response fetched directly.
    Basic,
    /// Response from another origin.
    Cors,
    /// Cross-origin response whose contents are hidden.
    Opaque,
    /// Constructed locally rather than fetched.
    Default,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Basic => "basic",
            ResponseType::Cors => "cors",
            ResponseType::Opaque => "opaque",
            ResponseType::Default => "default",
        }
    }
}

/// Response from a fetch, a cache hit, or the offline fallback.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    /// Final URL after redirects (None for synthesized responses)
    pub url: Option<Url>,
    /// HTTP status code
    pub status: StatusCode,
    /// Reason phrase
    pub status_text: String,
    /// Response headers
    pub headers: HeaderMap,
    /// Response body bytes
    pub body: Bytes,
    pub response_type: ResponseType,
}

impl FetchResponse {
    /// The placeholder served for a navigation when neither network nor
    /// cache can answer.
    pub fn offline() -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(OFFLINE_CONTENT_TYPE));
        Self {
            url: None,
            status: StatusCode::SERVICE_UNAVAILABLE,
            status_text: "Service Unavailable".to_string(),
            headers,
            body: Bytes::from_static(OFFLINE_BODY.as_bytes()),
            response_type: ResponseType::Default,
        }
    }

    /// Whether this response may be written to the cache: a 200 from the
    /// application's own origin.
    pub fn is_cacheable(&self) -> bool {
        self.status == StatusCode::OK && self.response_type == ResponseType::Basic
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok())
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }

    /// Snapshot this response for storage under `key`.
    ///
    /// The snapshot owns its own copy of the body; the response handed back
    /// to the requester is left untouched.
    pub fn to_cached_entry(&self, key: &str, method: &str, request_url: &Url) -> CachedEntry {
        let headers = self
            .headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).to_string()))
            .collect();

        CachedEntry {
            key: key.to_string(),
            url: request_url.to_string(),
            method: method.to_string(),
            status: self.status.as_u16(),
            status_text: self.status_text.clone(),
            headers,
            body: self.body.to_vec(),
            stored_at: chrono::Utc::now().timestamp_micros(),
        }
    }

    /// Rebuild a response from a stored snapshot.
    pub fn from_cached_entry(entry: CachedEntry) -> Result<Self, Error> {
        let status = StatusCode::from_u16(entry.status)
            .map_err(|e| Error::CorruptEntry(format!("status {}: {e}", entry.status)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in &entry.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::CorruptEntry(format!("header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::CorruptEntry(format!("header value for {name}: {e}")))?;
            headers.append(name, value);
        }

        let url = Url::parse(&entry.url).ok();

        Ok(Self {
            url,
            status,
            status_text: entry.status_text,
            headers,
            body: Bytes::from(entry.body),
            response_type: ResponseType::Basic,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_response() -> FetchResponse {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("text/css"));
        headers.insert(header::ETAG, HeaderValue::from_static("\"v1\""));
        FetchResponse {
            url: Some(Url::parse("https://app.example.com/app.css").unwrap()),
            status: StatusCode::OK,
            status_text: "OK".to_string(),
            headers,
            body: Bytes::from_static(b"body { margin: 0 }"),
            response_type: ResponseType::Basic,
        }
    }

    #[test]
    fn test_offline_shape() {
        let response = FetchResponse::offline();
        assert_eq!(response.status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(response.status_text, "Service Unavailable");
        assert_eq!(response.content_type(), Some("text/html; charset=utf-8"));
        assert_eq!(response.body_text(), "Application offline - Please check your internet connection");
        assert_eq!(response.response_type, ResponseType::Default);
        assert!(!response.is_cacheable());
    }

    #[test]
    fn test_cacheable_requires_ok_and_basic() {
        let response = ok_response();
        assert!(response.is_cacheable());

        let not_found = FetchResponse { status: StatusCode::NOT_FOUND, ..ok_response() };
        assert!(!not_found.is_cacheable());

        let partial = FetchResponse { status: StatusCode::PARTIAL_CONTENT, ..ok_response() };
        assert!(!partial.is_cacheable());

        let cors = FetchResponse { response_type: ResponseType::Cors, ..ok_response() };
        assert!(!cors.is_cacheable());
    }

    #[test]
    fn test_snapshot_preserves_status_headers_body() {
        let response = ok_response();
        let url = Url::parse("https://app.example.com/app.css").unwrap();
        let entry = response.to_cached_entry("k1", "GET", &url);

        assert_eq!(entry.status, 200);
        assert_eq!(entry.header("etag"), Some("\"v1\""));
        assert_eq!(entry.body, b"body { margin: 0 }");

        let restored = FetchResponse::from_cached_entry(entry).unwrap();
        assert_eq!(restored.status, response.status);
        assert_eq!(restored.headers, response.headers);
        assert_eq!(restored.body, response.body);
        // original response is still usable after snapshotting
        assert_eq!(response.body_text(), "body { margin: 0 }");
    }

    #[test]
    fn test_from_cached_entry_rejects_bad_status() {
        let url = Url::parse("https://app.example.com/").unwrap();
        let mut entry = ok_response().to_cached_entry("k1", "GET", &url);
        entry.status = 42;
        assert!(matches!(FetchResponse::from_cached_entry(entry), Err(Error::CorruptEntry(_))));
    }
}
