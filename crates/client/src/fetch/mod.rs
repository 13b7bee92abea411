//! Network access for the worker.
//!
//! ### Requests
//! - Resolve targets against the application origin and canonicalize them
//!   (lowercase host, no fragment, query preserved) so cache keys are stable.
//! - `Sec-Fetch-Dest` style destinations mark document navigations.
//!
//! ### Exclusions
//! - Auth and payment path prefixes, other origins and extension schemes
//!   bypass the worker.
//!
//! ### Responses
//! - Any HTTP status is a successful fetch; only transport failures are errors.
//! - Same-origin responses are typed `basic`, everything else `cors`.
//! - Body size is capped (5MB default).

pub mod exclusion;
pub mod request;
pub mod response;
pub mod url;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header;
use std::time::{Duration, Instant};

pub use exclusion::{Exclusion, ExclusionRules};
pub use request::{Destination, FetchRequest};
pub use response::{FetchResponse, OFFLINE_BODY, OFFLINE_CONTENT_TYPE, ResponseType};
pub use self::url::{UrlError, canonicalize, resolve};

use ::url::{Origin, Url};
use tether_core::{AppConfig, Error};

/// Network capability used by the worker.
///
/// Any response the server sends back is `Ok`, whatever its status; `Err`
/// means the request never produced a response.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error>;
}

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Application origin, used to type responses (default: http://localhost:3000)
    pub origin: Url,

    /// User agent string (default: "tether/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            origin: Url::parse("http://localhost:3000").expect("static origin is valid"),
            user_agent: "tether/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl FetchConfig {
    pub fn from_app_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            origin,
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        })
    }
}

/// HTTP fetch client backed by reqwest.
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
    origin: Origin,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        let origin = config.origin.origin();

        Ok(Self { http, config, origin })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn classify(&self, final_url: &Url) -> ResponseType {
        if final_url.origin() == self.origin { ResponseType::Basic } else { ResponseType::Cors }
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, Error> {
        self::url::require_network_scheme(&request.url).map_err(|e| Error::Network(e.to_string()))?;
        let start = Instant::now();

        let response = self
            .http
            .request(request.method.clone(), request.url.as_str())
            .headers(request.headers.clone())
            .send()
            .await
            .map_err(|e| Error::Network(format!("{} {}: {}", request.method, request.url, e)))?;

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::Network(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status();
        let final_url = response.url().clone();
        let headers = response.headers().clone();

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response: {}", e)))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::Network(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        let response_type = self.classify(&final_url);

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            status = status.as_u16(),
            response_type = response_type.as_str(),
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(FetchResponse {
            url: Some(final_url),
            status,
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers: strip_transfer_headers(headers),
            body,
            response_type,
        })
    }
}

/// Drop headers that describe the wire encoding of a body we have already
/// decoded, so stored snapshots replay correctly.
fn strip_transfer_headers(mut headers: header::HeaderMap) -> header::HeaderMap {
    headers.remove(header::CONTENT_ENCODING);
    headers.remove(header::CONTENT_LENGTH);
    headers.remove(header::TRANSFER_ENCODING);
    headers
}
