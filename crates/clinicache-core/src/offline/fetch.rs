// Request/response values and the network seam used by the service worker.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, Url};
use tracing::debug;

use super::error::{OfflineError, Result};

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Why the client issued a request. Only `Navigate` gets the offline page on failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Navigate,
    SameOrigin,
    NoCors,
    Cors,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    /// Path relative to the origin (`/index.html`) or an absolute URL.
    pub url: String,
    pub mode: RequestMode,
}

impl Request {
    /// A sub-resource GET.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: "GET".to_string(),
            url: url.into(),
            mode: RequestMode::SameOrigin,
        }
    }

    /// A page navigation GET.
    pub fn navigate(url: impl Into<String>) -> Self {
        Self {
            mode: RequestMode::Navigate,
            ..Self::get(url)
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, status_text: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            status_text: status_text.into(),
            headers: Vec::new(),
            body: body.into(),
        }
    }

    /// A 200 response with a content type.
    pub fn ok(content_type: &str, body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, "OK", body).with_header("content-type", content_type)
    }

    /// The synthetic response returned when neither cache nor network can answer.
    pub fn service_unavailable() -> Self {
        Self::new(503, "Offline", "Error: no connection")
            .with_header("content-type", "text/plain; charset=utf-8")
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.to_string()));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Only plain 200s are written to the cache.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One network round trip.
///
/// `Err` means the network could not be reached at all; HTTP error statuses
/// are successful fetches carrying a non-200 `Response`.
pub trait Fetch: Send + Sync + 'static {
    fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send;
}

impl<T: Fetch> Fetch for Arc<T> {
    fn fetch(&self, request: &Request) -> impl Future<Output = Result<Response>> + Send {
        (**self).fetch(request)
    }
}

/// `Fetch` over HTTP, resolving relative paths against the app origin.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    origin: Url,
}

impl HttpFetcher {
    pub fn new(origin: &str) -> Result<Self> {
        let origin = Url::parse(origin).map_err(|e| OfflineError::InvalidUrl {
            url: origin.to_string(),
            reason: e.to_string(),
        })?;
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, origin })
    }

    fn resolve(&self, url: &str) -> Result<Url> {
        self.origin.join(url).map_err(|e| OfflineError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response> {
        let url = self.resolve(&request.url)?;
        let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            OfflineError::InvalidUrl {
                url: request.url.clone(),
                reason: e.to_string(),
            }
        })?;

        debug!(method = %method, url = %url, "Network fetch");
        let response = self.client.request(method, url).send().await?;

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(Response {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            headers,
            body,
        })
    }
}
