//! Requests as seen by the arbitrator, and the responses it hands back.

use bytes::Bytes;
use chrono::Utc;
use fairweather_core::{CachedResponse, compute_request_key};
use reqwest::Method;
use url::Url;

use crate::offline::OfflineResponse;

/// Error type for requests that cannot be arbitrated.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),
}

/// An outbound data request.
///
/// The URL is stored without its fragment; host case is normalized by
/// parsing, so equal requests map to equal cache keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    /// The caller's `Accept` header, if any.
    pub accept: Option<String>,
}

impl Request {
    pub fn new(method: Method, url: &str) -> Result<Self, RequestError> {
        let mut url = Url::parse(url.trim()).map_err(|e| RequestError::InvalidUrl(e.to_string()))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RequestError::UnsupportedScheme(url.scheme().to_string()));
        }
        url.set_fragment(None);
        Ok(Self { method, url, accept: None })
    }

    pub fn get(url: &str) -> Result<Self, RequestError> {
        Self::new(Method::GET, url)
    }

    pub fn with_accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    /// Only plain reads are arbitrated; everything else goes straight out.
    pub fn is_read(&self) -> bool {
        self.method == Method::GET
    }

    /// Tier key for this request.
    pub fn cache_key(&self) -> String {
        compute_request_key(self.method.as_str(), self.url.as_str())
    }
}

/// A response delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }

    /// Snapshot for a tier, stamped with the current time.
    pub fn to_cached(&self, url: &Url) -> CachedResponse {
        CachedResponse {
            url: url.to_string(),
            status: self.status,
            content_type: self.content_type.clone(),
            headers: self.headers.clone(),
            body: self.body.to_vec(),
            stored_at: Utc::now().to_rfc3339(),
        }
    }
}

impl From<CachedResponse> for Response {
    fn from(cached: CachedResponse) -> Self {
        Self {
            status: cached.status,
            content_type: cached.content_type,
            headers: cached.headers,
            body: Bytes::from(cached.body),
        }
    }
}

impl From<OfflineResponse> for Response {
    fn from(offline: OfflineResponse) -> Self {
        let mime = offline.content_type.mime().to_string();
        Self {
            status: offline.status,
            content_type: Some(mime.clone()),
            headers: vec![("content-type".to_string(), mime)],
            body: Bytes::from(offline.body),
        }
    }
}
