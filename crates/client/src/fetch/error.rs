//! Network failure kinds seen by the arbitrator.

/// Why a network fetch produced no response.
///
/// A response with a non-2xx status is not a `FetchError`: the upstream
/// answered, and the caller gets that answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The fetch did not complete within its time bound.
    #[error("request timeout")]
    Timeout,

    /// Connection, TLS, or body-read failure.
    #[error("network error: {0}")]
    Network(String),

    /// The response body exceeded the configured size cap.
    #[error("response too large: {0}")]
    TooLarge(String),

    /// The HTTP client could not be built or the request was malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_builder() {
            FetchError::InvalidRequest(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}
