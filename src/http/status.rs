//! Classification of unsuccessful HTTP statuses for diagnostics.

use reqwest::StatusCode;

/// Why a GitHub API request did not return `200 OK`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFailure {
    /// HTTP 401
    AuthenticationFailed,
    /// HTTP 429, or 403 with a rate limit message
    RateLimitExceeded,
    /// HTTP 404 (unknown repository, tag or asset)
    NotFound,
    /// HTTP 403 without a rate limit message
    Forbidden,
    /// Other 4xx statuses
    ClientError(StatusCode),
    /// 5xx statuses
    ServerError(StatusCode),
    /// Anything else that is not `200 OK`
    Unexpected(StatusCode),
}

impl std::fmt::Display for StatusFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusFailure::AuthenticationFailed => {
                write!(f, "Authentication failed. Check your GITHUB_TOKEN.")
            }
            StatusFailure::RateLimitExceeded => write!(
                f,
                "GitHub API rate limit exceeded. Try again later or set GITHUB_TOKEN environment variable."
            ),
            StatusFailure::NotFound => write!(f, "The requested resource was not found"),
            StatusFailure::Forbidden => {
                write!(f, "Access forbidden. You may need authentication.")
            }
            StatusFailure::ClientError(status) => {
                write!(f, "Request error: HTTP {}", status.as_u16())
            }
            StatusFailure::ServerError(status) => {
                write!(f, "GitHub server error: HTTP {}", status.as_u16())
            }
            StatusFailure::Unexpected(status) => {
                write!(f, "Unexpected response: HTTP {}", status.as_u16())
            }
        }
    }
}

impl std::error::Error for StatusFailure {}

/// Classifies a response status. Returns `None` for `200 OK`.
///
/// `body` is consulted to tell a rate limited 403 from a plain one.
pub fn classify_status(status: StatusCode, body: Option<&str>) -> Option<StatusFailure> {
    let failure = match status {
        StatusCode::OK => return None,
        StatusCode::UNAUTHORIZED => StatusFailure::AuthenticationFailed,
        StatusCode::TOO_MANY_REQUESTS => StatusFailure::RateLimitExceeded,
        StatusCode::FORBIDDEN => {
            if body.is_some_and(|b| b.contains("rate limit")) {
                StatusFailure::RateLimitExceeded
            } else {
                StatusFailure::Forbidden
            }
        }
        StatusCode::NOT_FOUND => StatusFailure::NotFound,
        s if s.is_client_error() => StatusFailure::ClientError(s),
        s if s.is_server_error() => StatusFailure::ServerError(s),
        s => StatusFailure::Unexpected(s),
    };
    Some(failure)
}
