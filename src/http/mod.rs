//! HTTP transport used by the release client and the flash engine.
//!
//! [`Transport`] issues a single GET and hands back the status, the declared
//! content length and a [`BodyStream`] the caller drains in bounded pieces.
//! Dropping the [`HttpResponse`] releases the connection.

mod client;
mod status;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;

pub use client::ReqwestTransport;
pub use status::{StatusFailure, classify_status};

/// Accept header for release metadata requests.
pub const ACCEPT_JSON: &str = "application/vnd.github+json";

/// Accept header for asset binary downloads.
pub const ACCEPT_OCTET_STREAM: &str = "application/octet-stream";

/// Value of the `X-GitHub-Api-Version` header.
pub const GITHUB_API_VERSION: &str = "2022-11-28";

pub const USER_AGENT: &str = "ghota";

/// A GET request against the GitHub API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub url: String,
    pub accept: &'static str,
    pub token: Option<String>,
    /// PEM-encoded CA certificate to trust in addition to the built-in roots
    pub ca: Option<String>,
    pub follow_redirects: bool,
}

impl HttpRequest {
    /// Request for JSON metadata. Redirects are not followed.
    pub fn metadata(url: String, token: Option<&str>, ca: Option<&str>) -> Self {
        Self {
            url,
            accept: ACCEPT_JSON,
            token: token.map(str::to_string),
            ca: ca.map(str::to_string),
            follow_redirects: false,
        }
    }

    /// Request for an asset binary. Redirects to the storage host are followed.
    pub fn download(url: String, token: Option<&str>, ca: Option<&str>) -> Self {
        Self {
            url,
            accept: ACCEPT_OCTET_STREAM,
            token: token.map(str::to_string),
            ca: ca.map(str::to_string),
            follow_redirects: true,
        }
    }
}

/// A response body read in bounded pieces.
#[async_trait]
pub trait BodyStream: Send {
    /// Waits until bytes are ready and returns how many can be read without
    /// waiting again. Returns 0 once the body is exhausted.
    async fn available(&mut self) -> Result<usize>;

    /// Copies up to `buf.len()` ready bytes into `buf`.
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

pub struct HttpResponse {
    pub status: StatusCode,
    /// Declared `Content-Length`, if the server sent one
    pub content_length: Option<u64>,
    pub body: Box<dyn BodyStream>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, content_length: Option<u64>, body: Box<dyn BodyStream>) -> Self {
        Self {
            status,
            content_length,
            body,
        }
    }

    /// Reads the whole body as text.
    pub async fn text(mut self) -> Result<String> {
        let mut buffer = [0u8; 4096];
        let mut bytes = Vec::new();

        while self.body.available().await? > 0 {
            let read = self.body.read(&mut buffer);
            bytes.extend_from_slice(&buffer[..read]);
        }

        String::from_utf8(bytes).context("Response body is not valid UTF-8")
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Issues a GET request. Errors only on transport failure; any HTTP status
    /// is returned as a response.
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MemoryBody;

    #[test]
    fn test_metadata_request() {
        let request = HttpRequest::metadata("https://x".into(), Some("t"), None);
        assert_eq!(request.accept, ACCEPT_JSON);
        assert_eq!(request.token.as_deref(), Some("t"));
        assert_eq!(request.ca, None);
        assert!(!request.follow_redirects);
    }

    #[test]
    fn test_download_request() {
        let request = HttpRequest::download("https://x".into(), None, Some("pem"));
        assert_eq!(request.accept, ACCEPT_OCTET_STREAM);
        assert_eq!(request.token, None);
        assert_eq!(request.ca.as_deref(), Some("pem"));
        assert!(request.follow_redirects);
    }

    #[tokio::test]
    async fn test_response_text_reads_every_piece() {
        let body = MemoryBody::new(b"hello, world".to_vec()).with_chunk_size(5);
        let response = HttpResponse::new(StatusCode::OK, Some(12), Box::new(body));

        assert_eq!(response.text().await.unwrap(), "hello, world");
    }

    #[tokio::test]
    async fn test_response_text_rejects_invalid_utf8() {
        let body = MemoryBody::new(vec![0xff, 0xfe]);
        let response = HttpResponse::new(StatusCode::OK, Some(2), Box::new(body));

        assert!(response.text().await.is_err());
    }
}
