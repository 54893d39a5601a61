//! `reqwest` implementation of [`Transport`].

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::{
    Certificate, Client, Response,
    header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderName, HeaderValue},
    redirect::Policy,
};
use std::sync::Mutex;

use super::{BodyStream, GITHUB_API_VERSION, HttpRequest, HttpResponse, Transport, USER_AGENT};

/// Maximum redirects followed by download requests.
const MAX_REDIRECTS: usize = 10;

/// Transport backed by `reqwest` with rustls.
///
/// Keeps one client for metadata requests (no redirects) and one for
/// downloads (limited redirects). Both are rebuilt when a request carries a
/// different CA certificate. The token travels as a per-request header, so
/// changing it does not rebuild anything.
#[derive(Debug, Default)]
pub struct ReqwestTransport {
    clients: Mutex<ClientCache>,
}

#[derive(Debug, Default)]
struct ClientCache {
    ca: Option<String>,
    metadata: Option<Client>,
    download: Option<Client>,
    built: usize,
}

impl ClientCache {
    /// Client for `request`, building it on first use or after a CA change.
    fn client_for(&mut self, request: &HttpRequest) -> Result<Client> {
        if self.ca != request.ca {
            if self.metadata.is_some() || self.download.is_some() {
                debug!("CA certificate changed, rebuilding HTTP clients");
            }
            self.metadata = None;
            self.download = None;
            self.ca = request.ca.clone();
        }

        let slot = if request.follow_redirects {
            &mut self.download
        } else {
            &mut self.metadata
        };

        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = ReqwestTransport::build_client(request)?;
        *slot = Some(client.clone());
        self.built += 1;
        debug!("Built HTTP client #{}", self.built);
        Ok(client)
    }
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn build_client(request: &HttpRequest) -> Result<Client> {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("x-github-api-version"),
            HeaderValue::from_static(GITHUB_API_VERSION),
        );

        let redirect = if request.follow_redirects {
            Policy::limited(MAX_REDIRECTS)
        } else {
            Policy::none()
        };

        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .redirect(redirect);

        if let Some(ca) = &request.ca {
            let certificate =
                Certificate::from_pem(ca.as_bytes()).context("Failed to parse CA certificate")?;
            builder = builder.add_root_certificate(certificate);
        }

        builder.build().context("Failed to build HTTP client")
    }

    fn request_headers(request: &HttpRequest) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(request.accept));

        if let Some(token) = &request.token {
            let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", token))
                .context("Token is not a valid header value")?;
            auth_value.set_sensitive(true);
            headers.insert(AUTHORIZATION, auth_value);
        }
        Ok(headers)
    }

    #[cfg(test)]
    fn clients_built(&self) -> usize {
        self.clients.lock().map(|cache| cache.built).unwrap_or_default()
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    #[tracing::instrument(skip(self, request), fields(url = %request.url))]
    async fn get(&self, request: &HttpRequest) -> Result<HttpResponse> {
        debug!("GET {} (accept: {})...", request.url, request.accept);

        let client = self
            .clients
            .lock()
            .map_err(|_| anyhow!("HTTP client cache is poisoned"))?
            .client_for(request)?;
        let headers = Self::request_headers(request)?;

        let response = client
            .get(&request.url)
            .headers(headers)
            .send()
            .await
            .context("Failed to send request to GitHub API")?;

        let status = response.status();
        let content_length = response.content_length();
        debug!("{} -> {} ({:?} bytes)", request.url, status, content_length);

        Ok(HttpResponse::new(
            status,
            content_length,
            Box::new(ReqwestBody::new(response)),
        ))
    }
}

/// Streams a `reqwest` response body one network chunk at a time.
struct ReqwestBody {
    response: Response,
    pending: Bytes,
}

impl ReqwestBody {
    fn new(response: Response) -> Self {
        Self {
            response,
            pending: Bytes::new(),
        }
    }
}

#[async_trait]
impl BodyStream for ReqwestBody {
    async fn available(&mut self) -> Result<usize> {
        while self.pending.is_empty() {
            match self
                .response
                .chunk()
                .await
                .context("Failed to read chunk from response stream")?
            {
                Some(chunk) => self.pending = chunk,
                None => return Ok(0),
            }
        }
        Ok(self.pending.len())
    }

    fn read(&mut self, buf: &mut [u8]) -> usize {
        let len = buf.len().min(self.pending.len());
        let chunk = self.pending.split_to(len);
        buf[..len].copy_from_slice(&chunk);
        len
    }
}
