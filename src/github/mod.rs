//! GitHub release client and OTA engine.
//!
//! [`GithubOta`] holds the per-repository configuration (release URL, token,
//! CA certificate, progress callback) and serves the read-only release
//! queries. The flash entry points live in `flash`.

mod flash;
mod repo;

use anyhow::{Context, Result, anyhow};
use log::{debug, error, info};
use reqwest::{StatusCode, Url};

use crate::flash::ProgressCallback;
use crate::http::{
    HttpRequest, ReqwestTransport, StatusFailure, Transport, classify_status,
};
use crate::metadata::{Asset, Release, build_release, dispose_release, tags_from_list};

pub use repo::{GitHubRepo, RepoSpec};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Releases requested per page when listing tags.
const PER_PAGE: usize = 100;

/// Limit to 10 pages (1000 releases) to prevent an endless listing.
const MAX_PAGES: usize = 10;

pub struct GithubOta<T: Transport = ReqwestTransport> {
    transport: T,
    repo: GitHubRepo,
    release_url: String,
    token: Option<String>,
    ca: Option<String>,
    progress: Option<ProgressCallback>,
}

impl GithubOta<ReqwestTransport> {
    /// Creates an engine for `owner/repo` on api.github.com.
    pub fn new(owner: &str, repo: &str, token: Option<&str>) -> Self {
        Self::with_transport(ReqwestTransport::new(), owner, repo, token)
    }
}

impl<T: Transport> GithubOta<T> {
    pub fn with_transport(transport: T, owner: &str, repo: &str, token: Option<&str>) -> Self {
        let repo = GitHubRepo::new(owner, repo);
        let release_url = releases_url(DEFAULT_API_URL, &repo);
        Self {
            transport,
            repo,
            release_url,
            token: token.map(str::to_string),
            ca: None,
            progress: None,
        }
    }

    /// Points the engine at another API root (GitHub Enterprise, test servers).
    pub fn with_api_url(mut self, api_url: &str) -> Self {
        self.release_url = releases_url(api_url, &self.repo);
        self
    }

    pub fn repo(&self) -> &GitHubRepo {
        &self.repo
    }

    /// Base URL of the repository's releases collection.
    pub fn release_url(&self) -> &str {
        &self.release_url
    }

    /// Trusts `ca` (PEM) for every following request, replacing any previous
    /// certificate.
    pub fn set_ca(&mut self, ca: &str) {
        if self.ca.is_some() {
            debug!("Replacing CA certificate");
        }
        self.ca = Some(ca.to_string());
    }

    /// Installs the handler that receives download progress percentages.
    pub fn set_progress_callback(&mut self, callback: impl FnMut(u8) + Send + 'static) {
        self.progress = Some(Box::new(callback));
    }

    /// Tags of every release, newest first as GitHub orders them.
    ///
    /// Returns an empty list if any page fails.
    #[tracing::instrument(skip(self), fields(repo = %self.repo))]
    pub async fn list_tags(&self) -> Vec<String> {
        let mut tags = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = match self.endpoint(&[]) {
                Ok(mut url) => {
                    url.query_pairs_mut()
                        .append_pair("per_page", &PER_PAGE.to_string())
                        .append_pair("page", &page.to_string());
                    url
                }
                Err(e) => {
                    error!("Failed to build release list URL: {:#}", e);
                    return Vec::new();
                }
            };

            debug!("Fetching releases page {} from {}...", page, self.release_url);

            let Some(body) = self.fetch(url).await else {
                return Vec::new();
            };
            let Some(page_tags) = tags_from_list(&body) else {
                return Vec::new();
            };

            let len = page_tags.len();
            tags.extend(page_tags);

            if len < PER_PAGE {
                break;
            }
        }

        tags
    }

    /// The latest published release, or an empty release if there is none.
    #[tracing::instrument(skip(self), fields(repo = %self.repo))]
    pub async fn latest_release(&self) -> Release {
        self.release_at(&["latest"]).await
    }

    /// The release tagged `tag`, or an empty release if it does not exist.
    ///
    /// `None` returns an empty release without any request.
    #[tracing::instrument(skip(self), fields(repo = %self.repo))]
    pub async fn release_by_tag(&self, tag: Option<&str>) -> Release {
        match tag {
            Some(tag) => self.release_at(&["tags", tag]).await,
            None => {
                debug!("No tag given, skipping release lookup");
                Release::default()
            }
        }
    }

    /// Tag of the latest release, or an empty string.
    pub async fn latest_release_tag(&self) -> String {
        let mut release = self.latest_release().await;
        let tag = release.tag_name.take().unwrap_or_default();
        dispose_release(release);
        tag
    }

    /// First asset of `release` named exactly `name`.
    pub fn find_asset<'r>(&self, release: &'r Release, name: &str) -> Option<&'r Asset> {
        release.find_asset(name)
    }

    async fn release_at(&self, segments: &[&str]) -> Release {
        let url = match self.endpoint(segments) {
            Ok(url) => url,
            Err(e) => {
                error!("Failed to build release URL: {:#}", e);
                return Release::default();
            }
        };

        match self.fetch(url).await {
            Some(body) => build_release(&body),
            None => Release::default(),
        }
    }

    /// `release_url` extended by `segments`, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.release_url)
            .with_context(|| format!("Invalid release URL {}", self.release_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Release URL {} cannot have a path", self.release_url))?
            .extend(segments);
        Ok(url)
    }

    /// GETs JSON metadata and returns the status and body.
    ///
    /// The response is consumed before returning, releasing the connection.
    async fn connect(&self, url: &Url) -> Result<(StatusCode, String)> {
        let request =
            HttpRequest::metadata(url.to_string(), self.token.as_deref(), self.ca.as_deref());
        let response = self.transport.get(&request).await?;
        let status = response.status;
        let body = response.text().await?;
        Ok((status, body))
    }

    /// Body of a `200 OK` response; anything else is logged and dropped.
    async fn fetch(&self, url: Url) -> Option<String> {
        match self.connect(&url).await {
            Ok((status, body)) => match classify_status(status, Some(&body)) {
                None => Some(body),
                Some(StatusFailure::NotFound) => {
                    info!("Nothing found at {}", url);
                    None
                }
                Some(failure) => {
                    error!("Request to {} failed: {}", url, failure);
                    None
                }
            },
            Err(e) => {
                error!("Failed to connect to GitHub API at {}: {:#}", url, e);
                None
            }
        }
    }
}

fn releases_url(api_url: &str, repo: &GitHubRepo) -> String {
    format!(
        "{}/repos/{}/{}/releases",
        api_url.trim_end_matches('/'),
        repo.owner,
        repo.repo
    )
}
