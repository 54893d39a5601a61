//! Command implementations behind the `ghota` binary.

pub mod config;
mod flash;
mod query;

pub use flash::{FlashOptions, flash};
pub use query::{latest, show, tags};

use anyhow::{Result, bail};
use log::debug;

use crate::{
    github::{GithubOta, RepoSpec},
    http::Transport,
    metadata::Release,
};

/// Parses `repo_str` and lets an explicit `tag` override one given as `@tag`.
pub(crate) fn parse_target(repo_str: &str, tag: Option<String>) -> Result<RepoSpec> {
    let mut spec = repo_str.parse::<RepoSpec>()?;
    if tag.is_some() {
        spec.tag = tag;
    }
    Ok(spec)
}

/// The release named by `spec`: its tag if given, the latest otherwise.
pub(crate) async fn resolve_release<T: Transport>(
    ota: &GithubOta<T>,
    spec: &RepoSpec,
) -> Result<Release> {
    let release = match spec.tag.as_deref() {
        Some(tag) => {
            debug!("Looking up release {} of {}", tag, spec.repo);
            ota.release_by_tag(Some(tag)).await
        }
        None => {
            debug!("Looking up latest release of {}", spec.repo);
            ota.latest_release().await
        }
    };

    if release.is_empty() {
        bail!("No release found for {}", spec);
    }
    Ok(release)
}
