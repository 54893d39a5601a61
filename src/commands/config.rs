use anyhow::{Context, Result};
use log::debug;
use std::path::Path;

use crate::{
    github::{DEFAULT_API_URL, GitHubRepo, GithubOta},
    runtime::Runtime,
};

/// Settings shared by every command.
pub struct Config<R: Runtime> {
    pub runtime: R,
    pub api_url: String,
    pub token: Option<String>,
    /// PEM contents of the `--ca-file` certificate
    pub ca: Option<String>,
}

impl<R: Runtime> Config<R> {
    pub fn new(runtime: R, api_url: Option<String>, ca_file: Option<&Path>) -> Result<Self> {
        let token = match runtime.env_var("GITHUB_TOKEN") {
            Ok(token) if !token.trim().is_empty() => {
                debug!("Using GITHUB_TOKEN for authentication: {}", mask_token(&token));
                Some(token.trim().to_string())
            }
            _ => None,
        };

        let ca = match ca_file {
            Some(path) => {
                let pem = runtime
                    .read_to_string(path)
                    .with_context(|| format!("Failed to read CA certificate {:?}", path))?;
                debug!("Using CA certificate from {:?}", path);
                Some(pem)
            }
            None => None,
        };

        Ok(Self {
            runtime,
            api_url: api_url.unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            token,
            ca,
        })
    }

    /// Release client for `repo` with this configuration applied.
    pub fn ota(&self, repo: &GitHubRepo) -> GithubOta {
        let mut ota = GithubOta::new(&repo.owner, &repo.repo, self.token.as_deref())
            .with_api_url(&self.api_url);
        if let Some(ca) = &self.ca {
            ota.set_ca(ca);
        }
        ota
    }
}

/// Shows the first 8 and last 4 characters of long tokens, nothing of short ones.
fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() < 16 {
        return "*********".to_string();
    }
    let head: String = chars[..8].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}*********{}", head, tail)
}
