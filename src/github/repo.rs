use anyhow::{Result, anyhow};
use std::str::FromStr;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct GitHubRepo {
    pub owner: String,
    pub repo: String,
}

impl GitHubRepo {
    pub fn new(owner: &str, repo: &str) -> Self {
        Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        }
    }
}

impl std::fmt::Display for GitHubRepo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

impl FromStr for GitHubRepo {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() {
            Err(anyhow!("Invalid repository format. Expected 'owner/repo'."))
        } else {
            Ok(GitHubRepo::new(parts[0], parts[1]))
        }
    }
}

/// A repository with an optional release tag.
/// Format: "owner/repo" or "owner/repo@tag"
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct RepoSpec {
    pub repo: GitHubRepo,
    pub tag: Option<String>,
}

impl std::fmt::Display for RepoSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.tag {
            Some(tag) => write!(f, "{}@{}", self.repo, tag),
            None => write!(f, "{}", self.repo),
        }
    }
}

impl FromStr for RepoSpec {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (repo_part, tag) = match s.rfind('@') {
            Some(at_pos) => {
                let (repo, tag) = s.split_at(at_pos);
                let tag = &tag[1..];
                if tag.is_empty() {
                    return Err(anyhow!(
                        "Invalid format: tag after @ cannot be empty. Expected 'owner/repo@tag'."
                    ));
                }
                (repo, Some(tag.to_string()))
            }
            None => (s, None),
        };

        let repo = repo_part.parse::<GitHubRepo>()?;
        Ok(RepoSpec { repo, tag })
    }
}
