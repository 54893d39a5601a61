use serde::Serialize;

/// Account attached to a release (co-author) or to an asset (uploader).
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct Author {
    pub login: Option<String>,
    pub id: u64,
    pub node_id: Option<String>,
    pub avatar_url: Option<String>,
    pub gravatar_id: Option<String>,
    pub url: Option<String>,
    pub html_url: Option<String>,
    pub followers_url: Option<String>,
    pub following_url: Option<String>,
    pub gists_url: Option<String>,
    pub starred_url: Option<String>,
    pub subscriptions_url: Option<String>,
    pub organizations_url: Option<String>,
    pub repos_url: Option<String>,
    pub events_url: Option<String>,
    pub received_events_url: Option<String>,
    /// Account type ("User", "Bot", "Organization")
    #[serde(rename = "type")]
    pub account_type: Option<String>,
    pub site_admin: bool,
}

/// A binary attached to a release.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct Asset {
    /// API URL of the asset
    pub url: Option<String>,
    pub browser_download_url: Option<String>,
    pub id: u64,
    pub node_id: Option<String>,
    pub name: Option<String>,
    pub label: Option<String>,
    pub state: Option<String>,
    pub content_type: Option<String>,
    /// Size in bytes as reported by the API
    pub size: u64,
    pub download_count: u64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub uploader: Vec<Author>,
}

/// A published release of the repository.
///
/// The release owns every field and child outright; nothing is shared with the
/// payload it was built from or with other releases.
#[derive(Debug, Clone, Serialize, PartialEq, Eq, Default)]
pub struct Release {
    pub url: Option<String>,
    pub html_url: Option<String>,
    pub assets_url: Option<String>,
    pub upload_url: Option<String>,
    pub tarball_url: Option<String>,
    pub zipball_url: Option<String>,
    pub id: u64,
    pub node_id: Option<String>,
    /// Version tag (e.g., "v1.0.0")
    pub tag_name: Option<String>,
    pub target_commitish: Option<String>,
    pub name: Option<String>,
    pub body: Option<String>,
    pub draft: bool,
    pub prerelease: bool,
    pub created_at: Option<String>,
    pub published_at: Option<String>,
    pub author: Vec<Author>,
    pub assets: Vec<Asset>,
}

impl Release {
    /// Returns true when no release was found (the default, empty release).
    pub fn is_empty(&self) -> bool {
        self.tag_name.is_none()
    }

    /// Finds the first asset whose name matches exactly (case-sensitive).
    pub fn find_asset(&self, name: &str) -> Option<&Asset> {
        self.assets
            .iter()
            .find(|asset| asset.name.as_deref() == Some(name))
    }
}
