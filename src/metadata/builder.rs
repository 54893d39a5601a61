//! Builds [`Release`] aggregates out of GitHub release API payloads.
//!
//! Fields are read one by one from the parsed JSON tree. A missing key or a
//! value of the wrong type leaves that field empty and the rest of the
//! release is still built.

use log::{debug, error};
use serde_json::{Map, Value};

use super::{Asset, Author, Release};

/// Parses a release payload into a [`Release`].
///
/// Returns `Release::default()` when the payload is not valid JSON or is not
/// a JSON object.
#[tracing::instrument(skip(payload), fields(len = payload.len()))]
pub fn build_release(payload: &str) -> Release {
    let document: Value = match serde_json::from_str(payload) {
        Ok(document) => document,
        Err(e) => {
            error!("Failed to parse release payload: {}", e);
            return Release::default();
        }
    };

    match document.as_object() {
        Some(object) => release_from_object(object),
        None => {
            error!("Release payload is not a JSON object");
            Release::default()
        }
    }
}

/// Extracts `tag_name` from every element of a release list payload.
///
/// Elements without a string `tag_name` are skipped.
pub fn tags_from_list(payload: &str) -> Option<Vec<String>> {
    let document: Value = match serde_json::from_str(payload) {
        Ok(document) => document,
        Err(e) => {
            error!("Failed to parse release list payload: {}", e);
            return None;
        }
    };

    let Some(releases) = document.as_array() else {
        error!("Release list payload is not a JSON array");
        return None;
    };

    Some(
        releases
            .iter()
            .filter_map(|release| release.get("tag_name").and_then(Value::as_str))
            .map(str::to_string)
            .collect(),
    )
}

pub(crate) fn release_from_object(object: &Map<String, Value>) -> Release {
    let fields = Fields(object);

    let release = Release {
        url: fields.text("url"),
        html_url: fields.text("html_url"),
        assets_url: fields.text("assets_url"),
        upload_url: fields.text("upload_url"),
        tarball_url: fields.text("tarball_url"),
        zipball_url: fields.text("zipball_url"),
        id: fields.number("id"),
        node_id: fields.text("node_id"),
        tag_name: fields.text("tag_name"),
        target_commitish: fields.text("target_commitish"),
        name: fields.text("name"),
        body: fields.text("body"),
        draft: fields.flag("draft"),
        prerelease: fields.flag("prerelease"),
        created_at: fields.text("created_at"),
        published_at: fields.text("published_at"),
        author: fields.objects("author").map(author_from_object).collect(),
        assets: fields.objects("assets").map(asset_from_object).collect(),
    };

    debug!(
        "Built release {:?} with {} author(s) and {} asset(s)",
        release.tag_name,
        release.author.len(),
        release.assets.len()
    );

    release
}

fn asset_from_object(object: &Map<String, Value>) -> Asset {
    let fields = Fields(object);

    Asset {
        url: fields.text("url"),
        browser_download_url: fields.text("browser_download_url"),
        id: fields.number("id"),
        node_id: fields.text("node_id"),
        name: fields.text("name"),
        label: fields.text("label"),
        state: fields.text("state"),
        content_type: fields.text("content_type"),
        size: fields.number("size"),
        download_count: fields.number("download_count"),
        created_at: fields.text("created_at"),
        updated_at: fields.text("updated_at"),
        uploader: fields.objects("uploader").map(author_from_object).collect(),
    }
}

fn author_from_object(object: &Map<String, Value>) -> Author {
    let fields = Fields(object);

    Author {
        login: fields.text("login"),
        id: fields.number("id"),
        node_id: fields.text("node_id"),
        avatar_url: fields.text("avatar_url"),
        gravatar_id: fields.text("gravatar_id"),
        url: fields.text("url"),
        html_url: fields.text("html_url"),
        followers_url: fields.text("followers_url"),
        following_url: fields.text("following_url"),
        gists_url: fields.text("gists_url"),
        starred_url: fields.text("starred_url"),
        subscriptions_url: fields.text("subscriptions_url"),
        organizations_url: fields.text("organizations_url"),
        repos_url: fields.text("repos_url"),
        events_url: fields.text("events_url"),
        received_events_url: fields.text("received_events_url"),
        account_type: fields.text("type"),
        site_admin: fields.flag("site_admin"),
    }
}

/// Typed, lenient accessors over one JSON object.
struct Fields<'a>(&'a Map<String, Value>);

impl<'a> Fields<'a> {
    fn text(&self, key: &str) -> Option<String> {
        match self.0.get(key) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                error!("Field '{}' is not a string: {}", key, other);
                None
            }
        }
    }

    fn number(&self, key: &str) -> u64 {
        self.0.get(key).and_then(Value::as_u64).unwrap_or_default()
    }

    fn flag(&self, key: &str) -> bool {
        self.0.get(key).and_then(Value::as_bool).unwrap_or_default()
    }

    /// Objects under `key`: every object element of an array, or the value
    /// itself when it is a single object.
    fn objects(&self, key: &str) -> impl Iterator<Item = &'a Map<String, Value>> {
        let object: &'a Map<String, Value> = self.0;
        let values: &'a [Value] = match object.get(key) {
            Some(Value::Array(items)) => items.as_slice(),
            Some(value) if value.is_object() => std::slice::from_ref(value),
            _ => &[],
        };
        values.iter().filter_map(Value::as_object)
    }
}
