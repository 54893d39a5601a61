use anyhow::{Context, Result, bail};
use log::{debug, warn};

use crate::{github::GitHubRepo, metadata::dispose_release, runtime::Runtime};

use super::config::Config;
use super::{parse_target, resolve_release};

/// Prints every release tag, one per line.
#[tracing::instrument(skip(config))]
pub async fn tags<R: Runtime>(config: Config<R>, repo_str: &str) -> Result<()> {
    let repo = repo_str.parse::<GitHubRepo>()?;
    let tags = config.ota(&repo).list_tags().await;

    if tags.is_empty() {
        warn!("No releases found for {}", repo);
    }
    for tag in &tags {
        println!("{}", tag);
    }
    Ok(())
}

/// Prints the tag of the latest release.
#[tracing::instrument(skip(config))]
pub async fn latest<R: Runtime>(config: Config<R>, repo_str: &str) -> Result<()> {
    let repo = repo_str.parse::<GitHubRepo>()?;
    let tag = config.ota(&repo).latest_release_tag().await;

    if tag.is_empty() {
        bail!("No release found for {}", repo);
    }
    println!("{}", tag);
    Ok(())
}

/// Prints a release as pretty JSON.
#[tracing::instrument(skip(config))]
pub async fn show<R: Runtime>(
    config: Config<R>,
    repo_str: &str,
    tag: Option<String>,
) -> Result<()> {
    let spec = parse_target(repo_str, tag)?;
    let release = resolve_release(&config.ota(&spec.repo), &spec).await?;

    let json = serde_json::to_string_pretty(&release).context("Failed to serialize release")?;
    println!("{}", json);

    let disposal = dispose_release(release);
    debug!(
        "Released {} authors, {} assets, {} uploaders",
        disposal.authors, disposal.assets, disposal.uploaders
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::MockRuntime;
    use mockall::predicate::eq;

    fn config(api_url: &str) -> Config<MockRuntime> {
        let mut runtime = MockRuntime::new();
        runtime
            .expect_env_var()
            .with(eq("GITHUB_TOKEN"))
            .returning(|_| Err(std::env::VarError::NotPresent));
        Config::new(runtime, Some(api_url.to_string()), None).unwrap()
    }

    #[tokio::test]
    async fn test_tags_command() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/owner/repo/releases?per_page=100&page=1")
            .with_status(200)
            .with_body(r#"[{"tag_name": "v1.0.0"}]"#)
            .create_async()
            .await;

        tags(config(&server.url()), "owner/repo").await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_tags_command_invalid_repo() {
        assert!(tags(config("http://127.0.0.1:9"), "not-a-repo").await.is_err());
    }

    #[tokio::test]
    async fn test_latest_command_without_release_fails() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/owner/repo/releases/latest")
            .with_status(404)
            .create_async()
            .await;

        let result = latest(config(&server.url()), "owner/repo").await;

        mock.assert_async().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_show_command_by_tag() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/repos/owner/repo/releases/tags/v1.0.0")
            .with_status(200)
            .with_body(r#"{"tag_name": "v1.0.0", "assets": [{"name": "firmware.bin"}]}"#)
            .create_async()
            .await;

        show(config(&server.url()), "owner/repo", Some("v1.0.0".into()))
            .await
            .unwrap();

        mock.assert_async().await;
    }
}
