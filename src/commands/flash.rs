use anyhow::{Result, bail};
use log::info;
use std::io::Write;
use std::path::PathBuf;

use crate::{
    flash::{FileSink, FlashRegion},
    runtime::Runtime,
};

use super::config::Config;
use super::{parse_target, resolve_release};

/// What `ghota flash` downloads and where it goes.
#[derive(Debug, Clone)]
pub struct FlashOptions {
    /// "owner/repo" or "owner/repo@tag"
    pub repo: String,
    pub output: PathBuf,
    pub tag: Option<String>,
    /// Asset name; the region's default when unset
    pub asset: Option<String>,
    pub region: FlashRegion,
}

/// Downloads a release asset into `options.output`, reporting progress on
/// stderr.
#[tracing::instrument(skip(config))]
pub async fn flash<R: Runtime>(config: Config<R>, options: FlashOptions) -> Result<()> {
    let spec = parse_target(&options.repo, options.tag)?;
    let mut ota = config.ota(&spec.repo);
    let release = resolve_release(&ota, &spec).await?;

    ota.set_progress_callback(|percent| {
        eprint!("\rDownloading... {:3}%", percent);
        let _ = std::io::stderr().flush();
    });

    let mut sink = FileSink::new(config.runtime).with_target(options.region, &options.output);
    let outcome = ota
        .flash_release_asset(
            &mut sink,
            &release,
            options.asset.as_deref(),
            options.region,
        )
        .await;
    eprintln!();

    if !outcome.is_success() {
        bail!(
            "Flashing {} from {} failed: {} (code {})",
            options.region,
            spec,
            outcome,
            outcome.code()
        );
    }

    info!("Flashed {} from {} to {:?}", options.region, spec, options.output);
    println!("{}", options.output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::RealRuntime;
    use tempfile::tempdir;

    async fn serve_release(server: &mut mockito::ServerGuard, image: &[u8]) -> Vec<mockito::Mock> {
        let url = server.url();
        let release = server
            .mock("GET", "/repos/owner/repo/releases/latest")
            .with_status(200)
            .with_body(format!(
                r#"{{"tag_name": "v1.0.0", "assets": [
                    {{"id": 7, "name": "spiffs.bin", "browser_download_url": "{}/dl/spiffs.bin"}}
                ]}}"#,
                url
            ))
            .create_async()
            .await;
        let asset = server
            .mock("GET", "/repos/owner/repo/releases/assets/7")
            .with_status(200)
            .with_body(image)
            .create_async()
            .await;
        vec![release, asset]
    }

    #[tokio::test]
    async fn test_flash_filesystem_image_to_file() {
        let mut server = mockito::Server::new_async().await;
        let mocks = serve_release(&mut server, b"filesystem image").await;
        let dir = tempdir().unwrap();
        let output = dir.path().join("spiffs.bin");

        let config = Config::new(RealRuntime, Some(server.url()), None).unwrap();
        flash(
            config,
            FlashOptions {
                repo: "owner/repo".into(),
                output: output.clone(),
                tag: None,
                asset: None,
                region: FlashRegion::Filesystem,
            },
        )
        .await
        .unwrap();

        for mock in mocks {
            mock.assert_async().await;
        }
        assert_eq!(std::fs::read(&output).unwrap(), b"filesystem image");
    }

    #[tokio::test]
    async fn test_flash_missing_asset_fails() {
        let mut server = mockito::Server::new_async().await;
        let _mocks = serve_release(&mut server, b"unused").await;
        let dir = tempdir().unwrap();
        let output = dir.path().join("firmware.bin");

        let config = Config::new(RealRuntime, Some(server.url()), None).unwrap();
        let err = flash(
            config,
            FlashOptions {
                repo: "owner/repo".into(),
                output: output.clone(),
                tag: None,
                asset: None,
                region: FlashRegion::Firmware,
            },
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("code 1"));
        assert!(!output.exists());
    }
}
