//! Flash entry points of [`GithubOta`].

use log::{error, info, warn};
use reqwest::StatusCode;

use super::GithubOta;
use crate::flash::{FlashOutcome, FlashRegion, UpdateSink, write_image};
use crate::http::{HttpRequest, Transport};
use crate::metadata::{Asset, Release};

impl<T: Transport> GithubOta<T> {
    /// Flashes `asset` as the application image.
    pub async fn flash_firmware<S>(&mut self, sink: &mut S, asset: &Asset) -> FlashOutcome
    where
        S: UpdateSink + ?Sized,
    {
        self.flash_asset(sink, asset, FlashRegion::Firmware).await
    }

    /// Flashes `asset` as the filesystem image.
    pub async fn flash_filesystem<S>(&mut self, sink: &mut S, asset: &Asset) -> FlashOutcome
    where
        S: UpdateSink + ?Sized,
    {
        self.flash_asset(sink, asset, FlashRegion::Filesystem).await
    }

    /// Flashes the asset of `release` named `name` (default `firmware.bin`)
    /// as the application image.
    pub async fn flash_firmware_from<S>(
        &mut self,
        sink: &mut S,
        release: &Release,
        name: Option<&str>,
    ) -> FlashOutcome
    where
        S: UpdateSink + ?Sized,
    {
        self.flash_release_asset(sink, release, name, FlashRegion::Firmware)
            .await
    }

    /// Flashes the asset of `release` named `name` (default `spiffs.bin`)
    /// as the filesystem image.
    pub async fn flash_filesystem_from<S>(
        &mut self,
        sink: &mut S,
        release: &Release,
        name: Option<&str>,
    ) -> FlashOutcome
    where
        S: UpdateSink + ?Sized,
    {
        self.flash_release_asset(sink, release, name, FlashRegion::Filesystem)
            .await
    }

    /// Looks up `name` (or the region's default asset) in `release` and
    /// flashes it. A missing asset is [`FlashOutcome::NullUrl`].
    pub async fn flash_release_asset<S>(
        &mut self,
        sink: &mut S,
        release: &Release,
        name: Option<&str>,
        region: FlashRegion,
    ) -> FlashOutcome
    where
        S: UpdateSink + ?Sized,
    {
        let name = name.unwrap_or(region.default_asset_name());
        match release.find_asset(name) {
            Some(asset) => self.flash_asset(sink, asset, region).await,
            None => {
                error!(
                    "Asset {} not found in release {}",
                    name,
                    release.tag_name.as_deref().unwrap_or("<none>")
                );
                FlashOutcome::NullUrl
            }
        }
    }

    /// Flashes `asset` to `region`.
    ///
    /// Assets without a download URL are [`FlashOutcome::NullUrl`]; otherwise
    /// the binary is fetched through the asset endpoint by id.
    pub async fn flash_asset<S>(
        &mut self,
        sink: &mut S,
        asset: &Asset,
        region: FlashRegion,
    ) -> FlashOutcome
    where
        S: UpdateSink + ?Sized,
    {
        if asset.browser_download_url.is_none() {
            error!(
                "Asset {} has no download URL",
                asset.name.as_deref().unwrap_or("<unnamed>")
            );
            return FlashOutcome::NullUrl;
        }
        self.flash_by_asset_id(sink, asset.id, region).await
    }

    /// Downloads asset `asset_id` and streams it into `sink`.
    ///
    /// The connection is released before returning on every path.
    #[tracing::instrument(skip(self, sink), fields(repo = %self.repo))]
    pub async fn flash_by_asset_id<S>(
        &mut self,
        sink: &mut S,
        asset_id: u64,
        region: FlashRegion,
    ) -> FlashOutcome
    where
        S: UpdateSink + ?Sized,
    {
        let id = asset_id.to_string();
        let url = match self.endpoint(&["assets", &id]) {
            Ok(url) => url,
            Err(e) => {
                error!("Failed to build asset URL: {:#}", e);
                return FlashOutcome::NullUrl;
            }
        };

        info!("Downloading asset {} to {}...", asset_id, region);

        let request =
            HttpRequest::download(url.to_string(), self.token.as_deref(), self.ca.as_deref());
        let mut response = match self.transport.get(&request).await {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to connect to {}: {:#}", url, e);
                return FlashOutcome::ConnectError;
            }
        };

        if response.status != StatusCode::OK {
            error!("Download of asset {} failed with {}", asset_id, response.status);
            return FlashOutcome::ConnectError;
        }

        let total = match response.content_length {
            Some(length) => length,
            None => {
                warn!("Asset {} was sent without a content length", asset_id);
                0
            }
        };

        let progress = &mut self.progress;
        let mut on_progress = |percent: u8| {
            if let Some(callback) = progress.as_mut() {
                callback(percent);
            }
        };

        write_image(
            response.body.as_mut(),
            sink,
            total,
            region,
            &mut on_progress,
        )
        .await
    }
}
