use anyhow::{Context, Result, anyhow, bail};
use log::{debug, info, warn};
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::{FlashRegion, UpdateSink};
use crate::runtime::Runtime;

/// Update sink that writes each region's image to a file.
///
/// Bytes are staged in `<target>.part` and moved over the target only once
/// the declared size has been written in full.
pub struct FileSink<R: Runtime> {
    runtime: R,
    firmware: Option<PathBuf>,
    filesystem: Option<PathBuf>,
    staged: Option<Staged>,
}

struct Staged {
    target: PathBuf,
    part: PathBuf,
    writer: Box<dyn Write + Send>,
    expected: u64,
    written: u64,
}

impl<R: Runtime> FileSink<R> {
    pub fn new(runtime: R) -> Self {
        Self {
            runtime,
            firmware: None,
            filesystem: None,
            staged: None,
        }
    }

    /// Sets the file that receives images for `region`.
    pub fn with_target(mut self, region: FlashRegion, path: impl Into<PathBuf>) -> Self {
        let path = Some(path.into());
        match region {
            FlashRegion::Firmware => self.firmware = path,
            FlashRegion::Filesystem => self.filesystem = path,
        }
        self
    }

    fn target(&self, region: FlashRegion) -> Option<&Path> {
        match region {
            FlashRegion::Firmware => self.firmware.as_deref(),
            FlashRegion::Filesystem => self.filesystem.as_deref(),
        }
    }

    /// Closes and deletes a staging file that will not be moved into place.
    fn discard(&self, staged: Staged) {
        let Staged { part, writer, .. } = staged;
        drop(writer);
        if let Err(e) = self.runtime.remove_file(&part) {
            warn!("Failed to remove staging file {:?}: {:#}", part, e);
        }
    }
}

impl<R: Runtime> Drop for FileSink<R> {
    fn drop(&mut self) {
        if let Some(staged) = self.staged.take() {
            warn!("Discarding unfinished image at {:?}", staged.part);
            self.discard(staged);
        }
    }
}

fn part_path(target: &Path) -> PathBuf {
    let mut name: OsString = target.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

impl<R: Runtime> UpdateSink for FileSink<R> {
    #[tracing::instrument(skip(self))]
    fn begin(&mut self, size: u64, region: FlashRegion) -> Result<()> {
        if size == 0 {
            bail!("Refusing to flash an empty {} image", region);
        }

        let target = self
            .target(region)
            .ok_or_else(|| anyhow!("No target configured for the {} region", region))?
            .to_path_buf();

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() && !self.runtime.exists(parent) {
                self.runtime
                    .create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {:?}", parent))?;
            }
        }

        if let Some(previous) = self.staged.take() {
            warn!("Discarding unfinished image at {:?}", previous.part);
            self.discard(previous);
        }

        let part = part_path(&target);
        let writer = self
            .runtime
            .create_file(&part)
            .with_context(|| format!("Failed to create staging file {:?}", part))?;

        info!("Writing {} byte {} image to {:?}", size, region, target);
        self.staged = Some(Staged {
            target,
            part,
            writer,
            expected: size,
            written: 0,
        });
        Ok(())
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let staged = self.staged.as_mut().context("Write before begin")?;

        let remaining = usize::try_from(staged.expected - staged.written).unwrap_or(usize::MAX);
        let len = data.len().min(remaining);
        staged
            .writer
            .write_all(&data[..len])
            .context("Failed to write to staging file")?;
        staged.written += len as u64;

        if len < data.len() {
            debug!(
                "Accepted {} of {} bytes; image is full at {} bytes",
                len,
                data.len(),
                staged.expected
            );
        }
        Ok(len)
    }

    #[tracing::instrument(skip(self))]
    fn end(&mut self) -> Result<()> {
        let mut staged = self.staged.take().context("End before begin")?;

        if let Err(e) = staged.writer.flush() {
            self.discard(staged);
            return Err(e).context("Failed to flush staging file");
        }

        if staged.written != staged.expected {
            let (written, expected) = (staged.written, staged.expected);
            self.discard(staged);
            bail!("Image incomplete: {} of {} bytes written", written, expected);
        }

        let Staged {
            target,
            part,
            writer,
            ..
        } = staged;
        drop(writer);

        if let Err(e) = self.runtime.rename(&part, &target) {
            if let Err(cleanup) = self.runtime.remove_file(&part) {
                warn!("Failed to remove staging file {:?}: {:#}", part, cleanup);
            }
            return Err(e)
                .with_context(|| format!("Failed to move image into place at {:?}", target));
        }

        info!("Image written to {:?}", target);
        Ok(())
    }
}
