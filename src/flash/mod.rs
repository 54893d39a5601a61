//! Streaming an asset body into an update sink.
//!
//! The body is copied through a fixed [`CHUNK_SIZE`] buffer, so memory use
//! does not depend on the image size.

mod file_sink;

use anyhow::Result;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, error, info};

use crate::http::BodyStream;

pub use file_sink::FileSink;

/// Largest piece read from the body and handed to the sink at once.
pub const CHUNK_SIZE: usize = 1024;

/// Default asset name flashed to [`FlashRegion::Firmware`].
pub const DEFAULT_FIRMWARE_ASSET: &str = "firmware.bin";

/// Default asset name flashed to [`FlashRegion::Filesystem`].
pub const DEFAULT_FILESYSTEM_ASSET: &str = "spiffs.bin";

/// Receives the integer percentage each time it changes.
pub type ProgressCallback = Box<dyn FnMut(u8) + Send>;

/// Storage area an image is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlashRegion {
    /// Main application image
    Firmware,
    /// Auxiliary filesystem image (SPIFFS/LittleFS partition)
    Filesystem,
}

impl FlashRegion {
    /// Asset name looked up when the caller does not name one.
    pub fn default_asset_name(self) -> &'static str {
        match self {
            FlashRegion::Firmware => DEFAULT_FIRMWARE_ASSET,
            FlashRegion::Filesystem => DEFAULT_FILESYSTEM_ASSET,
        }
    }
}

impl fmt::Display for FlashRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlashRegion::Firmware => write!(f, "firmware"),
            FlashRegion::Filesystem => write!(f, "filesystem"),
        }
    }
}

impl FromStr for FlashRegion {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "firmware" | "app" => Ok(FlashRegion::Firmware),
            "filesystem" | "spiffs" | "fs" => Ok(FlashRegion::Filesystem),
            _ => anyhow::bail!(
                "Unknown flash region: {}. Expected firmware or filesystem.",
                s
            ),
        }
    }
}

/// Result of a flash operation.
///
/// Failures are listed in the order they are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[must_use]
pub enum FlashOutcome {
    Success,
    /// No download URL could be formed (missing asset or invalid base URL)
    NullUrl,
    /// The download did not answer `200 OK` or the stream broke off
    ConnectError,
    /// The sink refused the declared size or region
    BeginError,
    /// The sink refused or short-wrote a chunk
    WriteError,
    /// The sink failed to finalize the image
    EndError,
}

impl FlashOutcome {
    /// Stable numeric code, `0` for success.
    pub fn code(self) -> u8 {
        match self {
            FlashOutcome::Success => 0,
            FlashOutcome::NullUrl => 1,
            FlashOutcome::ConnectError => 2,
            FlashOutcome::BeginError => 3,
            FlashOutcome::WriteError => 4,
            FlashOutcome::EndError => 5,
        }
    }

    pub fn is_success(self) -> bool {
        self == FlashOutcome::Success
    }
}

impl fmt::Display for FlashOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            FlashOutcome::Success => "success",
            FlashOutcome::NullUrl => "no download URL",
            FlashOutcome::ConnectError => "connection error",
            FlashOutcome::BeginError => "update begin failed",
            FlashOutcome::WriteError => "update write failed",
            FlashOutcome::EndError => "update end failed",
        };
        write!(f, "{}", text)
    }
}

/// Device storage accepting a new image.
#[cfg_attr(test, mockall::automock)]
pub trait UpdateSink: Send {
    /// Prepares `region` for an image of `size` bytes.
    fn begin(&mut self, size: u64, region: FlashRegion) -> Result<()>;

    /// Writes a chunk and returns how many bytes were accepted.
    fn write(&mut self, data: &[u8]) -> Result<usize>;

    /// Finalizes and verifies the image.
    fn end(&mut self) -> Result<()>;
}

/// Tracks the integer percentage of bytes written.
struct Progress {
    total: u64,
    last: u8,
}

impl Progress {
    fn new(total: u64) -> Self {
        Self { total, last: 0 }
    }

    /// Returns the new percentage when it differs from the last one reported.
    fn update(&mut self, written: u64) -> Option<u8> {
        if self.total == 0 {
            return None;
        }
        let percent = (written.min(self.total) * 100 / self.total) as u8;
        if percent == self.last {
            return None;
        }
        self.last = percent;
        Some(percent)
    }
}

/// Streams `total` bytes from `body` into `sink` for `region`.
///
/// Runs begin, the chunk loop and end. Stops at the first sink rejection; no
/// further writes are attempted after a failed one.
#[tracing::instrument(skip(body, sink, on_progress))]
pub(crate) async fn write_image<S>(
    body: &mut dyn BodyStream,
    sink: &mut S,
    total: u64,
    region: FlashRegion,
    on_progress: &mut (dyn FnMut(u8) + Send),
) -> FlashOutcome
where
    S: UpdateSink + ?Sized,
{
    if let Err(e) = sink.begin(total, region) {
        error!(
            operation = "begin",
            total,
            outcome = %FlashOutcome::BeginError,
            "Failed to begin update: {:#}",
            e
        );
        return FlashOutcome::BeginError;
    }

    let mut buffer = [0u8; CHUNK_SIZE];
    let mut written: u64 = 0;
    let mut progress = Progress::new(total);

    while written < total {
        let available = match body.available().await {
            Ok(0) => {
                error!(
                    operation = "read",
                    written,
                    total,
                    outcome = %FlashOutcome::ConnectError,
                    "Download ended before the declared size"
                );
                return FlashOutcome::ConnectError;
            }
            Ok(available) => available,
            Err(e) => {
                error!(
                    operation = "read",
                    written,
                    total,
                    outcome = %FlashOutcome::ConnectError,
                    "Failed to read download stream: {:#}",
                    e
                );
                return FlashOutcome::ConnectError;
            }
        };

        let remaining = usize::try_from(total - written).unwrap_or(usize::MAX);
        let wanted = available.min(CHUNK_SIZE).min(remaining);
        let read = body.read(&mut buffer[..wanted]);

        if read > 0 {
            match sink.write(&buffer[..read]) {
                Ok(accepted) if accepted == read => {}
                Ok(accepted) => {
                    error!(
                        operation = "write",
                        written,
                        total,
                        accepted,
                        offered = read,
                        outcome = %FlashOutcome::WriteError,
                        "Error writing chunk"
                    );
                    return FlashOutcome::WriteError;
                }
                Err(e) => {
                    error!(
                        operation = "write",
                        written,
                        total,
                        outcome = %FlashOutcome::WriteError,
                        "Error writing chunk: {:#}",
                        e
                    );
                    return FlashOutcome::WriteError;
                }
            }

            written += read as u64;
            debug!(operation = "write", written, total, "Written {}/{} bytes", written, total);

            if let Some(percent) = progress.update(written) {
                on_progress(percent);
            }
        }

        tokio::task::yield_now().await;
    }

    if let Err(e) = sink.end() {
        error!(
            operation = "end",
            written,
            total,
            outcome = %FlashOutcome::EndError,
            "Failed to end update: {:#}",
            e
        );
        return FlashOutcome::EndError;
    }

    info!(
        operation = "end",
        written,
        total,
        outcome = %FlashOutcome::Success,
        "Update written to {}",
        region
    );
    FlashOutcome::Success
}
