//! Release metadata model.
//!
//! - `model` - `Release`, `Asset` and `Author` records
//! - `builder` - JSON payload to `Release`
//!
//! A `Release` owns everything it holds. Dropping it releases every field and
//! child; [`dispose_release`] does the same explicitly and reports what was
//! released.

mod builder;
mod model;

use log::debug;

pub use builder::{build_release, tags_from_list};
pub use model::{Asset, Author, Release};

/// Counts of the aggregates released by [`dispose_release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Disposal {
    /// Release-level authors
    pub authors: usize,
    pub assets: usize,
    /// Authors found in asset uploader lists
    pub uploaders: usize,
}

/// Releases a `Release` and everything it owns.
///
/// Takes the release by value, so the same aggregate can never be disposed
/// twice.
pub fn dispose_release(release: Release) -> Disposal {
    let Release { author, assets, .. } = release;

    let mut disposal = Disposal {
        authors: author.len(),
        ..Default::default()
    };
    drop(author);

    for asset in assets {
        disposal.assets += 1;
        disposal.uploaders += asset.uploader.len();
    }

    debug!(
        "Disposed release: {} author(s), {} asset(s), {} uploader(s)",
        disposal.authors, disposal.assets, disposal.uploaders
    );

    disposal
}
