pub mod commands;
pub mod flash;
pub mod github;
pub mod http;
pub mod metadata;
pub mod runtime;

pub use flash::{FileSink, FlashOutcome, FlashRegion, UpdateSink};
pub use github::GithubOta;
pub use metadata::{Asset, Author, Release};
