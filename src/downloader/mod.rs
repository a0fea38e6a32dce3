// Downloader module - adaptive stream acquisition and remux pipeline

pub mod backends;
pub mod catalog;
pub mod errors;
pub mod fetcher;
pub mod format_selector;
pub mod models;
pub mod registry;
pub mod remux;
pub mod stream;
pub mod tools;
pub mod traits;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use catalog::{FormatCatalog, RawDescriptor};
pub use errors::{DownloadError, Result};
pub use fetcher::ChunkedFetcher;
pub use format_selector::FormatSelector;
pub use models::{
    DownloadOptions, DownloadPlan, DownloaderConfig, Format, FormatKind, Quality, SelectionPolicy,
};
pub use registry::ServiceRegistry;
pub use remux::RemuxOrchestrator;
pub use stream::{DownloadOutput, SizedStream};
pub use tools::{FfmpegMuxer, Muxer};
pub use traits::{Item, ItemPages, Service};
