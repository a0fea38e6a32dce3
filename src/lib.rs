pub mod downloader;

use tracing_subscriber::EnvFilter;

pub use downloader::{
    ChunkedFetcher, DownloadError, DownloadOptions, DownloadOutput, DownloadPlan,
    DownloaderConfig, FfmpegMuxer, Format, FormatCatalog, FormatKind, FormatSelector, Item,
    ItemPages, Muxer, Quality, RawDescriptor, RemuxOrchestrator, Result, Service,
    ServiceRegistry, SizedStream,
};

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` (e.g. `"adaptive_downloader=info"`). Later calls are no-ops.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
