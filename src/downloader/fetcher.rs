// ChunkedFetcher - sequential Range requests against throttling CDNs
//
// Each request asks for `[offset, offset + chunk_size - 1]`; the body is
// forwarded to the sink as it arrives. A short (or empty) chunk, or a 416
// past the first request, marks the end of the resource.
// The idle timeout bounds the wait for response headers and for each body
// read, not the whole transfer.

use futures::StreamExt;
use reqwest::header::RANGE;
use reqwest::StatusCode;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::errors::{DownloadError, Result};
use super::models::DownloaderConfig;

/// Idle timeout used unless configured otherwise
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads one URL through fixed-size range requests
#[derive(Debug, Clone)]
pub struct ChunkedFetcher {
    client: reqwest::Client,
    chunk_size: u64,
    idle_timeout: Duration,
}

impl ChunkedFetcher {
    pub fn new(client: reqwest::Client, chunk_size: u64) -> Self {
        Self {
            client,
            chunk_size: chunk_size.max(1),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    /// Fetcher using `client` with the chunk size and idle timeout from `config`
    pub fn from_config(client: reqwest::Client, config: &DownloaderConfig) -> Self {
        Self::new(client, config.chunk_size).with_idle_timeout(config.request_timeout())
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    /// Stream `url` into `sink`, closing the sink on normal completion.
    /// Returns the number of bytes written. Any request or copy error aborts
    /// immediately; bytes already written stay in the sink.
    pub async fn fetch<W>(&self, url: &str, mut sink: W, cancel: &CancellationToken) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut offset = 0u64;
        let mut total = 0u64;

        loop {
            let end = offset.saturating_add(self.chunk_size - 1);
            debug!("requesting bytes={}-{} of {}", offset, end, url);

            let request = self
                .client
                .get(url)
                .header(RANGE, format!("bytes={}-{}", offset, end));

            let response = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                response = idle(self.idle_timeout, "response headers", request.send()) => response??,
            };

            let status = response.status();
            if status == StatusCode::RANGE_NOT_SATISFIABLE && offset > 0 {
                // Resource size was an exact multiple of the chunk size
                debug!("range past end of {}, done", url);
                break;
            }
            if status == StatusCode::OK && offset > 0 {
                // Copying a full body here would duplicate earlier chunks
                return Err(DownloadError::status(status, url));
            }
            if !status.is_success() {
                return Err(DownloadError::status(status, url));
            }

            let copied = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(DownloadError::Cancelled),
                copied = self.copy_body(response, &mut sink) => copied?,
            };
            total += copied;

            if status != StatusCode::PARTIAL_CONTENT {
                debug!("server ignored Range for {}, got full body", url);
                break;
            }

            offset = offset.saturating_add(self.chunk_size);
            if copied < self.chunk_size {
                break;
            }
        }

        sink.flush().await?;
        sink.shutdown().await?;

        info!("fetched {} bytes from {}", total, url);
        Ok(total)
    }

    async fn copy_body<W>(&self, response: reqwest::Response, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let mut stream = response.bytes_stream();
        let mut copied = 0u64;

        while let Some(chunk) = idle(self.idle_timeout, "response body", stream.next()).await? {
            let chunk = chunk?;
            sink.write_all(&chunk).await?;
            copied += chunk.len() as u64;
        }

        Ok(copied)
    }
}

/// Fails with `TimedOut` when `fut` makes no progress within `limit`
async fn idle<F: Future>(limit: Duration, what: &str, fut: F) -> Result<F::Output> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        io::Error::new(
            io::ErrorKind::TimedOut,
            format!("no {} within {:?}", what, limit),
        )
        .into()
    })
}
