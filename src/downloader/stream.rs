// Output stream types shared by the direct and muxed paths

use std::fmt;
use std::future::Future;
use std::io;
use std::pin::Pin;
use std::task::{ready, Context, Poll};
use tokio::io::{AsyncRead, ReadBuf};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use super::errors::Result;

/// A readable stream paired with its declared length, if any.
/// `None` means unknown, not empty.
pub struct SizedStream {
    reader: Pin<Box<dyn AsyncRead + Send>>,
    size: Option<u64>,
}

impl SizedStream {
    pub fn new<R>(reader: R, size: Option<u64>) -> Self
    where
        R: AsyncRead + Send + 'static,
    {
        Self {
            reader: Box::pin(reader),
            size,
        }
    }

    /// Declared byte length. For muxed output this is the sum of both legs
    /// and ignores container overhead.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    pub fn into_inner(self) -> Pin<Box<dyn AsyncRead + Send>> {
        self.reader
    }
}

impl AsyncRead for SizedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        self.reader.as_mut().poll_read(cx, buf)
    }
}

impl fmt::Debug for SizedStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SizedStream")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

/// Result of one download request
#[derive(Debug)]
pub struct DownloadOutput {
    pub stream: SizedStream,
    /// Extension for the produced bytes (format extension, or the muxer container's)
    pub extension: String,
}

/// Reader over a producer's output that reports the producer's verdict.
///
/// When the inner reader hits EOF, the read stays pending until the producer
/// sends its terminal result; a failure becomes a read error instead of a
/// clean EOF, and every later read repeats it. Dropping the reader cancels
/// `cancel`.
pub struct TrackedReader<R> {
    inner: R,
    outcome: Option<oneshot::Receiver<Result<()>>>,
    failure: Option<(io::ErrorKind, String)>,
    cancel: CancellationToken,
}

impl<R> TrackedReader<R> {
    pub fn new(
        inner: R,
        outcome: oneshot::Receiver<Result<()>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            inner,
            outcome: Some(outcome),
            failure: None,
            cancel,
        }
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for TrackedReader<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();

        if let Some((kind, message)) = &this.failure {
            return Poll::Ready(Err(io::Error::new(*kind, message.clone())));
        }
        if buf.remaining() == 0 {
            return Pin::new(&mut this.inner).poll_read(cx, buf);
        }

        let before = buf.filled().len();
        ready!(Pin::new(&mut this.inner).poll_read(cx, buf))?;
        if buf.filled().len() > before {
            return Poll::Ready(Ok(()));
        }

        let Some(outcome) = this.outcome.as_mut() else {
            return Poll::Ready(Ok(()));
        };
        let verdict = ready!(Pin::new(outcome).poll(cx));
        this.outcome = None;

        let err: io::Error = match verdict {
            Ok(Ok(())) => return Poll::Ready(Ok(())),
            Ok(Err(e)) => e.into(),
            Err(_) => io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "producer stopped without reporting a result",
            ),
        };
        this.failure = Some((err.kind(), err.to_string()));
        Poll::Ready(Err(err))
    }
}

impl<R> Drop for TrackedReader<R> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
