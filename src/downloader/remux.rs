// RemuxOrchestrator - turns a DownloadPlan into one output stream
//
// Direct plans stream a single format through an in-memory pipe.
// Muxed plans download the audio leg to a temporary file first, then start
// the muxer and pipe the video leg into its stdin while its stdout is handed
// to the caller. A supervisor task owns the child process and the temporary
// file and reports the terminal result to the output reader.

use std::collections::VecDeque;
use std::io;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::oneshot;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::catalog::FormatCatalog;
use super::errors::{DownloadError, Result};
use super::fetcher::ChunkedFetcher;
use super::format_selector::FormatSelector;
use super::models::{DownloadOptions, DownloadPlan, DownloaderConfig, Format};
use super::stream::{DownloadOutput, SizedStream, TrackedReader};
use super::tools::Muxer;

/// Buffer between the direct fetch task and the reader
const PIPE_CAPACITY: usize = 256 * 1024;

/// Muxer stderr lines kept for error reports
const STDERR_TAIL: usize = 20;

pub struct RemuxOrchestrator {
    fetcher: Arc<ChunkedFetcher>,
    muxer: Arc<dyn Muxer>,
    container: String,
    extension: String,
    temp_dir: Option<PathBuf>,
}

impl RemuxOrchestrator {
    pub fn new(config: &DownloaderConfig, muxer: Arc<dyn Muxer>) -> Result<Self> {
        let fetcher = ChunkedFetcher::from_config(config.build_client()?, config);
        Ok(Self::with_fetcher(fetcher, muxer, config))
    }

    pub fn with_fetcher(
        fetcher: ChunkedFetcher,
        muxer: Arc<dyn Muxer>,
        config: &DownloaderConfig,
    ) -> Self {
        Self {
            fetcher: Arc::new(fetcher),
            muxer,
            container: config.muxer_container.clone(),
            extension: config.muxed_extension().to_string(),
            temp_dir: config.temp_dir.clone(),
        }
    }

    pub fn muxer_available(&self) -> bool {
        self.muxer.is_available()
    }

    /// Select formats for `options` and start the download
    pub async fn acquire(
        &self,
        catalog: &FormatCatalog,
        options: &DownloadOptions,
        cancel: CancellationToken,
    ) -> Result<DownloadOutput> {
        let policy = options.policy(self.muxer_available());
        let plan = FormatSelector::plan(catalog, &policy)?;
        debug!("plan for {:?}: {:?}", policy, plan);
        self.execute(plan, cancel).await
    }

    /// Start the download for a fixed plan. Returns once output can be read;
    /// for muxed plans that is after the audio leg has been fully downloaded.
    pub async fn execute(
        &self,
        plan: DownloadPlan,
        cancel: CancellationToken,
    ) -> Result<DownloadOutput> {
        match plan {
            DownloadPlan::Direct(format) => self.direct(format, cancel),
            DownloadPlan::Muxed { audio, video } => {
                if !self.muxer_available() {
                    return Err(DownloadError::ToolNotFound(self.muxer.name().to_string()));
                }
                self.muxed(audio, video, cancel).await
            }
        }
    }

    fn direct(&self, format: Format, cancel: CancellationToken) -> Result<DownloadOutput> {
        let url = leg_url(&format)?;
        let (writer, reader) = tokio::io::duplex(PIPE_CAPACITY);
        let (tx, rx) = oneshot::channel();

        info!("fetching itag {} ({}) directly", format.itag, format.extension);

        let fetcher = self.fetcher.clone();
        let token = cancel.clone();
        let itag = format.itag;
        tokio::spawn(async move {
            let result = fetcher.fetch(&url, writer, &token).await.map(|_| ());
            if let Err(e) = &result {
                warn!("itag {} failed: {}", itag, e);
            }
            let _ = tx.send(result);
        });

        Ok(DownloadOutput {
            stream: SizedStream::new(TrackedReader::new(reader, rx, cancel), format.content_length),
            extension: format.extension,
        })
    }

    async fn muxed(
        &self,
        audio: Format,
        video: Format,
        cancel: CancellationToken,
    ) -> Result<DownloadOutput> {
        let audio_url = leg_url(&audio)?;
        let video_url = leg_url(&video)?;

        // Audio is fully on disk before any video byte is requested
        let temp = self.temp_file(&audio)?;
        let file = tokio::fs::File::from_std(temp.as_file().try_clone()?);
        info!(
            "downloading audio itag {} to {}",
            audio.itag,
            temp.path().display()
        );
        let audio_len = self.fetcher.fetch(&audio_url, file, &cancel).await?;
        debug!("audio leg complete, {} bytes", audio_len);

        let mut command = self.muxer.command(temp.path(), &self.container);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command.spawn().map_err(|e| DownloadError::Subprocess {
            status: format!("failed to start {}", self.muxer.name()),
            stderr: e.to_string(),
        })?;
        info!(
            "started {} (pid {:?}) for video itag {}",
            self.muxer.name(),
            child.id(),
            video.itag
        );

        let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

        let leg_token = cancel.child_token();
        let fetcher = self.fetcher.clone();
        let token = leg_token.clone();
        let video_leg = tokio::spawn(async move { fetcher.fetch(&video_url, stdin, &token).await });

        let (tx, rx) = oneshot::channel();
        let supervisor = Supervisor {
            name: self.muxer.name().to_string(),
            child,
            temp,
            video_leg,
            leg_token,
            stderr: tokio::spawn(drain_stderr(stderr)),
            cancel: cancel.clone(),
        };
        tokio::spawn(async move {
            let _ = tx.send(supervisor.run().await);
        });

        let size = audio
            .content_length
            .zip(video.content_length)
            .map(|(a, v)| a + v);

        Ok(DownloadOutput {
            stream: SizedStream::new(TrackedReader::new(stdout, rx, cancel), size),
            extension: self.extension.clone(),
        })
    }

    fn temp_file(&self, audio: &Format) -> Result<NamedTempFile> {
        let suffix = format!(".{}", audio.extension);
        let mut builder = tempfile::Builder::new();
        builder.prefix("audio").suffix(&suffix);

        let file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        Ok(file)
    }
}

/// Owns the muxer process and the temporary audio file for one request
struct Supervisor {
    name: String,
    child: Child,
    temp: NamedTempFile,
    video_leg: JoinHandle<Result<u64>>,
    leg_token: CancellationToken,
    stderr: JoinHandle<Vec<String>>,
    cancel: CancellationToken,
}

impl Supervisor {
    async fn run(mut self) -> Result<()> {
        let mut leg: Option<Result<u64>> = None;

        let status = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("download cancelled, killing {}", self.name);
                    if let Err(e) = self.child.kill().await {
                        warn!("failed to kill {}: {}", self.name, e);
                    }
                    break None;
                }
                joined = &mut self.video_leg, if leg.is_none() => {
                    let result = flatten(joined);
                    if let Err(e) = &result {
                        if !is_expected_leg_end(e) {
                            warn!("video leg failed, stopping {}: {}", self.name, e);
                            let _ = self.child.start_kill();
                        }
                    }
                    leg = Some(result);
                }
                status = self.child.wait() => break Some(status),
            }
        };

        if leg.is_none() {
            // Muxer exited on its own; writes to its stdin can only fail now
            self.leg_token.cancel();
            leg = Some(flatten((&mut self.video_leg).await));
        }

        let tail = self.stderr.await.unwrap_or_default();
        let temp_path = self.temp.path().to_path_buf();
        if let Err(e) = self.temp.close() {
            warn!("failed to remove {}: {}", temp_path.display(), e);
        }

        let status = match status {
            None => return Err(DownloadError::Cancelled),
            Some(status) => status?,
        };
        info!("{} exited with {}", self.name, status);

        if let Some(Err(e)) = leg {
            if !is_expected_leg_end(&e) {
                return Err(e);
            }
        }
        if !status.success() {
            return Err(DownloadError::Subprocess {
                status: status.to_string(),
                stderr: tail.join("\n"),
            });
        }
        Ok(())
    }
}

/// Reads stderr until the muxer closes it. Lines need not be valid UTF-8.
async fn drain_stderr<R>(stderr: R) -> Vec<String>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(stderr);
    let mut raw = Vec::new();
    let mut tail = VecDeque::with_capacity(STDERR_TAIL);

    loop {
        raw.clear();
        match reader.read_until(b'\n', &mut raw).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(target: "muxer", "stderr read failed: {}", e);
                break;
            }
        }

        let line = String::from_utf8_lossy(&raw).trim_end_matches(['\r', '\n']).to_string();
        debug!(target: "muxer", "{}", line);
        if tail.len() == STDERR_TAIL {
            tail.pop_front();
        }
        tail.push_back(line);
    }

    tail.into()
}

fn flatten(joined: std::result::Result<Result<u64>, JoinError>) -> Result<u64> {
    joined.unwrap_or_else(|e| Err(io::Error::other(e).into()))
}

/// Leg endings caused by the muxer going away, judged by its exit status instead
fn is_expected_leg_end(err: &DownloadError) -> bool {
    match err {
        DownloadError::Io { source } => source.kind() == io::ErrorKind::BrokenPipe,
        DownloadError::Cancelled => true,
        _ => false,
    }
}

fn leg_url(format: &Format) -> Result<String> {
    format.url.clone().ok_or_else(|| {
        DownloadError::Decode(format!(
            "itag {} has no direct URL (encrypted signature)",
            format.itag
        ))
    })
}

fn missing_pipe(pipe: &str) -> DownloadError {
    io::Error::other(format!("muxer {} was not captured", pipe)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::models::FormatKind;
    use crate::downloader::test_support::{patterned, RangeServer};
    use std::collections::HashMap;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::process::Command;

    /// Runs a shell script as the muxer; `$0` is the audio file path
    struct ScriptMuxer {
        script: Option<&'static str>,
        spawns: AtomicUsize,
        last_audio: Mutex<Option<PathBuf>>,
    }

    impl ScriptMuxer {
        fn new(script: &'static str) -> Arc<Self> {
            Arc::new(Self {
                script: Some(script),
                spawns: AtomicUsize::new(0),
                last_audio: Mutex::new(None),
            })
        }

        fn unavailable() -> Arc<Self> {
            Arc::new(Self {
                script: None,
                spawns: AtomicUsize::new(0),
                last_audio: Mutex::new(None),
            })
        }

        fn spawns(&self) -> usize {
            self.spawns.load(Ordering::SeqCst)
        }

        fn last_audio(&self) -> PathBuf {
            self.last_audio.lock().unwrap().clone().unwrap()
        }
    }

    impl Muxer for ScriptMuxer {
        fn name(&self) -> &str {
            "script"
        }

        fn is_available(&self) -> bool {
            self.script.is_some()
        }

        fn command(&self, audio: &Path, _container: &str) -> Command {
            self.spawns.fetch_add(1, Ordering::SeqCst);
            *self.last_audio.lock().unwrap() = Some(audio.to_path_buf());

            let mut cmd = Command::new("sh");
            cmd.arg("-c").arg(self.script.unwrap_or("exit 1")).arg(audio);
            cmd
        }
    }

    const CONCAT: &str = r#"cat "$0" -"#;

    fn make_format(
        itag: u32,
        kind: FormatKind,
        extension: &str,
        url: String,
        len: usize,
        bitrate: u64,
    ) -> Format {
        let mut attributes = HashMap::new();
        attributes.insert("bitrate".to_string(), bitrate.to_string());
        Format {
            itag,
            kind,
            extension: extension.to_string(),
            bitrate,
            audio_bitrate: if kind == FormatKind::Video { 0 } else { bitrate },
            resolution: String::new(),
            content_length: Some(len as u64),
            url: Some(url),
            attributes,
            rtmp: false,
        }
    }

    fn orchestrator(muxer: Arc<ScriptMuxer>, chunk: u64, temp_dir: &Path) -> RemuxOrchestrator {
        let config = DownloaderConfig::default().with_temp_dir(Some(temp_dir.to_path_buf()));
        RemuxOrchestrator::with_fetcher(
            ChunkedFetcher::new(reqwest::Client::new(), chunk),
            muxer,
            &config,
        )
    }

    async fn wait_removed(path: &Path) {
        for _ in 0..100 {
            if !path.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("{} was not removed", path.display());
    }

    #[tokio::test]
    async fn test_degraded_path_spawns_nothing() {
        let combined = patterned(3000);
        let server = RangeServer::start(vec![
            ("/audio", patterned(100)),
            ("/video", patterned(200)),
            ("/combined", combined.clone()),
        ])
        .await;
        let catalog = FormatCatalog::from(vec![
            make_format(140, FormatKind::Audio, "m4a", server.url("/audio"), 100, 128_000),
            make_format(137, FormatKind::Video, "mp4", server.url("/video"), 200, 4_000_000),
            make_format(36, FormatKind::Combined, "3gp", server.url("/combined"), 3000, 38_000),
        ]);

        let muxer = ScriptMuxer::unavailable();
        let dir = tempfile::tempdir().unwrap();
        let output = orchestrator(muxer.clone(), 1024, dir.path())
            .acquire(&catalog, &DownloadOptions::default(), CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.extension, "3gp");
        assert_eq!(output.stream.size(), Some(3000));

        let mut bytes = Vec::new();
        let mut stream = output.stream;
        stream.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes, combined);
        assert_eq!(muxer.spawns(), 0);
        assert!(server.ranges("/video").is_empty());
    }

    #[tokio::test]
    async fn test_direct_leg_failure_is_read_error() {
        let server = RangeServer::start(vec![]).await;
        let format = make_format(18, FormatKind::Combined, "mp4", server.url("/gone"), 10, 96_000);

        let dir = tempfile::tempdir().unwrap();
        let output = orchestrator(ScriptMuxer::unavailable(), 1024, dir.path())
            .execute(DownloadPlan::Direct(format), CancellationToken::new())
            .await
            .unwrap();

        let mut stream = output.stream;
        let err = stream.read_to_end(&mut Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("404"));
    }

    #[tokio::test]
    async fn test_ciphered_format_rejected() {
        let mut format = make_format(22, FormatKind::Combined, "mp4", String::new(), 10, 96_000);
        format.url = None;

        let dir = tempfile::tempdir().unwrap();
        let err = orchestrator(ScriptMuxer::unavailable(), 1024, dir.path())
            .execute(DownloadPlan::Direct(format), CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Decode(_)));
    }

    #[tokio::test]
    async fn test_muxed_plan_requires_muxer() {
        let audio = make_format(140, FormatKind::Audio, "m4a", "http://a".into(), 10, 128_000);
        let video = make_format(137, FormatKind::Video, "mp4", "http://v".into(), 10, 1);

        let dir = tempfile::tempdir().unwrap();
        let err = orchestrator(ScriptMuxer::unavailable(), 1024, dir.path())
            .execute(DownloadPlan::Muxed { audio, video }, CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::ToolNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_muxed_path_streams_and_sums_length() {
        let audio_body = patterned(1000);
        let video_body: Vec<u8> = patterned(5000).into_iter().rev().collect();
        let server = RangeServer::start(vec![
            ("/audio", audio_body.clone()),
            ("/video", video_body.clone()),
        ])
        .await;
        let catalog = FormatCatalog::from(vec![
            make_format(140, FormatKind::Audio, "m4a", server.url("/audio"), 1000, 128_000),
            make_format(137, FormatKind::Video, "mp4", server.url("/video"), 5000, 4_000_000),
        ]);

        let muxer = ScriptMuxer::new(CONCAT);
        let dir = tempfile::tempdir().unwrap();
        let options = DownloadOptions {
            quality: crate::downloader::models::Quality::Best,
            ..DownloadOptions::default()
        };
        let output = orchestrator(muxer.clone(), 512, dir.path())
            .acquire(&catalog, &options, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.extension, "mkv");
        assert_eq!(output.stream.size(), Some(6000));

        let mut bytes = Vec::new();
        let mut stream = output.stream;
        stream.read_to_end(&mut bytes).await.unwrap();

        let mut expected = audio_body;
        expected.extend_from_slice(&video_body);
        assert_eq!(bytes, expected);
        assert_eq!(muxer.spawns(), 1);

        let audio_path = muxer.last_audio();
        assert!(audio_path.starts_with(dir.path()));
        assert!(audio_path.to_string_lossy().ends_with(".m4a"));
        assert!(!audio_path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unknown_leg_length_reports_unknown() {
        let server = RangeServer::start(vec![
            ("/audio", patterned(10)),
            ("/video", patterned(20)),
        ])
        .await;
        let audio = make_format(140, FormatKind::Audio, "m4a", server.url("/audio"), 10, 128_000);
        let mut video = make_format(137, FormatKind::Video, "mp4", server.url("/video"), 20, 1);
        video.content_length = None;

        let dir = tempfile::tempdir().unwrap();
        let output = orchestrator(ScriptMuxer::new(CONCAT), 1024, dir.path())
            .execute(DownloadPlan::Muxed { audio, video }, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(output.stream.size(), None);
        let mut stream = output.stream;
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes).await.unwrap();
        assert_eq!(bytes.len(), 30);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_muxer_failure_is_terminal_error() {
        let server = RangeServer::start(vec![
            ("/audio", patterned(100)),
            ("/video", patterned(100)),
        ])
        .await;
        let audio = make_format(140, FormatKind::Audio, "m4a", server.url("/audio"), 100, 128_000);
        let video = make_format(137, FormatKind::Video, "mp4", server.url("/video"), 100, 1);

        let muxer = ScriptMuxer::new("cat >/dev/null; echo boom >&2; exit 3");
        let dir = tempfile::tempdir().unwrap();
        let output = orchestrator(muxer.clone(), 1024, dir.path())
            .execute(DownloadPlan::Muxed { audio, video }, CancellationToken::new())
            .await
            .unwrap();

        let mut stream = output.stream;
        let err = stream.read_to_end(&mut Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert!(!muxer.last_audio().exists());
    }

    #[tokio::test]
    async fn test_stderr_tail_survives_invalid_utf8() {
        let mut raw = b"first\n\xff\xfe garbled\r\n".to_vec();
        for i in 0..STDERR_TAIL {
            raw.extend_from_slice(format!("line {}\n", i).as_bytes());
        }
        raw.extend_from_slice(b"no newline");

        let tail = drain_stderr(&raw[..]).await;
        assert_eq!(tail.len(), STDERR_TAIL);
        assert_eq!(tail[0], "line 1");
        assert_eq!(tail[STDERR_TAIL - 1], "no newline");

        let tail = drain_stderr(&b"\xff\nafter\n"[..]).await;
        assert_eq!(tail, vec!["\u{fffd}".to_string(), "after".to_string()]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_muxer_error_after_binary_stderr() {
        let server = RangeServer::start(vec![
            ("/audio", patterned(100)),
            ("/video", patterned(100)),
        ])
        .await;
        let audio = make_format(140, FormatKind::Audio, "m4a", server.url("/audio"), 100, 128_000);
        let video = make_format(137, FormatKind::Video, "mp4", server.url("/video"), 100, 1);

        let muxer = ScriptMuxer::new(r"cat >/dev/null; printf '\377\376\n' >&2; echo boom >&2; exit 3");
        let dir = tempfile::tempdir().unwrap();
        let output = orchestrator(muxer, 1024, dir.path())
            .execute(DownloadPlan::Muxed { audio, video }, CancellationToken::new())
            .await
            .unwrap();

        let mut stream = output.stream;
        let err = stream.read_to_end(&mut Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_video_leg_failure_is_terminal_error() {
        let server = RangeServer::start(vec![("/audio", patterned(100))]).await;
        let audio = make_format(140, FormatKind::Audio, "m4a", server.url("/audio"), 100, 128_000);
        let video = make_format(137, FormatKind::Video, "mp4", server.url("/missing"), 100, 1);

        let muxer = ScriptMuxer::new(CONCAT);
        let dir = tempfile::tempdir().unwrap();
        let output = orchestrator(muxer.clone(), 1024, dir.path())
            .execute(DownloadPlan::Muxed { audio, video }, CancellationToken::new())
            .await
            .unwrap();

        let mut stream = output.stream;
        let err = stream.read_to_end(&mut Vec::new()).await.unwrap_err();
        assert!(err.to_string().contains("404"));
        assert!(!muxer.last_audio().exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_audio_leg_failure_spawns_nothing() {
        let server = RangeServer::start(vec![("/video", patterned(100))]).await;
        let audio = make_format(140, FormatKind::Audio, "m4a", server.url("/missing"), 100, 128_000);
        let video = make_format(137, FormatKind::Video, "mp4", server.url("/video"), 100, 1);

        let muxer = ScriptMuxer::new(CONCAT);
        let dir = tempfile::tempdir().unwrap();
        let err = orchestrator(muxer.clone(), 1024, dir.path())
            .execute(DownloadPlan::Muxed { audio, video }, CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DownloadError::HttpStatus { .. }));
        assert_eq!(muxer.spawns(), 0);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_early_drop_kills_muxer_and_cleans_up() {
        let server = RangeServer::start(vec![
            ("/audio", patterned(4096)),
            ("/video", patterned(4 * 1024 * 1024)),
        ])
        .await;
        let audio = make_format(140, FormatKind::Audio, "m4a", server.url("/audio"), 4096, 128_000);
        let video = make_format(
            137,
            FormatKind::Video,
            "mp4",
            server.url("/video"),
            4 * 1024 * 1024,
            1,
        );

        let muxer = ScriptMuxer::new(CONCAT);
        let dir = tempfile::tempdir().unwrap();
        let output = orchestrator(muxer.clone(), 16 * 1024, dir.path())
            .execute(DownloadPlan::Muxed { audio, video }, CancellationToken::new())
            .await
            .unwrap();

        let mut stream = output.stream;
        let mut head = [0u8; 1024];
        stream.read_exact(&mut head).await.unwrap();
        drop(stream);

        wait_removed(&muxer.last_audio()).await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancel_token_stops_muxed_download() {
        let server = RangeServer::start(vec![
            ("/audio", patterned(4096)),
            ("/video", patterned(4 * 1024 * 1024)),
        ])
        .await;
        let audio = make_format(140, FormatKind::Audio, "m4a", server.url("/audio"), 4096, 128_000);
        let video = make_format(
            137,
            FormatKind::Video,
            "mp4",
            server.url("/video"),
            4 * 1024 * 1024,
            1,
        );

        let muxer = ScriptMuxer::new(CONCAT);
        let dir = tempfile::tempdir().unwrap();
        let cancel = CancellationToken::new();
        let output = orchestrator(muxer.clone(), 16 * 1024, dir.path())
            .execute(DownloadPlan::Muxed { audio, video }, cancel.clone())
            .await
            .unwrap();

        cancel.cancel();
        let mut stream = output.stream;
        let mut sink = Vec::new();
        let err = stream.read_to_end(&mut sink).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        assert!(!muxer.last_audio().exists());
    }
}
