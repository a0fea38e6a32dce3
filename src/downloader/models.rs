// Common data models for the acquisition pipeline

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use super::errors::{DownloadError, Result};

/// What a format carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormatKind {
    /// Video track only (adaptive)
    Video,
    /// Audio track only (adaptive)
    Audio,
    /// Both tracks in one stream (progressive)
    Combined,
    /// No recognizable encoding; never selected
    Unknown,
}

/// One downloadable variant of an item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Format {
    /// Numeric identifier, unique within one catalog
    pub itag: u32,
    pub kind: FormatKind,
    /// Container extension (mp4, webm, m4a)
    pub extension: String,
    /// Bits per second, 0 when unknown
    pub bitrate: u64,
    /// Audio bits per second for formats carrying audio, 0 when unknown
    pub audio_bitrate: u64,
    /// Free-form label such as "720p", may be empty
    pub resolution: String,
    /// Declared content length in bytes
    pub content_length: Option<u64>,
    /// Direct media URL; absent when only an encrypted signature was given
    pub url: Option<String>,
    /// Raw attributes as they appeared in the descriptor
    pub attributes: HashMap<String, String>,
    /// Served over RTMP, never selected
    pub rtmp: bool,
}

impl Format {
    pub fn is_video_only(&self) -> bool {
        self.kind == FormatKind::Video
    }

    pub fn is_audio_only(&self) -> bool {
        self.kind == FormatKind::Audio
    }

    pub fn is_combined(&self) -> bool {
        self.kind == FormatKind::Combined
    }

    /// Bitrate parsed from the raw `bitrate` attribute, if one was declared
    pub fn declared_bitrate(&self) -> Option<u64> {
        self.attributes.get("bitrate")?.trim().parse().ok()
    }

    /// Best available figure for the audio track's quality
    pub fn audio_quality(&self) -> u64 {
        if self.audio_bitrate > 0 {
            self.audio_bitrate
        } else {
            self.bitrate
        }
    }
}

/// Video quality tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Best,
    #[default]
    Medium,
    Worst,
}

impl FromStr for Quality {
    type Err = DownloadError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "best" => Ok(Self::Best),
            "medium" => Ok(Self::Medium),
            "worst" => Ok(Self::Worst),
            other => Err(DownloadError::InvalidOption {
                option: "quality",
                value: other.to_string(),
            }),
        }
    }
}

/// Options chosen by the user for one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    pub quality: Quality,
    pub use_ffmpeg: bool,
    pub only_audio: bool,
}

impl Default for DownloadOptions {
    fn default() -> Self {
        Self {
            quality: Quality::Medium,
            use_ffmpeg: true,
            only_audio: false,
        }
    }
}

impl DownloadOptions {
    /// Parse the `quality` / `useFfmpeg` / `onlyAudio` option map.
    /// Missing keys keep their defaults.
    pub fn from_map(options: &HashMap<String, String>) -> Result<Self> {
        let mut parsed = Self::default();

        if let Some(quality) = options.get("quality") {
            parsed.quality = quality.parse()?;
        }
        if let Some(value) = options.get("useFfmpeg") {
            parsed.use_ffmpeg = parse_flag("useFfmpeg", value)?;
        }
        if let Some(value) = options.get("onlyAudio") {
            parsed.only_audio = parse_flag("onlyAudio", value)?;
        }

        Ok(parsed)
    }

    /// Combine user options with the muxer probe result
    pub fn policy(&self, muxer_available: bool) -> SelectionPolicy {
        SelectionPolicy {
            quality: self.quality,
            only_audio: self.only_audio,
            allow_mux: self.use_ffmpeg && muxer_available,
        }
    }
}

fn parse_flag(option: &'static str, value: &str) -> Result<bool> {
    match value {
        "yes" => Ok(true),
        "no" => Ok(false),
        other => Err(DownloadError::InvalidOption {
            option,
            value: other.to_string(),
        }),
    }
}

/// Selection policy for one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionPolicy {
    pub quality: Quality,
    pub only_audio: bool,
    /// Muxer is present and the user did not opt out
    pub allow_mux: bool,
}

/// What to fetch for one request, fixed once derived
#[derive(Debug, Clone, PartialEq)]
pub enum DownloadPlan {
    /// One stream fetched as-is (combined, or audio-only)
    Direct(Format),
    /// Separate legs combined by the muxer
    Muxed { audio: Format, video: Format },
}

impl DownloadPlan {
    pub fn needs_muxer(&self) -> bool {
        matches!(self, Self::Muxed { .. })
    }
}

pub const DEFAULT_CHUNK_SIZE: u64 = 0xFFFFF;

/// Pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Bytes requested per range request
    pub chunk_size: u64,
    /// Connect timeout, and the longest a transfer may stall, in seconds.
    /// Not a deadline for a whole download.
    pub timeout_seconds: u64,
    /// HTTP or SOCKS5 proxy URL (e.g., "socks5://127.0.0.1:1080")
    pub proxy: Option<String>,
    pub user_agent: Option<String>,
    /// Container passed to the muxer's `-f`
    pub muxer_container: String,
    /// Where the temporary audio file is created
    pub temp_dir: Option<PathBuf>,
    /// Attempts for metadata fetches
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout_seconds: 30,
            proxy: None,
            user_agent: None,
            muxer_container: "matroska".to_string(),
            temp_dir: None,
            retry_attempts: 4,
            retry_delay_ms: 500,
        }
    }
}

impl DownloaderConfig {
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    pub fn with_proxy(mut self, proxy: Option<String>) -> Self {
        self.proxy = proxy;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_user_agent(mut self, user_agent: Option<String>) -> Self {
        self.user_agent = user_agent;
        self
    }

    pub fn with_temp_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.temp_dir = dir;
        self
    }

    pub fn with_retry(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.retry_attempts = attempts;
        self.retry_delay_ms = delay_ms;
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    /// File extension matching `muxer_container`
    pub fn muxed_extension(&self) -> &str {
        match self.muxer_container.as_str() {
            "matroska" => "mkv",
            "mp4" => "mp4",
            "webm" => "webm",
            other => other,
        }
    }

    /// Build the HTTP client shared by all legs of a request
    pub fn build_client(&self) -> Result<reqwest::Client> {
        // No whole-request deadline; the fetcher bounds stalls per read
        let mut builder = reqwest::Client::builder().connect_timeout(self.request_timeout());

        if let Some(proxy_url) = self.proxy.as_deref() {
            builder = builder.proxy(reqwest::Proxy::all(proxy_url)?);
        }
        if let Some(agent) = self.user_agent.as_deref() {
            builder = builder.user_agent(agent);
        }

        Ok(builder.build()?)
    }
}
