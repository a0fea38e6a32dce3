// YouTube service - watch page config extraction and adaptive downloads
//
// The watch page embeds `ytplayer.config`, whose `args` carry the format
// descriptors in up to three encodings. The whole config blob travels in the
// item's `_ytConfig` meta entry and is decoded again at download time.

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::downloader::catalog::{FormatCatalog, RawDescriptor};
use crate::downloader::errors::{DownloadError, Result};
use crate::downloader::fetcher::ChunkedFetcher;
use crate::downloader::models::{DownloadOptions, DownloaderConfig};
use crate::downloader::remux::RemuxOrchestrator;
use crate::downloader::stream::DownloadOutput;
use crate::downloader::tools::Muxer;
use crate::downloader::traits::{Item, ItemPages, Page, PageSource, Service};
use crate::downloader::utils::retry;

lazy_static! {
    static ref PLAYER_CONFIG_RE: Regex =
        Regex::new(r"ytplayer\.config = (.*?);ytplayer\.load = function\(\)").unwrap();
}

/// Meta key holding the raw player config
pub const CONFIG_META_KEY: &str = "_ytConfig";

/// Partial `ytplayer.config`
#[derive(Debug, Default, Deserialize)]
struct PlayerConfig {
    #[serde(default)]
    args: PlayerArgs,
}

#[derive(Debug, Default, Deserialize)]
struct PlayerArgs {
    adaptive_fmts: Option<String>,
    url_encoded_fmt_stream_map: Option<String>,
    /// JSON document encoded as a string
    player_response: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoDetails {
    #[serde(default)]
    title: String,
    #[serde(default)]
    author: String,
}

impl PlayerConfig {
    fn parse(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| DownloadError::Decode(format!("player config: {}", e)))
    }

    fn player_response(&self) -> Option<serde_json::Value> {
        let raw = self.args.player_response.as_deref()?;
        match serde_json::from_str(raw) {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("unreadable player_response: {}", e);
                None
            }
        }
    }

    /// Adaptive formats first, then progressive, then the JSON response
    fn descriptors(&self) -> Vec<RawDescriptor> {
        let mut descriptors: Vec<RawDescriptor> = [
            &self.args.adaptive_fmts,
            &self.args.url_encoded_fmt_stream_map,
        ]
        .into_iter()
        .flatten()
        .map(|raw| RawDescriptor::QueryString(raw.clone()))
        .collect();

        if let Some(response) = self.player_response() {
            descriptors.push(RawDescriptor::PlayerResponse(response));
        }
        descriptors
    }

    fn video_details(&self) -> VideoDetails {
        self.player_response()
            .and_then(|response| response.get("videoDetails").cloned())
            .and_then(|details| serde_json::from_value(details).ok())
            .unwrap_or_default()
    }
}

/// youtube.com / youtu.be video downloads
pub struct YouTube {
    client: reqwest::Client,
    orchestrator: RemuxOrchestrator,
    retry_attempts: u32,
    retry_delay: Duration,
    page_timeout: Duration,
}

impl YouTube {
    pub fn new(config: &DownloaderConfig, muxer: Arc<dyn Muxer>) -> Result<Self> {
        let client = config.build_client()?;
        let fetcher = ChunkedFetcher::from_config(client.clone(), config);

        Ok(Self {
            client,
            orchestrator: RemuxOrchestrator::with_fetcher(fetcher, muxer, config),
            retry_attempts: config.retry_attempts,
            retry_delay: config.retry_delay(),
            page_timeout: config.request_timeout(),
        })
    }

    pub fn default_options() -> HashMap<String, String> {
        [("quality", "medium"), ("useFfmpeg", "yes"), ("onlyAudio", "no")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    pub fn available_options() -> HashMap<String, Vec<String>> {
        [
            ("quality", vec!["best", "medium", "worst"]),
            ("useFfmpeg", vec!["yes", "no"]),
            ("onlyAudio", vec!["yes", "no"]),
        ]
        .into_iter()
        .map(|(k, values)| (k.to_string(), values.into_iter().map(String::from).collect()))
        .collect()
    }
}

#[async_trait]
impl Service for YouTube {
    fn name(&self) -> &'static str {
        "youtube"
    }

    fn is_valid_target(&self, target: &str) -> bool {
        target.contains("youtube.com/") || target.contains("youtu.be/")
    }

    fn fetch_items(&self, target: &str) -> Result<ItemPages> {
        Ok(ItemPages::new(WatchPage {
            client: self.client.clone(),
            url: target.to_string(),
            attempts: self.retry_attempts,
            delay: self.retry_delay,
            timeout: self.page_timeout,
        }))
    }

    async fn download(
        &self,
        meta: &HashMap<String, String>,
        options: &HashMap<String, String>,
        cancel: CancellationToken,
    ) -> Result<DownloadOutput> {
        let raw = meta
            .get(CONFIG_META_KEY)
            .ok_or(DownloadError::MissingMeta(CONFIG_META_KEY))?;
        let options = DownloadOptions::from_map(options)?;

        let config = PlayerConfig::parse(raw)?;
        let catalog = FormatCatalog::from_descriptors(&config.descriptors());
        info!(
            "{} formats for \"{}\"",
            catalog.len(),
            config.video_details().title
        );

        self.orchestrator.acquire(&catalog, &options, cancel).await
    }
}

/// The single page of a watch URL
struct WatchPage {
    client: reqwest::Client,
    url: String,
    attempts: u32,
    delay: Duration,
    /// Deadline for one whole page fetch
    timeout: Duration,
}

impl WatchPage {
    async fn fetch_html(&self) -> Result<String> {
        tokio::time::timeout(self.timeout, self.fetch_once())
            .await
            .map_err(|_| {
                io::Error::new(
                    io::ErrorKind::TimedOut,
                    format!("watch page not fetched within {:?}", self.timeout),
                )
            })?
    }

    async fn fetch_once(&self) -> Result<String> {
        let response = self.client.get(&self.url).send().await?;
        if response.status() != StatusCode::OK {
            return Err(DownloadError::status(response.status(), &self.url));
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl PageSource for WatchPage {
    async fn fetch_page(&mut self, _index: usize) -> Result<Page> {
        let this = &*self;
        let html = retry(this.attempts, this.delay, "watch page fetch", || {
            this.fetch_html()
        })
        .await?;

        // TODO: playlist and channel pages yield more than the main video
        Ok(Page {
            items: vec![item_from_page(&html)?],
            last: true,
        })
    }
}

fn item_from_page(html: &str) -> Result<Item> {
    let raw = PLAYER_CONFIG_RE
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .ok_or_else(|| DownloadError::Decode("couldn't match youtube's player config".into()))?;

    let details = PlayerConfig::parse(raw)?.video_details();

    let meta = [
        ("title", details.title),
        ("author", details.author),
        ("ext", "mkv".to_string()),
        (CONFIG_META_KEY, raw.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect();

    Ok(Item {
        meta,
        default_name: "%[title].%[ext]".to_string(),
        available_options: YouTube::available_options(),
        default_options: YouTube::default_options(),
    })
}
