// Service trait definition and lazy item paging

use async_trait::async_trait;
use futures::Stream;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use super::errors::Result;
use super::stream::DownloadOutput;

/// One downloadable thing found at a target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    /// Opaque per-service data handed back to `Service::download`
    pub meta: HashMap<String, String>,
    /// Name template, e.g. `%[title].%[ext]`
    pub default_name: String,
    pub available_options: HashMap<String, Vec<String>>,
    pub default_options: HashMap<String, String>,
}

/// One page produced by a `PageSource`
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub items: Vec<Item>,
    /// No page follows this one
    pub last: bool,
}

/// Fetches pages of items for one target
#[async_trait]
pub trait PageSource: Send {
    async fn fetch_page(&mut self, index: usize) -> Result<Page>;
}

/// Finite, non-restartable sequence of item pages.
/// Each `next_page` performs at most one fetch; an error ends the sequence.
pub struct ItemPages {
    source: Box<dyn PageSource>,
    index: usize,
    ended: bool,
}

impl ItemPages {
    pub fn new(source: impl PageSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            index: 0,
            ended: false,
        }
    }

    pub fn has_ended(&self) -> bool {
        self.ended
    }

    /// `None` once the sequence has ended
    pub async fn next_page(&mut self) -> Option<Result<Vec<Item>>> {
        if self.ended {
            return None;
        }

        match self.source.fetch_page(self.index).await {
            Ok(page) => {
                self.index += 1;
                self.ended = page.last;
                Some(Ok(page.items))
            }
            Err(e) => {
                self.ended = true;
                Some(Err(e))
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = Result<Vec<Item>>> + Send {
        futures::stream::unfold(self, |mut pages| async move {
            let page = pages.next_page().await?;
            Some((page, pages))
        })
    }
}

/// A source of downloadable items (one per site)
#[async_trait]
pub trait Service: Send + Sync {
    /// Name of the service (for logging)
    fn name(&self) -> &'static str;

    fn is_valid_target(&self, target: &str) -> bool;

    /// Items found at `target`. Nothing is fetched until the first page is requested.
    fn fetch_items(&self, target: &str) -> Result<ItemPages>;

    /// Start downloading one item with the given option map
    async fn download(
        &self,
        meta: &HashMap<String, String>,
        options: &HashMap<String, String>,
        cancel: CancellationToken,
    ) -> Result<DownloadOutput>;
}
