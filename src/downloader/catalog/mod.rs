// FormatCatalog - uniform list of formats built from raw descriptors
//
// Each descriptor encoding adapts its entries into `RawEntry`; `normalize`
// is the single place where a canonical entry becomes a `Format`.
// Entries with a missing, non-numeric or non-positive itag are skipped.

mod itags;
mod player_response;
mod query;
mod schema;

use std::collections::HashSet;
use tracing::debug;

use super::models::{Format, FormatKind};

use itags::MimeType;
pub use schema::{RawDescriptor, RawEntry};

/// Insertion-ordered formats for one request. Order breaks selection ties.
#[derive(Debug, Clone, Default)]
pub struct FormatCatalog {
    formats: Vec<Format>,
}

impl FormatCatalog {
    /// Build a catalog from descriptors, preserving source order.
    /// The first occurrence of an itag wins.
    pub fn from_descriptors(descriptors: &[RawDescriptor]) -> Self {
        let mut seen = HashSet::new();
        let mut formats = Vec::new();

        for entry in descriptors.iter().flat_map(RawDescriptor::entries) {
            let Some(format) = normalize(entry) else {
                continue;
            };
            if !seen.insert(format.itag) {
                debug!("duplicate itag {} skipped", format.itag);
                continue;
            }
            formats.push(format);
        }

        Self { formats }
    }

    pub fn formats(&self) -> &[Format] {
        &self.formats
    }

    pub fn iter(&self) -> impl Iterator<Item = &Format> {
        self.formats.iter()
    }

    pub fn get(&self, itag: u32) -> Option<&Format> {
        self.formats.iter().find(|f| f.itag == itag)
    }

    pub fn len(&self) -> usize {
        self.formats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.formats.is_empty()
    }
}

impl From<Vec<Format>> for FormatCatalog {
    fn from(formats: Vec<Format>) -> Self {
        Self { formats }
    }
}

fn parse_itag(raw: Option<&str>) -> Option<u32> {
    let itag: i64 = raw?.trim().parse().ok()?;
    u32::try_from(itag).ok().filter(|&i| i > 0)
}

/// Turn one canonical entry into a `Format`, or `None` if it must be skipped
pub fn normalize(entry: RawEntry) -> Option<Format> {
    let Some(itag) = parse_itag(entry.itag.as_deref()) else {
        debug!("skipping descriptor entry with invalid itag {:?}", entry.itag);
        return None;
    };

    let known = itags::lookup(itag);
    let mime = entry.mime_type.as_deref().and_then(MimeType::parse);

    let kind = mime
        .as_ref()
        .and_then(MimeType::kind)
        .or(known.map(|k| k.kind))
        .unwrap_or(FormatKind::Unknown);
    if kind == FormatKind::Unknown {
        debug!("itag {} carries no recognizable encoding", itag);
    }

    let extension = mime
        .as_ref()
        .map(|m| m.extension(kind))
        .or(known.map(|k| k.extension.to_string()))
        .unwrap_or_else(|| "mp4".to_string());

    let resolution = entry
        .resolution
        .filter(|r| !r.is_empty())
        .or(known.map(|k| k.resolution.to_string()))
        .unwrap_or_default();

    let bitrate = entry
        .bitrate
        .as_deref()
        .and_then(|b| b.trim().parse().ok())
        .unwrap_or(0);

    let audio_bitrate = match kind {
        FormatKind::Video | FormatKind::Unknown => 0,
        _ => known.map(|k| k.audio_kbps * 1000).unwrap_or(0),
    };

    let rtmp = entry
        .conn
        .as_deref()
        .map_or(false, |conn| conn.starts_with("rtmp"));

    if entry.ciphered {
        debug!("itag {} only has an encrypted signature", itag);
    }

    Some(Format {
        itag,
        kind,
        extension,
        bitrate,
        audio_bitrate,
        resolution,
        content_length: entry
            .content_length
            .as_deref()
            .and_then(|c| c.trim().parse().ok()),
        url: entry.url,
        attributes: entry.attributes,
        rtmp,
    })
}
