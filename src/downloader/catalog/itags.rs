// Well-known itags and MIME/codec classification

use lazy_static::lazy_static;
use regex::Regex;

use crate::downloader::models::FormatKind;

/// Static facts about a well-known itag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItagInfo {
    pub kind: FormatKind,
    pub extension: &'static str,
    pub resolution: &'static str,
    /// Audio bitrate in kbps, 0 for video-only
    pub audio_kbps: u64,
}

const fn info(
    kind: FormatKind,
    extension: &'static str,
    resolution: &'static str,
    audio_kbps: u64,
) -> ItagInfo {
    ItagInfo {
        kind,
        extension,
        resolution,
        audio_kbps,
    }
}

use FormatKind::{Audio, Combined, Video};

/// Look up a well-known itag. Used when the descriptor omits its MIME type.
pub fn lookup(itag: u32) -> Option<ItagInfo> {
    let found = match itag {
        // Progressive
        5 => info(Combined, "flv", "240p", 64),
        17 => info(Combined, "3gp", "144p", 24),
        18 => info(Combined, "mp4", "360p", 96),
        22 => info(Combined, "mp4", "720p", 192),
        36 => info(Combined, "3gp", "240p", 36),
        43 => info(Combined, "webm", "360p", 128),
        // Adaptive H.264
        133 => info(Video, "mp4", "240p", 0),
        134 => info(Video, "mp4", "360p", 0),
        135 => info(Video, "mp4", "480p", 0),
        136 => info(Video, "mp4", "720p", 0),
        137 => info(Video, "mp4", "1080p", 0),
        138 => info(Video, "mp4", "2160p", 0),
        160 => info(Video, "mp4", "144p", 0),
        264 => info(Video, "mp4", "1440p", 0),
        298 => info(Video, "mp4", "720p", 0),
        299 => info(Video, "mp4", "1080p", 0),
        // Adaptive VP9
        242 => info(Video, "webm", "240p", 0),
        243 => info(Video, "webm", "360p", 0),
        244 => info(Video, "webm", "480p", 0),
        247 => info(Video, "webm", "720p", 0),
        248 => info(Video, "webm", "1080p", 0),
        271 => info(Video, "webm", "1440p", 0),
        278 => info(Video, "webm", "144p", 0),
        302 => info(Video, "webm", "720p", 0),
        303 => info(Video, "webm", "1080p", 0),
        313 => info(Video, "webm", "2160p", 0),
        // Adaptive audio
        139 => info(Audio, "m4a", "", 48),
        140 => info(Audio, "m4a", "", 128),
        141 => info(Audio, "m4a", "", 256),
        171 => info(Audio, "webm", "", 128),
        172 => info(Audio, "webm", "", 192),
        249 => info(Audio, "webm", "", 50),
        250 => info(Audio, "webm", "", 70),
        251 => info(Audio, "webm", "", 160),
        _ => return None,
    };
    Some(found)
}

const VIDEO_CODECS: &[&str] = &["avc1", "av01", "vp8", "vp9", "vp09", "hev1", "hvc1", "mp4v"];
const AUDIO_CODECS: &[&str] = &["mp4a", "opus", "vorbis", "ac-3", "ec-3", "flac"];

lazy_static! {
    static ref CODECS_RE: Regex = Regex::new(r#"codecs\s*=\s*"?([^";]*)"?"#).unwrap();
}

/// Parsed `type` / `mimeType` value, e.g. `video/mp4; codecs="avc1.64001F, mp4a.40.2"`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MimeType {
    pub major: String,
    pub subtype: String,
    pub codecs: Vec<String>,
}

impl MimeType {
    pub fn parse(raw: &str) -> Option<Self> {
        let essence = raw.split(';').next()?.trim();
        let (major, subtype) = essence.split_once('/')?;
        if major.is_empty() || subtype.is_empty() {
            return None;
        }

        let codecs = CODECS_RE
            .captures(raw)
            .and_then(|caps| caps.get(1))
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(|c| c.trim().to_ascii_lowercase())
                    .filter(|c| !c.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            major: major.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            codecs,
        })
    }

    fn has_codec(&self, known: &[&str]) -> bool {
        self.codecs
            .iter()
            .any(|c| known.iter().any(|k| c.starts_with(k)))
    }

    /// Kind implied by the codec list; `None` when the codecs are not listed
    pub fn kind(&self) -> Option<FormatKind> {
        if self.codecs.is_empty() {
            return match self.major.as_str() {
                "audio" => Some(Audio),
                _ => None,
            };
        }

        match (self.has_codec(VIDEO_CODECS), self.has_codec(AUDIO_CODECS)) {
            (true, true) => Some(Combined),
            (true, false) => Some(Video),
            (false, true) => Some(Audio),
            (false, false) => None,
        }
    }

    /// File extension for a stream of this type
    pub fn extension(&self, kind: FormatKind) -> String {
        match (self.subtype.as_str(), kind) {
            ("mp4", Audio) => "m4a".to_string(),
            ("3gpp", _) => "3gp".to_string(),
            ("x-flv", _) => "flv".to_string(),
            (subtype, _) => subtype.to_string(),
        }
    }
}
