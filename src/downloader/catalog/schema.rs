// Descriptor encodings and the canonical entry they are adapted into

use std::collections::HashMap;

/// A raw format descriptor blob, tagged by the encoding it uses
#[derive(Debug, Clone)]
pub enum RawDescriptor {
    /// Comma-separated `key=value` fragments
    /// (`url_encoded_fmt_stream_map`, `adaptive_fmts`)
    QueryString(String),
    /// Player response JSON carrying `streamingData.{formats, adaptiveFormats}`
    PlayerResponse(serde_json::Value),
}

impl RawDescriptor {
    /// Adapt every entry of this descriptor into canonical form
    pub fn entries(&self) -> Vec<RawEntry> {
        match self {
            Self::QueryString(raw) => super::query::entries(raw),
            Self::PlayerResponse(json) => super::player_response::entries(json),
        }
    }
}

/// One descriptor entry with its fields mapped to canonical names.
/// Every encoding adapts into this shape; normalization into `Format`
/// happens in one place.
#[derive(Debug, Clone, Default)]
pub struct RawEntry {
    pub itag: Option<String>,
    pub url: Option<String>,
    pub mime_type: Option<String>,
    pub bitrate: Option<String>,
    pub content_length: Option<String>,
    pub resolution: Option<String>,
    pub conn: Option<String>,
    /// Only an encrypted signature was supplied
    pub ciphered: bool,
    pub attributes: HashMap<String, String>,
}
