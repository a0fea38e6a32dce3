// Legacy query-string descriptors

use std::collections::HashMap;
use url::Url;

use super::schema::RawEntry;

/// Split a comma-separated stream map into canonical entries
pub fn entries(raw: &str) -> Vec<RawEntry> {
    raw.split(',')
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .map(parse_fragment)
        .collect()
}

fn parse_fragment(fragment: &str) -> RawEntry {
    let mut attributes = HashMap::new();
    for (key, value) in url::form_urlencoded::parse(fragment.as_bytes()) {
        // Repeated keys keep their first value
        attributes
            .entry(key.into_owned())
            .or_insert_with(|| value.into_owned());
    }

    let get = |key: &str| attributes.get(key).cloned();
    let ciphered = attributes.contains_key("s") && !attributes.contains_key("sig");
    let url = if ciphered {
        None
    } else {
        get("url").map(|url| match attributes.get("sig") {
            Some(sig) => with_signature(&url, sig),
            None => url,
        })
    };

    RawEntry {
        itag: get("itag"),
        url,
        mime_type: get("type").or_else(|| get("mimeType")),
        bitrate: get("bitrate"),
        content_length: get("clen"),
        resolution: get("quality_label")
            .or_else(|| get("resolution"))
            .or_else(|| get("quality").map(|q| quality_label(&q))),
        conn: get("conn"),
        ciphered,
        attributes,
    }
}

/// Resolution label for a legacy `quality` name such as `hd720`
fn quality_label(quality: &str) -> String {
    let label = match quality {
        "hd2160" => "2160p",
        "hd1440" => "1440p",
        "hd1080" => "1080p",
        "hd720" => "720p",
        "large" => "480p",
        "medium" => "360p",
        "small" => "240p",
        "tiny" => "144p",
        other => other,
    };
    label.to_string()
}

fn with_signature(raw_url: &str, sig: &str) -> String {
    match Url::parse(raw_url) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("signature", sig);
            url.to_string()
        }
        Err(_) => raw_url.to_string(),
    }
}
