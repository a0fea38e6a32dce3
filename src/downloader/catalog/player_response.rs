// Player response JSON descriptors (`streamingData`)

use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::debug;

use super::schema::RawEntry;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamingData {
    #[serde(default)]
    formats: Vec<Value>,
    #[serde(default)]
    adaptive_formats: Vec<Value>,
}

/// Adaptive formats first, then progressive, matching the legacy order
pub fn entries(json: &Value) -> Vec<RawEntry> {
    let Some(streaming) = json.get("streamingData") else {
        debug!("player response carries no streamingData");
        return Vec::new();
    };

    let data: StreamingData = match serde_json::from_value(streaming.clone()) {
        Ok(data) => data,
        Err(e) => {
            debug!("malformed streamingData: {}", e);
            return Vec::new();
        }
    };

    data.adaptive_formats
        .iter()
        .chain(data.formats.iter())
        .filter_map(adapt)
        .collect()
}

fn adapt(value: &Value) -> Option<RawEntry> {
    let object = value.as_object()?;

    let attributes: HashMap<String, String> = object
        .iter()
        .filter_map(|(key, v)| scalar(v).map(|s| (key.clone(), s)))
        .collect();
    let get = |key: &str| attributes.get(key).cloned();

    let ciphered = get("url").is_none()
        && (object.contains_key("signatureCipher") || object.contains_key("cipher"));

    Some(RawEntry {
        itag: get("itag"),
        url: get("url"),
        mime_type: get("mimeType"),
        bitrate: get("bitrate"),
        content_length: get("contentLength"),
        resolution: get("qualityLabel"),
        conn: get("conn"),
        ciphered,
        attributes,
    })
}

/// Numbers and strings become attribute values; nested values are dropped
fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
