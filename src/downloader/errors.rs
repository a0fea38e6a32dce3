// Error types for the acquisition pipeline

use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    /// Transport failure on any request
    #[error("HTTP request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    /// Server answered with a status the leg cannot use
    #[error("request failed with HTTP {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },

    /// A whole document (not a single entry) could not be decoded
    #[error("decode error: {0}")]
    Decode(String),

    /// No format satisfies the requested policy
    #[error("no {leg} format satisfies the requested policy")]
    Selection { leg: &'static str },

    /// Muxer exited unsuccessfully or could not be driven
    #[error("muxer failed ({status}): {stderr}")]
    Subprocess { status: String, stderr: String },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    #[error("invalid value `{value}` for option `{option}`")]
    InvalidOption { option: &'static str, value: String },

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("missing metadata field `{0}`")]
    MissingMeta(&'static str),

    #[error("no service accepts target `{0}`")]
    UnsupportedTarget(String),

    #[error("download cancelled")]
    Cancelled,
}

impl DownloadError {
    pub fn status(status: StatusCode, url: &str) -> Self {
        Self::HttpStatus {
            status,
            url: url.to_string(),
        }
    }
}

// Readers of the output stream see terminal pipeline failures as read errors
impl From<DownloadError> for std::io::Error {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::Io { source } => source,
            other => std::io::Error::other(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, DownloadError>;
