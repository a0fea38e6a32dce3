// External tool discovery and the muxer process seam

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

use super::utils::run_output_with_timeout;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ToolType {
    Ffmpeg,
}

impl ToolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolType::Ffmpeg => "ffmpeg",
        }
    }

    /// Environment variable pointing at an explicit binary
    pub fn env_override(&self) -> &'static str {
        match self {
            ToolType::Ffmpeg => "FFMPEG_PATH",
        }
    }

    fn version_arg(&self) -> &'static str {
        match self {
            ToolType::Ffmpeg => "-version",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    pub tool_type: ToolType,
    pub version: Option<String>,
    pub path: Option<PathBuf>,
    pub is_available: bool,
}

const COMMON_DIRS: [&str; 3] = ["/opt/homebrew/bin", "/usr/local/bin", "/usr/bin"];

#[derive(Debug, Default)]
pub struct ToolManager;

impl ToolManager {
    pub fn new() -> Self {
        Self
    }

    /// Find a tool binary: env override, then PATH, then common install dirs
    pub fn locate(&self, tool_type: ToolType) -> Option<PathBuf> {
        let explicit = std::env::var_os(tool_type.env_override()).map(PathBuf::from);
        self.locate_with(tool_type, explicit)
    }

    fn locate_with(&self, tool_type: ToolType, explicit: Option<PathBuf>) -> Option<PathBuf> {
        let binary = tool_type.as_str();

        if let Some(path) = explicit {
            if path.is_file() {
                debug!("{} from {}: {}", binary, tool_type.env_override(), path.display());
                return Some(path);
            }
            warn!(
                "{} points to {} which is not a file, ignoring",
                tool_type.env_override(),
                path.display()
            );
        }

        if let Ok(path) = which::which(binary) {
            debug!("{} found on PATH: {}", binary, path.display());
            return Some(path);
        }

        COMMON_DIRS
            .iter()
            .map(|dir| Path::new(dir).join(binary))
            .find(|path| path.is_file())
    }

    pub async fn get_tool_info(&self, tool_type: ToolType) -> ToolInfo {
        let path = self.locate(tool_type);
        let version = match &path {
            Some(p) => self.get_version(p, tool_type).await,
            None => None,
        };

        ToolInfo {
            name: tool_type.as_str().to_string(),
            tool_type,
            version,
            is_available: path.is_some(),
            path,
        }
    }

    async fn get_version(&self, path: &Path, tool_type: ToolType) -> Option<String> {
        let output = run_output_with_timeout(
            &path.to_string_lossy(),
            vec![tool_type.version_arg().to_string()],
            10,
        )
        .await
        .ok()?;

        if !output.status.success() {
            return None;
        }
        // ffmpeg prints its version on the first line followed by build flags
        String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .map(|line| line.trim().to_string())
    }
}

/// External process combining an audio file and piped video into one container
pub trait Muxer: Send + Sync {
    fn name(&self) -> &str;

    /// Checked once per request; `false` selects the degraded path
    fn is_available(&self) -> bool;

    /// Command reading the finished `audio` file plus video on stdin, writing
    /// `container`-formatted bytes to stdout. Stdio is configured by the caller.
    fn command(&self, audio: &Path, container: &str) -> Command;
}

/// ffmpeg in codec-copy mode
#[derive(Debug, Clone)]
pub struct FfmpegMuxer {
    path: Option<PathBuf>,
}

impl FfmpegMuxer {
    pub fn detect() -> Self {
        let path = ToolManager::new().locate(ToolType::Ffmpeg);
        if path.is_none() {
            debug!("ffmpeg not found, muxed downloads disabled");
        }
        Self { path }
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Muxer for FfmpegMuxer {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn is_available(&self) -> bool {
        self.path.is_some()
    }

    fn command(&self, audio: &Path, container: &str) -> Command {
        let program = self
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from(ToolType::Ffmpeg.as_str()));

        let mut cmd = Command::new(program);
        cmd.args(["-hide_banner", "-loglevel", "error", "-i"])
            .arg(audio)
            .args(["-i", "-", "-c", "copy", "-f", container, "-"]);
        cmd
    }
}
