// FormatSelector - quality/format selection over a catalog
//
// Handles:
// - Best audio (highest bitrate audio-only stream)
// - Best / worst video by declared bitrate
// - Medium video (1080p, 720p or 480p), falling back to best
// - Best combined stream for the no-muxer path
//
// Selection never errors on its own: a missing format is `None`, and only
// `plan` turns it into an explicit error for the caller.

use super::catalog::FormatCatalog;
use super::errors::{DownloadError, Result};
use super::models::{DownloadPlan, Format, Quality, SelectionPolicy};

/// Resolutions accepted by medium quality
const MEDIUM_RESOLUTIONS: [&str; 3] = ["1080p", "720p", "480p"];

/// Format selector with policy-driven quality detection
pub struct FormatSelector;

impl FormatSelector {
    /// Highest bitrate audio-only format
    pub fn best_audio(catalog: &FormatCatalog) -> Option<&Format> {
        Self::pick(
            Self::selectable(catalog)
                .filter(|f| f.is_audio_only())
                .map(|f| (f, f.audio_quality())),
            |candidate, current| candidate > current,
        )
    }

    /// Highest declared bitrate among video-only formats
    pub fn best_video(catalog: &FormatCatalog) -> Option<&Format> {
        Self::pick(Self::rated_video(catalog), |candidate, current| {
            candidate > current
        })
    }

    /// Lowest declared bitrate among video-only formats
    pub fn worst_video(catalog: &FormatCatalog) -> Option<&Format> {
        Self::pick(Self::rated_video(catalog), |candidate, current| {
            candidate < current
        })
    }

    /// Highest bitrate video-only format at 1080p, 720p or 480p.
    /// Does not fall back; see `video_for`.
    pub fn medium_video(catalog: &FormatCatalog) -> Option<&Format> {
        Self::pick(
            Self::rated_video(catalog)
                .filter(|(f, _)| MEDIUM_RESOLUTIONS.contains(&f.resolution.as_str())),
            |candidate, current| candidate > current,
        )
    }

    /// Combined format with the best audio track
    pub fn best_combined(catalog: &FormatCatalog) -> Option<&Format> {
        Self::pick(
            Self::selectable(catalog)
                .filter(|f| f.is_combined())
                .map(|f| (f, f.audio_quality())),
            |candidate, current| candidate > current,
        )
    }

    /// Video leg for a quality tier. Medium falls back to best when no
    /// entry has an allowed resolution.
    pub fn video_for(catalog: &FormatCatalog, quality: Quality) -> Option<&Format> {
        match quality {
            Quality::Best => Self::best_video(catalog),
            Quality::Medium => {
                Self::medium_video(catalog).or_else(|| Self::best_video(catalog))
            }
            Quality::Worst => Self::worst_video(catalog),
        }
    }

    /// Derive the download plan for a policy
    pub fn plan(catalog: &FormatCatalog, policy: &SelectionPolicy) -> Result<DownloadPlan> {
        if policy.only_audio {
            let audio = Self::best_audio(catalog).ok_or(DownloadError::Selection { leg: "audio" })?;
            return Ok(DownloadPlan::Direct(audio.clone()));
        }

        if !policy.allow_mux {
            let combined = Self::best_combined(catalog)
                .ok_or(DownloadError::Selection { leg: "combined" })?;
            return Ok(DownloadPlan::Direct(combined.clone()));
        }

        let audio = Self::best_audio(catalog).ok_or(DownloadError::Selection { leg: "audio" })?;
        let video = Self::video_for(catalog, policy.quality)
            .ok_or(DownloadError::Selection { leg: "video" })?;

        Ok(DownloadPlan::Muxed {
            audio: audio.clone(),
            video: video.clone(),
        })
    }

    fn selectable(catalog: &FormatCatalog) -> impl Iterator<Item = &Format> {
        catalog.iter().filter(|f| !f.rtmp)
    }

    /// Video-only formats that declare a parsable bitrate
    fn rated_video(catalog: &FormatCatalog) -> impl Iterator<Item = (&Format, u64)> {
        Self::selectable(catalog)
            .filter(|f| f.is_video_only())
            .filter_map(|f| f.declared_bitrate().map(|b| (f, b)))
    }

    /// First entry wins unless a later one is strictly better
    fn pick<'a>(
        candidates: impl Iterator<Item = (&'a Format, u64)>,
        better: impl Fn(u64, u64) -> bool,
    ) -> Option<&'a Format> {
        let mut chosen: Option<(&Format, u64)> = None;
        for (format, score) in candidates {
            match chosen {
                Some((_, current)) if !better(score, current) => {}
                _ => chosen = Some((format, score)),
            }
        }
        chosen.map(|(format, _)| format)
    }
}
