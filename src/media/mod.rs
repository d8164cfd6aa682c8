pub mod download;
pub mod extract;
pub mod separate;

pub use download::{download_audio, is_url, is_youtube_url};
pub use extract::{
    probe_duration, probe_duration_or_default, trim_segment, FfmpegTrimmer, FALLBACK_DURATION,
};
pub use separate::{
    default_strategies, DemucsCli, DemucsPythonModule, SeparationStrategy, VocalSeparator,
};

use crate::error::{ClipmatchError, Result};
use crate::recognize::SegmentSample;
use crate::sampler::SegmentWindow;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tracing::debug;

/// An audio file whose duration has been probed.
#[derive(Debug, Clone)]
pub struct AudioAsset {
    pub path: PathBuf,
    pub duration: Duration,
    pub size_bytes: u64,
}

impl AudioAsset {
    pub fn new(path: PathBuf, duration: Duration, size_bytes: u64) -> Self {
        Self {
            path,
            duration,
            size_bytes,
        }
    }

    /// Probe an on-disk file, falling back to a default duration when
    /// ffprobe cannot tell.
    pub fn probe(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ClipmatchError::FileNotFound(path.display().to_string()));
        }
        let size_bytes = std::fs::metadata(path)?.len();
        let duration = probe_duration_or_default(path);
        Ok(Self::new(path.to_path_buf(), duration, size_bytes))
    }

    pub fn duration_secs(&self) -> f64 {
        self.duration.as_secs_f64()
    }
}

/// Produces the audio bytes for one window of an asset.
#[async_trait]
pub trait SegmentSource: Send + Sync {
    async fn trim(&self, asset: &AudioAsset, window: &SegmentWindow) -> Result<SegmentSample>;
}

/// Check that an external tool is installed and runs.
pub fn check_tool(program: &str, version_arg: &str) -> Result<()> {
    let output = Command::new(program)
        .arg(version_arg)
        .output()
        .map_err(|e| {
            ClipmatchError::MediaTool(format!(
                "{program} not found. Please install it and ensure it's in your PATH. Error: {e}"
            ))
        })?;

    if !output.status.success() {
        return Err(ClipmatchError::MediaTool(format!("{program} check failed")));
    }

    debug!("{} is available", program);
    Ok(())
}

pub fn check_ffmpeg() -> Result<()> {
    check_tool("ffmpeg", "-version")
}

pub fn check_ffprobe() -> Result<()> {
    check_tool("ffprobe", "-version")
}

pub fn check_yt_dlp() -> Result<()> {
    check_tool("yt-dlp", "--version")
}
