use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ClipmatchError, Result};
use crate::recognize::SegmentSample;
use crate::sampler::SegmentWindow;

use super::{AudioAsset, SegmentSource};

/// Duration assumed when ffprobe cannot determine it.
pub const FALLBACK_DURATION: Duration = Duration::from_secs(60);

/// Get audio duration using FFprobe.
pub fn probe_duration(input: &Path) -> Result<Duration> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(input)
        .output()
        .map_err(|e| ClipmatchError::MediaTool(format!("Failed to run FFprobe: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ClipmatchError::MediaTool(format!("FFprobe failed: {stderr}")));
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_duration(raw: &str) -> Result<Duration> {
    let secs: f64 = raw.trim().parse().map_err(|e| {
        ClipmatchError::MediaTool(format!("Failed to parse duration '{}': {e}", raw.trim()))
    })?;

    if !secs.is_finite() || secs < 0.0 {
        return Err(ClipmatchError::MediaTool(format!(
            "FFprobe reported an invalid duration: {secs}"
        )));
    }

    Ok(Duration::from_secs_f64(secs))
}

/// Probe duration, assuming [`FALLBACK_DURATION`] rather than failing.
pub fn probe_duration_or_default(input: &Path) -> Duration {
    match probe_duration(input) {
        Ok(duration) => duration,
        Err(e) => {
            warn!(
                "Could not determine audio duration ({}), assuming {}s",
                e,
                FALLBACK_DURATION.as_secs()
            );
            FALLBACK_DURATION
        }
    }
}

/// Cut `length` seconds starting at `start` into an MP3 file.
pub fn trim_segment(input: &Path, output: &Path, start: f64, length: f64) -> Result<()> {
    if !input.exists() {
        return Err(ClipmatchError::FileNotFound(input.display().to_string()));
    }

    if length <= 0.0 {
        return Err(ClipmatchError::MediaTool(
            "Segment duration is zero".to_string(),
        ));
    }

    let start_secs = format!("{:.3}", start.max(0.0));
    let duration_secs = format!("{:.3}", length);

    debug!(
        "Extracting segment: start={}, duration={}",
        start_secs, duration_secs
    );

    let output_status = Command::new("ffmpeg")
        .args(["-y", "-ss"])
        .arg(&start_secs)
        .arg("-t")
        .arg(&duration_secs)
        .arg("-i")
        .arg(input)
        .args(["-vn", "-acodec", "libmp3lame", "-b:a", "192k"])
        .arg(output)
        .output()
        .map_err(|e| ClipmatchError::MediaTool(format!("Failed to run FFmpeg: {e}")))?;

    if !output_status.status.success() {
        let stderr = String::from_utf8_lossy(&output_status.stderr);
        return Err(ClipmatchError::MediaTool(format!(
            "FFmpeg segment extraction failed: {}",
            stderr.lines().last().unwrap_or_default()
        )));
    }

    if !output.exists() {
        return Err(ClipmatchError::MediaTool(
            "Output file was not created".to_string(),
        ));
    }

    Ok(())
}

/// Trims windows with FFmpeg into a working directory.
pub struct FfmpegTrimmer {
    work_dir: PathBuf,
}

impl FfmpegTrimmer {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    fn segment_path(&self, window: &SegmentWindow) -> PathBuf {
        self.work_dir
            .join(format!("segment_{}.mp3", window.index + 1))
    }
}

#[async_trait]
impl SegmentSource for FfmpegTrimmer {
    async fn trim(&self, asset: &AudioAsset, window: &SegmentWindow) -> Result<SegmentSample> {
        let path = self.segment_path(window);

        // ffmpeg blocks; keep it off the thread polling in-flight uploads.
        let input = asset.path.clone();
        let output = path.clone();
        let (start, length) = (window.start, window.length);
        tokio::task::spawn_blocking(move || trim_segment(&input, &output, start, length))
            .await
            .map_err(|e| ClipmatchError::MediaTool(format!("Segment task failed: {e}")))??;

        let bytes = tokio::fs::read(&path).await?;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            debug!("Could not remove {:?}: {}", path, e);
        }

        if bytes.is_empty() {
            return Err(ClipmatchError::MediaTool(format!(
                "Segment {} is empty",
                window.index + 1
            )));
        }

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("segment.mp3")
            .to_string();

        Ok(SegmentSample {
            window: *window,
            name,
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("12.5\n").unwrap(), Duration::from_millis(12500));
        assert!(parse_duration("N/A").is_err());
        assert!(parse_duration("-3").is_err());
    }

    #[test]
    fn test_probe_missing_file_falls_back() {
        let duration = probe_duration_or_default(Path::new("/nonexistent/clip.mp3"));
        assert_eq!(duration, FALLBACK_DURATION);
    }

    #[test]
    fn test_trim_missing_input() {
        let result = trim_segment(
            Path::new("/nonexistent/clip.mp3"),
            Path::new("/tmp/out.mp3"),
            5.0,
            20.0,
        );
        match result {
            Err(ClipmatchError::FileNotFound(path)) => assert!(path.contains("nonexistent")),
            other => panic!("Expected FileNotFound error, got: {other:?}"),
        }
    }

    #[test]
    fn test_segment_paths_are_one_based() {
        let trimmer = FfmpegTrimmer::new("/tmp/work");
        let window = SegmentWindow {
            index: 0,
            start: 5.0,
            length: 20.0,
        };
        assert_eq!(
            trimmer.segment_path(&window),
            PathBuf::from("/tmp/work/segment_1.mp3")
        );
    }

    #[tokio::test]
    async fn test_trimmer_reports_missing_input_from_worker() {
        let dir = tempfile::TempDir::new().unwrap();
        let trimmer = FfmpegTrimmer::new(dir.path());
        let asset = AudioAsset::new(
            PathBuf::from("/nonexistent/clip.mp3"),
            Duration::from_secs(60),
            0,
        );
        let window = SegmentWindow {
            index: 2,
            start: 5.0,
            length: 20.0,
        };

        let result = trimmer.trim(&asset, &window).await;
        assert!(matches!(result, Err(ClipmatchError::FileNotFound(_))));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_trims_all_resolve() {
        let dir = tempfile::TempDir::new().unwrap();
        let trimmer = FfmpegTrimmer::new(dir.path());
        let asset = AudioAsset::new(
            PathBuf::from("/nonexistent/clip.mp3"),
            Duration::from_secs(60),
            0,
        );
        let windows: Vec<SegmentWindow> = (0..4)
            .map(|index| SegmentWindow {
                index,
                start: 5.0,
                length: 20.0,
            })
            .collect();

        let results = futures::future::join_all(windows.iter().map(|w| trimmer.trim(&asset, w))).await;
        assert_eq!(results.len(), 4);
        assert!(results.iter().all(|r| r.is_err()));
    }
}
