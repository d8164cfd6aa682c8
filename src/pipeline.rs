use crate::config::{Config, DEFAULT_MAX_WINDOWS, DEFAULT_WINDOW_LENGTH};
use crate::error::{ClipmatchError, Result};
use crate::media::{
    check_ffmpeg, check_ffprobe, download_audio, is_url, AudioAsset, FfmpegTrimmer, SegmentSource,
    VocalSeparator, FALLBACK_DURATION,
};
use crate::recognize::{
    AcrCloudClient, AuddClient, Credentials, FallbackRecognizer, IdentificationOrchestrator,
    IdentificationReport, Recognizer,
};
use crate::sampler::{sample, SamplingPolicy, SegmentWindow};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Configuration for one identification run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Length of each sampled window in seconds.
    pub window_length: f64,
    /// Upper bound on windows submitted.
    pub max_windows: usize,
    /// Window placement policy.
    pub sampling: SamplingPolicy,
    /// Strip vocals before sampling.
    pub separate_vocals: bool,
    /// Windows in flight at once.
    pub concurrency: usize,
    /// Keep the working directory after the run.
    pub keep_files: bool,
    /// Show progress bars.
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_length: DEFAULT_WINDOW_LENGTH,
            max_windows: DEFAULT_MAX_WINDOWS,
            sampling: SamplingPolicy::default(),
            separate_vocals: false,
            concurrency: 1,
            keep_files: false,
            show_progress: true,
        }
    }
}

impl PipelineConfig {
    /// Sampling and concurrency settings taken from the loaded config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            window_length: config.window_length,
            max_windows: config.max_windows,
            sampling: config.sampling,
            concurrency: config.concurrency,
            ..Self::default()
        }
    }
}

/// Timing from the identification run.
#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub total_time: Duration,
    pub download_time: Duration,
    pub separation_time: Duration,
    pub identification_time: Duration,
}

/// Result of the identification pipeline.
#[derive(Debug)]
pub struct PipelineResult {
    /// What the user passed in (URL or path).
    pub source: String,
    /// The audio that was actually sampled.
    pub asset: AudioAsset,
    /// Whether the sampled audio had its vocals removed.
    pub vocals_removed: bool,
    pub windows: Vec<SegmentWindow>,
    pub report: IdentificationReport,
    pub stats: PipelineStats,
    /// Working directory, when kept.
    pub work_dir: Option<PathBuf>,
}

/// Working directory guard; removes the temp directory when dropped.
struct WorkDir {
    temp_dir: Option<TempDir>,
    path: PathBuf,
    cancelled: Arc<AtomicBool>,
}

impl WorkDir {
    fn create(cancelled: Arc<AtomicBool>) -> Result<Self> {
        let temp_dir = tempfile::Builder::new().prefix("clipmatch-").tempdir()?;
        let path = temp_dir.path().to_path_buf();
        debug!("Using temp directory: {:?}", path);
        Ok(Self {
            temp_dir: Some(temp_dir),
            path,
            cancelled,
        })
    }

    /// Stop the directory from being removed and return its path.
    fn keep(&mut self) -> PathBuf {
        if let Some(temp_dir) = self.temp_dir.take() {
            #[allow(deprecated)]
            let _ = temp_dir.into_path();
        }
        self.path.clone()
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        if self.temp_dir.is_some() {
            if self.cancelled.load(Ordering::Relaxed) {
                warn!("Pipeline cancelled, cleaning up temp files: {:?}", self.path);
            } else {
                debug!("Cleaning up temp directory: {:?}", self.path);
            }
        }
    }
}

fn spinner(show: bool, message: &str) -> Option<ProgressBar> {
    if !show {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    Some(pb)
}

fn check_cancelled(cancelled: &AtomicBool) -> Result<()> {
    if cancelled.load(Ordering::Relaxed) {
        return Err(ClipmatchError::Cancelled);
    }
    Ok(())
}

/// Identify the song in a clip given as a URL or a local media path.
pub async fn identify_clip(
    input: &str,
    config: &Config,
    pipeline_config: PipelineConfig,
) -> Result<PipelineResult> {
    let cancelled = Arc::new(AtomicBool::new(false));
    identify_clip_with_cancel(input, config, pipeline_config, cancelled).await
}

/// Identify with cancellation support.
///
/// Stages:
/// 1. Download (URLs only)
/// 2. Optional vocal removal, falling back to the original audio
/// 3. Duration probe and window sampling
/// 4. Per-window trim and recognition
pub async fn identify_clip_with_cancel(
    input: &str,
    config: &Config,
    pipeline_config: PipelineConfig,
    cancelled: Arc<AtomicBool>,
) -> Result<PipelineResult> {
    let start_time = Instant::now();
    let credentials = config.credentials()?;

    check_ffmpeg().map_err(|_| {
        ClipmatchError::MediaTool(
            "FFmpeg not found. Install it with: brew install ffmpeg (macOS) or apt install ffmpeg (Linux)".to_string(),
        )
    })?;
    if let Err(e) = check_ffprobe() {
        warn!(
            "{}; segment placement will assume {}s of audio",
            e,
            FALLBACK_DURATION.as_secs()
        );
    }

    let mut work_dir = WorkDir::create(cancelled.clone())?;
    let mut stats = PipelineStats::default();

    // Stage 1: resolve source audio
    let audio_path = if is_url(input) {
        info!("Stage 1/4: Downloading audio");
        let download_start = Instant::now();
        let pb = spinner(pipeline_config.show_progress, "Downloading audio...");
        let path = download_audio(input.trim(), &work_dir.path);
        stats.download_time = download_start.elapsed();
        match (&path, pb) {
            (Ok(_), Some(pb)) => pb.finish_with_message("✓ Audio downloaded"),
            (Err(_), Some(pb)) => pb.finish_with_message("✗ Download failed"),
            _ => {}
        }
        path?
    } else {
        info!("Stage 1/4: Using local file");
        let path = PathBuf::from(input);
        if !path.exists() {
            return Err(ClipmatchError::FileNotFound(path.display().to_string()));
        }
        path
    };

    check_cancelled(&cancelled)?;

    // Stage 2: vocal removal
    let (audio_path, vocals_removed) = if pipeline_config.separate_vocals {
        info!("Stage 2/4: Removing vocals");
        let separation_start = Instant::now();
        let pb = spinner(
            pipeline_config.show_progress,
            "Removing vocals (this may take a few minutes)...",
        );
        let separated = VocalSeparator::default().separate(&audio_path, &work_dir.path.join("separated"));
        stats.separation_time = separation_start.elapsed();

        match separated {
            Ok(path) => {
                if let Some(pb) = pb {
                    pb.finish_with_message("✓ Vocals removed");
                }
                (path, true)
            }
            Err(e) => {
                if let Some(pb) = pb {
                    pb.finish_with_message("✗ Vocal removal failed, using original audio");
                }
                warn!("Could not remove vocals ({}); falling back to original audio", e);
                (audio_path, false)
            }
        }
    } else {
        debug!("Stage 2/4: Vocal removal skipped");
        (audio_path, false)
    };

    check_cancelled(&cancelled)?;

    // Stage 3 + 4: sample and identify
    let asset = AudioAsset::probe(&audio_path)?;
    let segments_dir = work_dir.path.join("segments");
    std::fs::create_dir_all(&segments_dir)?;

    let recognizer = build_recognizer(config, credentials);
    let source: Box<dyn SegmentSource> = Box::new(FfmpegTrimmer::new(segments_dir));

    let identification_start = Instant::now();
    let (windows, report) =
        identify_asset(&asset, recognizer, source, &pipeline_config, cancelled.clone()).await?;
    stats.identification_time = identification_start.elapsed();

    if report.cancelled {
        return Err(ClipmatchError::Cancelled);
    }

    let kept = if pipeline_config.keep_files {
        let path = work_dir.keep();
        info!("Kept working files in {}", path.display());
        Some(path)
    } else {
        None
    };

    stats.total_time = start_time.elapsed();

    Ok(PipelineResult {
        source: input.to_string(),
        asset,
        vocals_removed,
        windows,
        report,
        stats,
        work_dir: kept,
    })
}

/// ACRCloud alone, or AudD first with ACRCloud as the fallback when an AudD
/// token is configured.
pub fn build_recognizer(config: &Config, credentials: Credentials) -> Box<dyn Recognizer> {
    let acrcloud: Box<dyn Recognizer> = Box::new(AcrCloudClient::new(credentials));

    match config.audd_token() {
        Some(token) => {
            let audd: Box<dyn Recognizer> = Box::new(AuddClient::new(token));
            let chain = FallbackRecognizer::new(vec![audd, acrcloud]);
            info!("Recognition services: {}", chain.names().join(" -> "));
            Box::new(chain)
        }
        None => {
            debug!("No AudD token configured; using ACRCloud only");
            acrcloud
        }
    }
}

/// Sample an already-probed asset and run every window through the recognizer.
///
/// Fails with [`ClipmatchError::TooShort`] before any network activity when
/// the asset cannot hold a single window.
pub async fn identify_asset(
    asset: &AudioAsset,
    recognizer: Box<dyn Recognizer>,
    source: Box<dyn SegmentSource>,
    pipeline_config: &PipelineConfig,
    cancelled: Arc<AtomicBool>,
) -> Result<(Vec<SegmentWindow>, IdentificationReport)> {
    let duration = asset.duration_secs();
    info!(
        "Stage 3/4: Sampling {:.1}s of audio ({} bytes) with {} spread",
        duration, asset.size_bytes, pipeline_config.sampling
    );

    let windows = sample(
        duration,
        pipeline_config.window_length,
        pipeline_config.max_windows,
        pipeline_config.sampling,
    );

    if windows.is_empty() {
        return Err(ClipmatchError::TooShort {
            duration,
            window: pipeline_config.window_length,
        });
    }

    info!(
        "Segment start times: {}",
        windows
            .iter()
            .map(|w| format!("{:.1}s", w.start))
            .collect::<Vec<_>>()
            .join(", ")
    );

    info!("Stage 4/4: Identifying {} segments", windows.len());
    let orchestrator = IdentificationOrchestrator::new(recognizer, source)
        .with_concurrency(pipeline_config.concurrency)
        .with_progress(pipeline_config.show_progress)
        .with_cancel_flag(cancelled);

    let report = orchestrator.identify_windows(asset, windows.clone()).await?;
    Ok((windows, report))
}

/// Print a summary of the identification result.
pub fn print_summary(result: &PipelineResult) {
    let report = &result.report;

    println!();
    println!("═══════════════════════════════════════════════════════════════");
    println!("                     Identification Results                     ");
    println!("═══════════════════════════════════════════════════════════════");
    println!();
    println!("  Source:     {}", result.source);
    println!(
        "  Audio:      {} ({:.1}s{})",
        display_name(&result.asset.path),
        result.asset.duration_secs(),
        if result.vocals_removed { ", vocals removed" } else { "" }
    );
    println!(
        "  Segments:   {} tested, {} matched, {} failed",
        report.attempted, report.matched, report.failed
    );
    println!();

    if report.unique_songs.is_empty() {
        println!("  No music identified in any segment.");
        println!();
        println!("  This could mean:");
        println!("    • The audio contains mostly speech/dialogue");
        println!("    • The music is too quiet or obscured");
        println!("    • The song is not in ACRCloud's database");
        println!("    • The audio quality is too low");
        if !result.vocals_removed {
            println!();
            println!("  Try again with vocal removal enabled.");
        }
    } else {
        println!("  Unique songs found: {}", report.unique_songs.len());
        for (i, song) in report.unique_songs.iter().enumerate() {
            println!();
            println!("  Song {}:", i + 1);
            println!("    Title:      {}", song.title);
            println!("    Artist:     {}", song.artist);
            println!("    Album:      {}", song.album);
            println!("    Genre:      {}", song.genre);
            println!("    Confidence: {}", song.confidence);
            println!("    Segment:    {}", song.segment + 1);
        }
    }

    if let Some(best) = &report.best {
        println!();
        println!("  Best match: {} - {} ({})", best.title, best.artist, best.confidence);
    }

    if let Some(msg) = &report.auth_error {
        println!();
        println!("  Authentication failed: {}", msg);
        println!("  Check ACRCLOUD_ACCESS_KEY / ACRCLOUD_ACCESS_SECRET (use the access key, not the secret key)");
        println!("  and AUDD_API_TOKEN if AudD is enabled.");
    }

    if let Some(dir) = &result.work_dir {
        println!();
        println!("  Working files kept in {}", dir.display());
    }

    println!();
    println!("  Timing:     {}", format_timings(&result.stats));
    println!();
    println!("═══════════════════════════════════════════════════════════════");
}

fn format_timings(stats: &PipelineStats) -> String {
    let mut parts = Vec::new();
    if !stats.download_time.is_zero() {
        parts.push(format!("{:.2}s downloading", stats.download_time.as_secs_f64()));
    }
    if !stats.separation_time.is_zero() {
        parts.push(format!("{:.2}s removing vocals", stats.separation_time.as_secs_f64()));
    }
    parts.push(format!(
        "{:.2}s identifying",
        stats.identification_time.as_secs_f64()
    ));
    format!(
        "{:.2}s total ({})",
        stats.total_time.as_secs_f64(),
        parts.join(", ")
    )
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pipeline_config_default() {
        let config = PipelineConfig::default();
        assert_eq!(config.window_length, 20.0);
        assert_eq!(config.max_windows, 5);
        assert_eq!(config.sampling, SamplingPolicy::Even);
        assert!(!config.separate_vocals);
        assert_eq!(config.concurrency, 1);
        assert!(!config.keep_files);
        assert!(config.show_progress);
    }

    #[test]
    fn test_pipeline_config_from_config() {
        let config = Config {
            window_length: 15.0,
            max_windows: 3,
            sampling: SamplingPolicy::Random,
            concurrency: 2,
            ..Config::default()
        };
        let pipeline_config = PipelineConfig::from_config(&config);
        assert_eq!(pipeline_config.window_length, 15.0);
        assert_eq!(pipeline_config.max_windows, 3);
        assert_eq!(pipeline_config.sampling, SamplingPolicy::Random);
        assert_eq!(pipeline_config.concurrency, 2);
    }

    #[test]
    fn test_format_timings_lists_stages_that_ran() {
        let stats = PipelineStats {
            total_time: Duration::from_millis(9500),
            download_time: Duration::from_millis(3250),
            separation_time: Duration::ZERO,
            identification_time: Duration::from_secs(6),
        };
        assert_eq!(
            format_timings(&stats),
            "9.50s total (3.25s downloading, 6.00s identifying)"
        );

        let stats = PipelineStats {
            separation_time: Duration::from_secs(40),
            ..stats
        };
        assert!(format_timings(&stats).contains("40.00s removing vocals"));
    }

    #[test]
    fn test_build_recognizer_selects_services() {
        let credentials = || {
            Credentials::new(
                "key".to_string(),
                "secret".to_string(),
                "identify-eu-west-1.acrcloud.com".to_string(),
            )
        };

        let config = Config::default();
        assert_eq!(build_recognizer(&config, credentials()).name(), "ACRCloud");

        let config = Config {
            audd_api_token: Some("token".to_string()),
            ..Config::default()
        };
        assert_eq!(build_recognizer(&config, credentials()).name(), "fallback chain");
    }

    #[test]
    fn test_display_name() {
        assert_eq!(display_name(Path::new("/tmp/x/no_vocals.mp3")), "no_vocals.mp3");
    }

    #[test]
    fn test_work_dir_keep() {
        let mut dir = WorkDir::create(Arc::new(AtomicBool::new(false))).unwrap();
        let path = dir.keep();
        drop(dir);
        assert!(path.exists());
        std::fs::remove_dir_all(path).unwrap();
    }

    #[tokio::test]
    async fn test_identify_clip_requires_credentials() {
        let result = identify_clip("clip.mp4", &Config::default(), PipelineConfig::default()).await;
        assert!(matches!(result, Err(ClipmatchError::Config(_))));
    }
}
