use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::OnceLock;

use regex::Regex;
use tracing::{debug, info};

use crate::error::{ClipmatchError, Result};

use super::check_yt_dlp;

fn url_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^https?://\S+$").expect("valid URL regex"))
}

fn youtube_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)^https?://(www\.|m\.)?(youtube\.com/(shorts/|watch\?v=)|youtu\.be/)[\w-]{6,}",
        )
        .expect("valid YouTube regex")
    })
}

/// Whether the input looks like a remote URL rather than a local path.
pub fn is_url(input: &str) -> bool {
    url_regex().is_match(input.trim())
}

/// Whether the input is a YouTube video or Shorts link.
pub fn is_youtube_url(input: &str) -> bool {
    youtube_regex().is_match(input.trim())
}

/// Download the audio track of `url` as MP3 into `dir` with yt-dlp.
pub fn download_audio(url: &str, dir: &Path) -> Result<PathBuf> {
    check_yt_dlp().map_err(|_| {
        ClipmatchError::Download(
            "yt-dlp not found. Install it with: pip install yt-dlp (or brew install yt-dlp)"
                .to_string(),
        )
    })?;

    if !is_youtube_url(url) {
        debug!("{} is not a YouTube link; letting yt-dlp try anyway", url);
    }

    info!("Downloading audio from {}", url);

    let template = dir.join("audio.%(ext)s");
    let output = Command::new("yt-dlp")
        .args(["-x", "--audio-format", "mp3", "--audio-quality", "0", "-o"])
        .arg(&template)
        .arg(url)
        .output()
        .map_err(|e| ClipmatchError::Download(format!("Failed to run yt-dlp: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ClipmatchError::Download(format!(
            "yt-dlp failed: {}",
            stderr.trim()
        )));
    }

    let audio = find_downloaded(dir)?;
    info!("Audio downloaded to {}", audio.display());
    Ok(audio)
}

/// Locate `audio.*` in the download directory, preferring the MP3.
fn find_downloaded(dir: &Path) -> Result<PathBuf> {
    let mut candidates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path.file_stem().and_then(|s| s.to_str()) == Some("audio")
        })
        .collect();

    candidates.sort_by_key(|p| p.extension().and_then(|e| e.to_str()) != Some("mp3"));

    candidates
        .into_iter()
        .next()
        .ok_or_else(|| ClipmatchError::Download("Downloaded audio file not found".to_string()))
}
